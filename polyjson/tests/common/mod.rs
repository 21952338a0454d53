//! The animal model shared by the integration tests, registered once per
//! test binary in the process-wide registry.

#![allow(dead_code)]

use std::sync::LazyLock;

use polyjson::{BaseType, Tag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dog {
    #[serde(rename = "_t", default, skip_serializing_if = "Tag::is_untagged")]
    pub tag: Tag<Dog>,
    pub id: u32,
    pub can_bark: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cat {
    #[serde(rename = "_t", default, skip_serializing_if = "Tag::is_untagged")]
    pub tag: Tag<Cat>,
    pub id: u32,
    pub lives: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultAnimal {
    #[serde(rename = "_t", default, skip_serializing_if = "Tag::is_untagged")]
    pub tag: Tag<DefaultAnimal>,
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Animal {
    Dog(Dog),
    Cat(Cat),
    Default(DefaultAnimal),
}

impl Animal {
    pub fn id(&self) -> u32 {
        match self {
            Animal::Dog(dog) => dog.id,
            Animal::Cat(cat) => cat.id,
            Animal::Default(animal) => animal.id,
        }
    }
}

impl From<Dog> for Animal {
    fn from(dog: Dog) -> Self {
        Animal::Dog(dog)
    }
}

impl From<Cat> for Animal {
    fn from(cat: Cat) -> Self {
        Animal::Cat(cat)
    }
}

impl From<DefaultAnimal> for Animal {
    fn from(animal: DefaultAnimal) -> Self {
        Animal::Default(animal)
    }
}

pub fn dog(id: u32, can_bark: bool) -> Animal {
    Animal::Dog(Dog {
        tag: Tag::new(),
        id,
        can_bark,
    })
}

pub fn cat(id: u32, lives: u8) -> Animal {
    Animal::Cat(Cat {
        tag: Tag::new(),
        id,
        lives,
    })
}

pub fn default_animal(id: u32) -> Animal {
    Animal::Default(DefaultAnimal {
        tag: Tag::new(),
        id,
    })
}

static REGISTERED: LazyLock<()> = LazyLock::new(|| {
    polyjson::register(
        BaseType::<Animal>::new("_t")
            .default_type::<DefaultAnimal>()
            .subtype::<Dog>("dog")
            .subtype::<Cat>("cat"),
    )
    .expect("animal registration");
});

/// Tracing plus the animal registration.
pub fn setup() {
    polyjson_testhelpers::setup();
    LazyLock::force(&REGISTERED);
}
