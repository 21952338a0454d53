//! A field type that carries a concrete type's discriminator.
//!
//! Concrete types write their discriminator through an ordinary field:
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Dog {
//!     #[serde(rename = "_t", default, skip_serializing_if = "Tag::is_untagged")]
//!     tag: Tag<Dog>,
//!     id: u32,
//! }
//! ```
//!
//! The value is looked up in the process-wide registry when serializing, so
//! the field itself is zero-sized.

use core::fmt;
use core::marker::PhantomData;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::discriminator::{DiscriminatorValue, discriminator_value};

/// Serializes as the discriminator value of `T`.
///
/// Deserializing accepts and ignores any value: the discriminator has done
/// its job by the time a concrete type is decoded.
pub struct Tag<T: ?Sized>(PhantomData<fn() -> T>);

impl<T: ?Sized + 'static> Tag<T> {
    /// A new tag.
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    /// The discriminator value `T` encodes with.
    pub fn value(&self) -> crate::Result<DiscriminatorValue> {
        discriminator_value::<T>()
    }

    /// Whether `T` encodes without a discriminator.
    ///
    /// Meant for `skip_serializing_if`. A lookup error counts as tagged, so
    /// serializing reports it.
    pub fn is_untagged(&self) -> bool {
        matches!(self.value(), Ok(DiscriminatorValue::Untagged))
    }
}

impl<T: ?Sized> Clone for Tag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Tag<T> {}

impl<T: ?Sized> Default for Tag<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: ?Sized> PartialEq for Tag<T> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<T: ?Sized> Eq for Tag<T> {}

impl<T: ?Sized> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag<{}>", core::any::type_name::<T>())
    }
}

impl<T: ?Sized + 'static> Serialize for Tag<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Ok(DiscriminatorValue::Tagged(value)) => serializer.serialize_str(&value),
            Ok(DiscriminatorValue::Untagged) => serializer.serialize_none(),
            Err(err) => Err(serde::ser::Error::custom(err)),
        }
    }
}

impl<'de, T: ?Sized> Deserialize<'de> for Tag<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Self(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BaseType, register};

    #[derive(Deserialize)]
    struct Fin;

    #[derive(Deserialize)]
    struct Plain;

    #[allow(dead_code)]
    struct Stray;

    #[allow(dead_code)]
    enum Fish {
        Fin(Fin),
        Plain(Plain),
    }

    impl From<Fin> for Fish {
        fn from(value: Fin) -> Self {
            Fish::Fin(value)
        }
    }
    impl From<Plain> for Fish {
        fn from(value: Plain) -> Self {
            Fish::Plain(value)
        }
    }

    #[test]
    fn test_tag_serializes_registered_value() {
        polyjson_testhelpers::setup();
        register(
            BaseType::<Fish>::new("kind")
                .default_type::<Plain>()
                .subtype::<Fin>("fin"),
        )
        .unwrap();

        let fin = Tag::<Fin>::new();
        assert!(!fin.is_untagged());
        assert_eq!(serde_json::to_string(&fin).unwrap(), r#""fin""#);

        let plain = Tag::<Plain>::new();
        assert!(plain.is_untagged());
        assert_eq!(serde_json::to_string(&plain).unwrap(), "null");
    }

    #[test]
    fn test_tag_of_unregistered_type_fails_to_serialize() {
        polyjson_testhelpers::setup();
        let stray = Tag::<Stray>::new();
        assert!(!stray.is_untagged());
        assert!(serde_json::to_string(&stray).is_err());
    }

    #[test]
    fn test_tag_ignores_any_input() {
        for input in [r#""whatever""#, "null", "12", r#"{"a":[1,2]}"#] {
            let tag: Tag<Stray> = serde_json::from_str(input).unwrap();
            assert_eq!(tag, Tag::default());
        }
    }
}
