//! Inverse lookup: concrete type -> the discriminator value it is encoded with.

use core::fmt;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{ConfigError, PolyError, Result};
use crate::registry::{Family, Registry, TypeKey};
use crate::trace;

/// The discriminator a concrete type writes when encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscriminatorValue {
    /// Encoded with this value
    Tagged(Arc<str>),
    /// A fallback type: encoded without a discriminator
    Untagged,
}

impl DiscriminatorValue {
    /// The value, or `None` when untagged.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Tagged(value) => Some(&**value),
            Self::Untagged => None,
        }
    }
}

impl fmt::Display for DiscriminatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tagged(value) => write!(f, "{value:?}"),
            Self::Untagged => f.write_str("<untagged>"),
        }
    }
}

impl Registry {
    /// The discriminator value `T` is encoded with.
    ///
    /// `T` must be a declared subtype or fallback type of a registered base
    /// type reachable from `T` through the type hierarchy.
    pub fn discriminator_value<T: ?Sized + 'static>(&self) -> Result<DiscriminatorValue> {
        self.discriminator_value_of(TypeKey::of::<T>())
    }

    /// [`discriminator_value`](Self::discriminator_value) for a runtime type key.
    pub fn discriminator_value_of(&self, ty: TypeKey) -> Result<DiscriminatorValue> {
        if let Some(value) = self.values.get(&ty.id()) {
            return Ok(value);
        }

        let mut nearest = None;
        let mut seen = HashSet::new();
        let mut current = Some(ty);
        while let Some(candidate) = current {
            if !seen.insert(candidate) {
                return Err(PolyError::config(ConfigError::HierarchyCycle { child: candidate }));
            }
            if let Some(family) = self.family_by_id(candidate.id()) {
                nearest.get_or_insert(candidate);
                self.populate(&family);
                if let Some(value) = self.values.get(&ty.id()) {
                    return Ok(value);
                }
            }
            current = self.parent_of(candidate);
        }

        Err(PolyError::config(match nearest {
            Some(ancestor) => ConfigError::NotDeclaredSubtype { ty, ancestor },
            None => ConfigError::NoMarkedAncestor { ty },
        }))
    }

    /// Publish the discriminator values of every type of `family`.
    ///
    /// Fallback types go first, so a type declared both as default and as a
    /// subtype encodes untagged. The unknown type gets no entry of its own.
    /// Existing entries are kept, so racing populates agree.
    fn populate(&self, family: &Family) {
        let published = self.values.fill(|values| {
            let before = values.len();
            for ty in family.untagged_types() {
                values.entry(ty.id()).or_insert(DiscriminatorValue::Untagged);
            }
            for (value, ty) in family.mapping().iter() {
                values
                    .entry(ty.id())
                    .or_insert_with(|| DiscriminatorValue::Tagged(value.into()));
            }
            values.len() != before
        });
        if published {
            trace!(base = %family.descriptor().base(), "populated discriminator values");
        }
    }
}

/// The discriminator value `T` is encoded with, from the process-wide registry.
pub fn discriminator_value<T: ?Sized + 'static>() -> Result<DiscriminatorValue> {
    Registry::global().discriminator_value::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BaseType;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Circle;
    #[derive(Deserialize)]
    struct Square;
    #[derive(Deserialize)]
    struct Blob;
    #[derive(Deserialize)]
    struct Weird;
    #[derive(Deserialize)]
    struct RoundedSquare;
    #[allow(dead_code)]
    struct Unlisted;
    #[allow(dead_code)]
    struct Unrelated;

    enum Shape {
        Circle,
        Square,
        Blob,
        Weird,
        RoundedSquare,
    }

    impl From<Circle> for Shape {
        fn from(_: Circle) -> Self {
            Shape::Circle
        }
    }
    impl From<Square> for Shape {
        fn from(_: Square) -> Self {
            Shape::Square
        }
    }
    impl From<Blob> for Shape {
        fn from(_: Blob) -> Self {
            Shape::Blob
        }
    }
    impl From<Weird> for Shape {
        fn from(_: Weird) -> Self {
            Shape::Weird
        }
    }
    impl From<RoundedSquare> for Shape {
        fn from(_: RoundedSquare) -> Self {
            Shape::RoundedSquare
        }
    }

    fn shapes() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                BaseType::<Shape>::new("kind")
                    .default_type::<Blob>()
                    .unknown_type::<Weird>()
                    .subtype::<Circle>("circle")
                    .subtype::<Square>("square")
                    .subtype::<Square>("box")
                    .subtype::<RoundedSquare>("rounded"),
            )
            .unwrap();
        registry
    }

    fn tagged(value: &str) -> DiscriminatorValue {
        DiscriminatorValue::Tagged(value.into())
    }

    #[test]
    fn test_values_of_declared_types() {
        polyjson_testhelpers::setup();
        let registry = shapes();
        assert_eq!(registry.discriminator_value::<Circle>().unwrap(), tagged("circle"));
        // First declared value wins
        assert_eq!(registry.discriminator_value::<Square>().unwrap(), tagged("square"));
        assert_eq!(
            registry.discriminator_value::<Blob>().unwrap(),
            DiscriminatorValue::Untagged
        );
        // Cached
        assert_eq!(registry.discriminator_value::<Circle>().unwrap(), tagged("circle"));
    }

    #[test]
    fn test_unknown_type_has_no_value() {
        polyjson_testhelpers::setup();
        let registry = shapes();
        // Written untagged, it would read back as the default type
        let err = registry.discriminator_value::<Weird>().unwrap_err();
        assert!(matches!(
            err.kind,
            crate::PolyErrorKind::Configuration(ConfigError::NotDeclaredSubtype { ty, ancestor })
                if ty == TypeKey::of::<Weird>() && ancestor == TypeKey::of::<Shape>()
        ));
        // Other types of the family are unaffected
        assert_eq!(
            registry.discriminator_value::<Blob>().unwrap(),
            DiscriminatorValue::Untagged
        );
    }

    #[test]
    fn test_value_through_intermediate_parent() {
        polyjson_testhelpers::setup();
        let registry = shapes();
        registry.declare_parent::<RoundedSquare, Square>().unwrap();
        assert_eq!(
            registry.parent_of(TypeKey::of::<RoundedSquare>()),
            Some(TypeKey::of::<Square>())
        );
        assert_eq!(
            registry.discriminator_value::<RoundedSquare>().unwrap(),
            tagged("rounded")
        );

        // Reachable from the base, but not in its table
        registry.declare_parent::<Unlisted, Square>().unwrap();
        let err = registry.discriminator_value::<Unlisted>().unwrap_err();
        assert!(matches!(
            err.kind,
            crate::PolyErrorKind::Configuration(ConfigError::NotDeclaredSubtype { .. })
        ));
    }

    #[test]
    fn test_unrelated_type_has_no_base() {
        polyjson_testhelpers::setup();
        let registry = shapes();
        let err = registry.discriminator_value::<Unrelated>().unwrap_err();
        assert!(matches!(
            err.kind,
            crate::PolyErrorKind::Configuration(ConfigError::NoMarkedAncestor { .. })
        ));

        // The base type itself is not one of its own subtypes
        let err = registry.discriminator_value::<Shape>().unwrap_err();
        assert!(matches!(
            err.kind,
            crate::PolyErrorKind::Configuration(ConfigError::NotDeclaredSubtype { .. })
        ));
    }

    #[test]
    fn test_concurrent_first_lookup() {
        polyjson_testhelpers::setup();
        let registry = shapes();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| registry.discriminator_value::<Square>().unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), tagged("square"));
            }
        });
    }

    #[test]
    fn test_display() {
        assert_eq!(tagged("dog").to_string(), r#""dog""#);
        assert_eq!(DiscriminatorValue::Untagged.to_string(), "<untagged>");
        assert_eq!(tagged("dog").as_str(), Some("dog"));
    }
}
