//! Registration of polymorphic base types and discriminator resolution.
//!
//! A base type declares the name of its discriminator property and a table
//! of `discriminator value -> concrete type`. Registration happens once per
//! base type, up front; afterwards the tables are read without locking.

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use serde::de::DeserializeOwned;

use crate::discriminator::DiscriminatorValue;
use crate::error::{ConfigError, DiscriminatorError, PolyError, PolyErrorKind, Result};
use crate::snapshot::SnapshotMap;
use crate::{debug, trace};

/// Identity of a Rust type, with its name kept for messages.
///
/// Equality and hashing only look at the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// The underlying type id.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name, as reported by [`core::any::type_name`].
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What the lookahead found where the discriminator should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed<'a> {
    /// The object has no discriminator property
    Absent,
    /// The property is present and explicitly `null`
    Null,
    /// The property holds this string
    Value(&'a str),
}

/// Everything declared about a base type except its subtype table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTypeDescriptor {
    base: TypeKey,
    property_name: String,
    default_type: Option<TypeKey>,
    undefined_type: Option<TypeKey>,
    unknown_type: Option<TypeKey>,
}

impl BaseTypeDescriptor {
    /// The base type.
    pub const fn base(&self) -> TypeKey {
        self.base
    }

    /// Name of the discriminator property.
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Fallback for both a missing and an unmapped discriminator.
    pub const fn default_type(&self) -> Option<TypeKey> {
        self.default_type
    }

    /// Fallback for a missing discriminator, before `default_type`.
    pub const fn undefined_type(&self) -> Option<TypeKey> {
        self.undefined_type
    }

    /// Fallback for an unmapped discriminator, before `default_type`.
    pub const fn unknown_type(&self) -> Option<TypeKey> {
        self.unknown_type
    }

    /// The type used when the property is absent, if any.
    pub fn absent_type(&self) -> Option<TypeKey> {
        self.undefined_type.or(self.default_type)
    }
}

/// Ordered `discriminator value -> concrete type` table of one base type.
#[derive(Debug, Clone, Default)]
pub struct SubtypeMapping {
    entries: Vec<(String, TypeKey)>,
    by_value: HashMap<String, TypeKey>,
}

impl SubtypeMapping {
    /// The concrete type mapped to `value`.
    pub fn get(&self, value: &str) -> Option<TypeKey> {
        self.by_value.get(value).copied()
    }

    /// All pairs, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeKey)> {
        self.entries.iter().map(|(value, ty)| (value.as_str(), *ty))
    }

    /// Number of declared values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no values are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) type DecodeFn<B> = fn(&[u8]) -> serde_json::Result<B>;

fn decode_as<T, B>(bytes: &[u8]) -> serde_json::Result<B>
where
    T: DeserializeOwned + Into<B>,
{
    serde_json::from_slice::<T>(bytes).map(Into::into)
}

/// Decode functions of every concrete type of one base type, keyed by type.
pub(crate) struct Decoders<B> {
    by_type: HashMap<TypeId, DecodeFn<B>>,
}

impl<B> Decoders<B> {
    pub(crate) fn get(&self, ty: TypeKey) -> Option<DecodeFn<B>> {
        self.by_type.get(&ty.id).copied()
    }
}

/// A registered base type: descriptor, subtype table and decoders.
pub struct Family {
    descriptor: BaseTypeDescriptor,
    mapping: SubtypeMapping,
    /// `Decoders<B>` for the base type `B`.
    decoders: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("descriptor", &self.descriptor)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl Family {
    /// The base type's descriptor.
    pub const fn descriptor(&self) -> &BaseTypeDescriptor {
        &self.descriptor
    }

    /// The base type's subtype table.
    pub const fn mapping(&self) -> &SubtypeMapping {
        &self.mapping
    }

    /// Pick the concrete type for what the lookahead observed.
    ///
    /// - absent: `undefined ?? default`, otherwise a configuration error
    /// - `null`: same as absent when that has a fallback, otherwise a
    ///   discriminator error
    /// - mapped value: the mapped type
    /// - unmapped value: `unknown ?? default`, otherwise a discriminator error
    pub fn resolve(&self, observed: Observed<'_>) -> Result<TypeKey> {
        let d = &self.descriptor;
        let resolved = match observed {
            Observed::Absent => d.absent_type().ok_or_else(|| {
                PolyError::config(ConfigError::NoFallbackForAbsent {
                    base: d.base,
                    property: d.property_name.clone(),
                })
            }),
            Observed::Null => d.absent_type().ok_or_else(|| {
                PolyError::without_span(PolyErrorKind::Discriminator(
                    DiscriminatorError::NullWithoutFallback {
                        base: d.base,
                        property: d.property_name.clone(),
                    },
                ))
            }),
            Observed::Value(value) => self
                .mapping
                .get(value)
                .or(d.unknown_type)
                .or(d.default_type)
                .ok_or_else(|| {
                    PolyError::without_span(PolyErrorKind::Discriminator(
                        DiscriminatorError::Unmapped {
                            base: d.base,
                            value: value.to_owned(),
                        },
                    ))
                }),
        }?;
        trace!(base = %d.base, ?observed, %resolved, "resolved concrete type");
        Ok(resolved)
    }

    pub(crate) fn decoders<B: 'static>(&self) -> Result<Arc<Decoders<B>>> {
        Arc::clone(&self.decoders)
            .downcast::<Decoders<B>>()
            .map_err(|_| {
                PolyError::config(ConfigError::NotRegistered {
                    base: TypeKey::of::<B>(),
                })
            })
    }

    /// Every type of the family that carries no discriminator when encoded.
    pub(crate) fn untagged_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.descriptor
            .default_type
            .into_iter()
            .chain(self.descriptor.undefined_type)
    }
}

struct Declared<B> {
    key: TypeKey,
    decode: DecodeFn<B>,
}

impl<B: 'static> Declared<B> {
    fn of<T>() -> Self
    where
        T: DeserializeOwned + Into<B> + 'static,
    {
        Self {
            key: TypeKey::of::<T>(),
            decode: decode_as::<T, B>,
        }
    }
}

/// Builder describing one polymorphic base type `B`.
///
/// Every concrete type must be decodable on its own and convertible into
/// `B`. For a base enum that usually means one `From` impl per variant; for a
/// boxed trait object, `impl From<Dog> for Box<dyn Animal>`.
pub struct BaseType<B> {
    property_name: String,
    default_type: Option<Declared<B>>,
    undefined_type: Option<Declared<B>>,
    unknown_type: Option<Declared<B>>,
    subtypes: Vec<(String, Declared<B>)>,
}

impl<B: 'static> BaseType<B> {
    /// Start describing `B`, discriminated by the property `property_name`.
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            default_type: None,
            undefined_type: None,
            unknown_type: None,
            subtypes: Vec::new(),
        }
    }

    /// Map the discriminator value `value` to `T`.
    pub fn subtype<T>(mut self, value: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<B> + 'static,
    {
        self.subtypes.push((value.into(), Declared::of::<T>()));
        self
    }

    /// Use `T` when the discriminator is missing or unmapped (unless
    /// overridden by an undefined or unknown type).
    pub fn default_type<T>(mut self) -> Self
    where
        T: DeserializeOwned + Into<B> + 'static,
    {
        self.default_type = Some(Declared::of::<T>());
        self
    }

    /// Use `T` when the discriminator property is missing.
    pub fn undefined_type<T>(mut self) -> Self
    where
        T: DeserializeOwned + Into<B> + 'static,
    {
        self.undefined_type = Some(Declared::of::<T>());
        self
    }

    /// Use `T` when the discriminator value is not in the table.
    pub fn unknown_type<T>(mut self) -> Self
    where
        T: DeserializeOwned + Into<B> + 'static,
    {
        self.unknown_type = Some(Declared::of::<T>());
        self
    }

    /// Validate and split into the shared family entry.
    fn build(self) -> Result<Family> {
        let base = TypeKey::of::<B>();
        if self.property_name.is_empty() {
            return Err(PolyError::config(ConfigError::EmptyPropertyName { base }));
        }

        let mut decoders = HashMap::new();
        let mut fallback = |slot: Option<Declared<B>>, role: &'static str| {
            slot.map(|declared| {
                if declared.key == base {
                    return Err(PolyError::config(ConfigError::SelfReference { base, role }));
                }
                decoders.insert(declared.key.id, declared.decode);
                Ok(declared.key)
            })
            .transpose()
        };
        let default_type = fallback(self.default_type, "default type")?;
        let undefined_type = fallback(self.undefined_type, "undefined type")?;
        let unknown_type = fallback(self.unknown_type, "unknown type")?;

        let mut mapping = SubtypeMapping::default();
        for (value, declared) in self.subtypes {
            if declared.key == base {
                return Err(PolyError::config(ConfigError::SelfReference {
                    base,
                    role: "subtype",
                }));
            }
            if mapping.by_value.contains_key(&value) {
                return Err(PolyError::config(ConfigError::DuplicateValue { base, value }));
            }
            decoders.insert(declared.key.id, declared.decode);
            mapping.by_value.insert(value.clone(), declared.key);
            mapping.entries.push((value, declared.key));
        }

        Ok(Family {
            descriptor: BaseTypeDescriptor {
                base,
                property_name: self.property_name,
                default_type,
                undefined_type,
                unknown_type,
            },
            mapping,
            decoders: Arc::new(Decoders::<B> { by_type: decoders }),
        })
    }
}

/// The registered base types, their type hierarchy and the inverse
/// discriminator index.
///
/// Most programs use the process-wide [`Registry::global`]; separate
/// registries are useful for tests and for isolated plugin sets.
pub struct Registry {
    registration: parking_lot::Mutex<()>,
    families: SnapshotMap<TypeId, Arc<Family>>,
    parents: SnapshotMap<TypeId, TypeKey>,
    pub(crate) values: SnapshotMap<TypeId, DiscriminatorValue>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registration: parking_lot::Mutex::new(()),
            families: SnapshotMap::new(),
            parents: SnapshotMap::new(),
            values: SnapshotMap::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Register a base type.
    ///
    /// Every subtype and fallback type is recorded as a child of the base in
    /// the type hierarchy. Nothing is published if any check fails, and a
    /// base type can only be registered once.
    pub fn register<B: 'static>(&self, base: BaseType<B>) -> Result<()> {
        let family = base.build()?;
        let base = family.descriptor.base;

        let _registration = self.registration.lock();
        if self.families.contains(&base.id) {
            return Err(PolyError::config(ConfigError::AlreadyRegistered { base }));
        }

        let children: HashSet<TypeKey> = family
            .mapping
            .iter()
            .map(|(_, ty)| ty)
            .chain(family.untagged_types())
            .chain(family.descriptor.unknown_type)
            .collect();
        let mut links = Vec::new();
        for &child in &children {
            if self.link_to_base(child, base, &children)? {
                links.push(child);
            }
        }
        // A subtype must not also be an ancestor of its base.
        let mut ancestor = self.parents.get(&base.id);
        while let Some(ty) = ancestor {
            if children.contains(&ty) {
                return Err(PolyError::config(ConfigError::HierarchyCycle { child: ty }));
            }
            ancestor = self.parents.get(&ty.id);
        }

        debug!(
            %base,
            property = family.descriptor.property_name(),
            subtypes = family.mapping.len(),
            "registering polymorphic base type"
        );

        // Links first: a lookup that sees the family must also see them.
        self.parents.update(|parents| {
            for child in links {
                parents.insert(child.id, base);
            }
            Ok::<_, PolyError>(true)
        })?;
        let family = Arc::new(family);
        self.families.update(|families| {
            families.insert(base.id, family);
            Ok::<_, PolyError>(true)
        })
    }

    /// Record that `C` derives from `P`.
    ///
    /// Links like this only matter for [`discriminator_value`]: a type
    /// finds its base by walking up its parents. A declared subtype may be
    /// moved below an intermediate type of the same base, in either order.
    ///
    /// [`discriminator_value`]: Registry::discriminator_value
    pub fn declare_parent<C: 'static, P: 'static>(&self) -> Result<()> {
        let child = TypeKey::of::<C>();
        let parent = TypeKey::of::<P>();

        let _registration = self.registration.lock();
        if child == parent {
            return Err(PolyError::config(ConfigError::HierarchyCycle { child }));
        }
        if !self.check_parent(child, parent)? {
            return Ok(());
        }

        // Walking up from the new parent must never reach the child.
        let mut seen = HashSet::new();
        let mut current = Some(parent);
        while let Some(ty) = current {
            if ty == child || !seen.insert(ty) {
                return Err(PolyError::config(ConfigError::HierarchyCycle { child }));
            }
            current = self.parents.get(&ty.id);
        }

        debug!(%child, %parent, "declaring parent");
        self.parents.update(|parents| {
            parents.insert(child.id, parent);
            Ok::<_, PolyError>(true)
        })
    }

    /// Whether linking `child` to `parent` changes the hierarchy.
    ///
    /// A new link may refine an existing one (the new parent sits below the
    /// old one), and an existing link that already sits below `parent` is
    /// kept. Anything else is a conflict.
    fn check_parent(&self, child: TypeKey, parent: TypeKey) -> Result<bool> {
        match self.parents.get(&child.id) {
            None => Ok(true),
            Some(existing) if existing == parent => Ok(false),
            Some(existing) if self.is_ancestor(existing, parent) => Ok(true),
            Some(existing) if self.is_ancestor(parent, existing) => Ok(false),
            Some(existing) => Err(PolyError::config(ConfigError::ParentConflict {
                child,
                existing,
                requested: parent,
            })),
        }
    }

    /// [`check_parent`](Self::check_parent) for the types of a family being
    /// registered, whose links to `base` are not published yet.
    fn link_to_base(
        &self,
        child: TypeKey,
        base: TypeKey,
        family: &HashSet<TypeKey>,
    ) -> Result<bool> {
        let Some(existing) = self.parents.get(&child.id) else {
            return Ok(true);
        };
        if existing == base {
            return Ok(false);
        }

        // Already below another member of the family, or below the base
        let mut seen = HashSet::new();
        let mut current = Some(existing);
        while let Some(ty) = current {
            if ty == base || family.contains(&ty) {
                return Ok(false);
            }
            if !seen.insert(ty) {
                break;
            }
            current = self.parents.get(&ty.id);
        }

        if self.is_ancestor(existing, base) {
            Ok(true)
        } else {
            Err(PolyError::config(ConfigError::ParentConflict {
                child,
                existing,
                requested: base,
            }))
        }
    }

    fn is_ancestor(&self, ancestor: TypeKey, of: TypeKey) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parents.get(&of.id);
        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }
            if !seen.insert(ty) {
                return false;
            }
            current = self.parents.get(&ty.id);
        }
        false
    }

    /// Whether `B` is a registered base type.
    pub fn is_registered<B: 'static>(&self) -> bool {
        self.families.contains(&TypeId::of::<B>())
    }

    /// The registered family of the base type `base`.
    pub fn family(&self, base: TypeKey) -> Result<Arc<Family>> {
        self.families
            .get(&base.id)
            .ok_or_else(|| PolyError::config(ConfigError::NotRegistered { base }))
    }

    /// The parent of `ty` in the type hierarchy, if it has one.
    pub fn parent_of(&self, ty: TypeKey) -> Option<TypeKey> {
        self.parents.get(&ty.id)
    }

    pub(crate) fn family_by_id(&self, id: TypeId) -> Option<Arc<Family>> {
        self.families.get(&id)
    }

    /// Pick the concrete type of base `B` for what the lookahead observed.
    pub fn resolve<B: 'static>(&self, observed: Observed<'_>) -> Result<TypeKey> {
        self.family(TypeKey::of::<B>())?.resolve(observed)
    }
}

/// Register a base type in the process-wide registry.
pub fn register<B: 'static>(base: BaseType<B>) -> Result<()> {
    Registry::global().register(base)
}
