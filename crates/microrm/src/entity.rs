//! Entity accessor tables.
//!
//! An [`Entity`] exposes its attributes as a list of [`Accessor`]s: a name, the
//! semantic type of the backing field, and plain function pointers to read and
//! write it. `#[derive(Entity)]` generates the list; it can also be written by
//! hand with non-capturing closures.
//!
//! ```ignore
//! #[derive(Debug, Default, microrm::Entity)]
//! struct User {
//!     id: Option<i64>,
//!     name: String,
//!     #[orm(skip)]
//!     scratch: Vec<u8>,
//! }
//! ```

use crate::coercion::SemanticType;
use crate::error::{OrmError, OrmResult};
use crate::value::{ConversionError, Value};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

/// An application object whose attributes can be read and written by name.
pub trait Entity: Default + Send + Sync + 'static {
    /// Entity name used to look up its mapping configuration.
    const NAME: &'static str;

    /// Accessors for every mapped attribute, in declaration order.
    fn accessors() -> Vec<Accessor<Self>>;
}

/// Read/write access to one attribute of `E`.
pub struct Accessor<E> {
    pub name: &'static str,
    /// Semantic type of the backing field.
    pub kind: SemanticType,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<(), ConversionError>,
}

impl<E> Accessor<E> {
    pub fn new(
        name: &'static str,
        kind: SemanticType,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<(), ConversionError>,
    ) -> Self {
        Self {
            name,
            kind,
            get,
            set,
        }
    }
}

impl<E> Clone for Accessor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Accessor<E> {}

impl<E> fmt::Debug for Accessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Accessors of `E` indexed by attribute name.
pub struct AccessorTable<E> {
    accessors: Vec<Accessor<E>>,
    by_name: HashMap<&'static str, usize>,
}

impl<E: Entity> AccessorTable<E> {
    pub fn new() -> Self {
        let accessors = E::accessors();
        let by_name = accessors
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name, i))
            .collect();
        Self { accessors, by_name }
    }
}

impl<E: Entity> Default for AccessorTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AccessorTable<E> {
    pub fn iter(&self) -> impl Iterator<Item = &Accessor<E>> {
        self.accessors.iter()
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub fn find(&self, attribute: &str) -> Option<&Accessor<E>> {
        self.by_name.get(attribute).map(|&i| &self.accessors[i])
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.by_name.contains_key(attribute)
    }

    /// Read `attribute` from `entity`.
    pub fn get(&self, entity: &E, attribute: &str) -> OrmResult<Value> {
        let accessor = self.require(attribute)?;
        Ok((accessor.get)(entity))
    }

    /// Write `value` into `attribute` of `entity`.
    pub fn set(&self, entity: &mut E, attribute: &str, value: Value) -> OrmResult<()> {
        let accessor = self.require(attribute)?;
        (accessor.set)(entity, value).map_err(|e| {
            OrmError::introspection(format!("cannot write attribute '{attribute}': {e}"))
        })
    }

    fn require(&self, attribute: &str) -> OrmResult<&Accessor<E>> {
        self.find(attribute).ok_or_else(|| {
            OrmError::introspection(format!("entity has no attribute '{attribute}'"))
        })
    }
}

impl<E> fmt::Debug for AccessorTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.accessors.iter()).finish()
    }
}

/// An ordered list of entities tagged with its configured collection type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection<E> {
    kind: String,
    items: Vec<E>,
}

impl<E> EntityCollection<E> {
    pub fn new(kind: impl Into<String>, items: Vec<E>) -> Self {
        Self {
            kind: kind.into(),
            items,
        }
    }

    /// Configured collection type name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&E> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<E> {
        self.items
    }
}

impl<E> Index<usize> for EntityCollection<E> {
    type Output = E;

    fn index(&self, index: usize) -> &E {
        &self.items[index]
    }
}

impl<E> IntoIterator for EntityCollection<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EntityCollection<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FromValue, IntoValue};

    #[derive(Debug, Default, PartialEq)]
    struct Tag {
        id: Option<i64>,
        label: String,
    }

    impl Entity for Tag {
        const NAME: &'static str = "Tag";

        fn accessors() -> Vec<Accessor<Self>> {
            vec![
                Accessor::<Self>::new(
                    "id",
                    <Option<i64> as IntoValue>::KIND,
                    |e| e.id.into_value(),
                    |e, v| {
                        e.id = FromValue::from_value(v)?;
                        Ok(())
                    },
                ),
                Accessor::<Self>::new(
                    "label",
                    <String as IntoValue>::KIND,
                    |e| e.label.clone().into_value(),
                    |e, v| {
                        e.label = FromValue::from_value(v)?;
                        Ok(())
                    },
                ),
            ]
        }
    }

    #[test]
    fn table_reads_and_writes_by_name() {
        let table = AccessorTable::<Tag>::new();
        let mut tag = Tag::default();
        table.set(&mut tag, "label", Value::from("rust")).unwrap();
        table.set(&mut tag, "id", Value::Int(3)).unwrap();
        assert_eq!(tag, Tag { id: Some(3), label: "rust".into() });
        assert_eq!(table.get(&tag, "label").unwrap(), Value::from("rust"));
        assert_eq!(table.find("id").unwrap().kind, SemanticType::Integer);
    }

    #[test]
    fn unknown_attribute_is_introspection_error() {
        let table = AccessorTable::<Tag>::new();
        let err = table.get(&Tag::default(), "missing").unwrap_err();
        assert!(matches!(err, OrmError::Introspection(_)));
    }

    #[test]
    fn wrong_value_type_is_introspection_error() {
        let table = AccessorTable::<Tag>::new();
        let mut tag = Tag::default();
        let err = table.set(&mut tag, "id", Value::Bool(true)).unwrap_err();
        assert!(err.to_string().contains("attribute 'id'"));
    }

    #[test]
    fn collection_keeps_order_and_kind() {
        let c = EntityCollection::new("TagCollection", vec![1, 2, 3]);
        assert_eq!(c.kind(), "TagCollection");
        assert_eq!(c[1], 2);
        assert_eq!(c.into_vec(), vec![1, 2, 3]);
    }
}
