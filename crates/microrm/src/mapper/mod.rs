//! Entity ⇄ record mapping.
//!
//! - [`ColumnMapper`]: attribute ⇄ column renaming and declared types.
//! - [`DataMapper`]: whole entities ⇄ records, collections ⇄ record lists,
//!   attribute filters ⇄ column filters.
//! - [`MappingConfig`]: the resolved per-entity settings both are built from.

mod column;
mod data;

pub use column::ColumnMapper;
pub use data::DataMapper;

use crate::coercion::DEFAULT_TIMESTAMP_FORMAT;
use indexmap::IndexMap;
use serde::Deserialize;

/// Column name and type name declared for one attribute.
///
/// Missing entries fall back to the attribute name and to the semantic type of
/// the entity field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributeMapping {
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl AttributeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Fully resolved mapping settings for one entity type.
///
/// Usually produced by [`OrmConfig`](crate::OrmConfig), but can be built
/// directly:
///
/// ```ignore
/// let cfg = MappingConfig::new("User")
///     .table_name("users")
///     .attribute("created", AttributeMapping::new().column("created_at").kind("timestamp"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    pub entity_name: String,
    pub table_name: String,
    pub repository_type: String,
    pub collection_type: String,
    pub timestamp_format: String,
    pub attributes: IndexMap<String, AttributeMapping>,
}

impl MappingConfig {
    /// Settings with every value defaulted from the entity name.
    pub fn new(entity_name: impl Into<String>) -> Self {
        let entity_name = entity_name.into();
        Self {
            table_name: entity_name.clone(),
            repository_type: default_repository_type(&entity_name),
            collection_type: default_collection_type(&entity_name),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            attributes: IndexMap::new(),
            entity_name,
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn repository_type(mut self, repository_type: impl Into<String>) -> Self {
        self.repository_type = repository_type.into();
        self
    }

    pub fn collection_type(mut self, collection_type: impl Into<String>) -> Self {
        self.collection_type = collection_type.into();
        self
    }

    pub fn timestamp_format(mut self, timestamp_format: impl Into<String>) -> Self {
        self.timestamp_format = timestamp_format.into();
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, mapping: AttributeMapping) -> Self {
        self.attributes.insert(name.into(), mapping);
        self
    }
}

pub(crate) fn default_repository_type(entity_name: &str) -> String {
    format!("{entity_name}Repository")
}

pub(crate) fn default_collection_type(entity_name: &str) -> String {
    format!("{entity_name}Collection")
}
