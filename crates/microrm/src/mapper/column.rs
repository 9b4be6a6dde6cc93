use super::AttributeMapping;
use crate::coercion::SemanticType;
use crate::error::{OrmError, OrmResult};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
struct ColumnEntry {
    column: String,
    kind: Option<SemanticType>,
}

/// Bidirectional attribute ⇄ column renaming.
///
/// Names that are not configured map to themselves. The forward and reverse
/// lookup tables are built on first use and then shared read-only.
#[derive(Debug)]
pub struct ColumnMapper {
    entries: IndexMap<String, ColumnEntry>,
    to_column: OnceLock<HashMap<String, String>>,
    to_attribute: OnceLock<HashMap<String, String>>,
}

impl ColumnMapper {
    /// Build a mapper from configured attributes.
    ///
    /// Fails when a type name is unknown or two attributes share a column.
    pub fn new(attributes: &IndexMap<String, AttributeMapping>) -> OrmResult<Self> {
        let mut entries = IndexMap::with_capacity(attributes.len());
        let mut seen = HashSet::with_capacity(attributes.len());

        for (attribute, mapping) in attributes {
            let column = mapping
                .column
                .clone()
                .unwrap_or_else(|| attribute.clone());
            if !seen.insert(column.clone()) {
                return Err(OrmError::mapping_config(format!(
                    "column '{column}' is mapped by more than one attribute"
                )));
            }
            let kind = mapping
                .kind
                .as_deref()
                .map(str::parse::<SemanticType>)
                .transpose()?;
            entries.insert(attribute.clone(), ColumnEntry { column, kind });
        }

        Ok(Self {
            entries,
            to_column: OnceLock::new(),
            to_attribute: OnceLock::new(),
        })
    }

    /// Column for `attribute`, or `attribute` itself when unmapped.
    pub fn column_for<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.columns()
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute)
    }

    /// Attribute for `column`, or `column` itself when unmapped.
    pub fn attribute_for<'a>(&'a self, column: &'a str) -> &'a str {
        self.attributes()
            .get(column)
            .map(String::as_str)
            .unwrap_or(column)
    }

    /// Type declared for `attribute` in the configuration, if any.
    pub fn declared_type(&self, attribute: &str) -> Option<SemanticType> {
        self.entries.get(attribute).and_then(|e| e.kind)
    }

    /// Declared type of `attribute`, defaulting to [`SemanticType::String`].
    pub fn type_for(&self, attribute: &str) -> SemanticType {
        self.declared_type(attribute).unwrap_or_default()
    }

    /// Configured attribute names, in declaration order.
    pub fn configured_attributes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn columns(&self) -> &HashMap<String, String> {
        self.to_column.get_or_init(|| {
            tracing::trace!(target: "microrm.mapper", entries = self.entries.len(), "building column lookup");
            self.entries
                .iter()
                .map(|(attr, e)| (attr.clone(), e.column.clone()))
                .collect()
        })
    }

    fn attributes(&self) -> &HashMap<String, String> {
        self.to_attribute.get_or_init(|| {
            tracing::trace!(target: "microrm.mapper", entries = self.entries.len(), "building attribute lookup");
            self.entries
                .iter()
                .map(|(attr, e)| (e.column.clone(), attr.clone()))
                .collect()
        })
    }
}
