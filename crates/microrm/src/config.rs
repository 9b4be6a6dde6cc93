//! Mapping configuration per database and entity.
//!
//! Settings resolve in three steps: the entity's own value, then the
//! database-wide value, then a built-in default. The first database declared
//! is the default one.
//!
//! ```toml
//! [main]
//! timestamp_format = "%Y-%m-%d %H:%M:%S"
//!
//! [main.entities.User]
//! table_name = "users"
//!
//! [main.entities.User.attributes]
//! name = { column = "user_name" }
//! created = { column = "created_at", type = "timestamp" }
//! ```

use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::mapper::{AttributeMapping, DataMapper, MappingConfig};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Named databases, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct OrmConfig {
    databases: IndexMap<String, DatabaseConfig>,
}

/// Database-wide defaults and per-entity settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub repository_type: Option<String>,
    pub collection_type: Option<String>,
    pub timestamp_format: Option<String>,
    pub entities: IndexMap<String, EntityConfig>,
}

/// Settings for one entity; anything left out falls back to the database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    pub repository_type: Option<String>,
    pub collection_type: Option<String>,
    pub timestamp_format: Option<String>,
    pub table_name: Option<String>,
    pub attributes: IndexMap<String, AttributeMapping>,
}

impl OrmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a database. The first one added is the default.
    pub fn database(mut self, name: impl Into<String>, config: DatabaseConfig) -> Self {
        self.databases.insert(name.into(), config);
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> OrmResult<Self> {
        toml::from_str(s).map_err(|e| OrmError::Config(format!("invalid mapping config: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn default_db_name(&self) -> Option<&str> {
        self.databases.keys().next().map(String::as_str)
    }

    pub fn database_names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn get_database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.get(name)
    }

    /// Resolve the mapping of `entity_name` in database `db`.
    ///
    /// `None` (or an empty name) selects the default database.
    pub fn mapping_for(&self, entity_name: &str, db: Option<&str>) -> OrmResult<MappingConfig> {
        let db_name = match db.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => self
                .default_db_name()
                .ok_or_else(|| OrmError::mapping_config("no database is configured"))?,
        };
        let database = self.databases.get(db_name).ok_or_else(|| {
            OrmError::mapping_config(format!("unknown database '{db_name}'"))
        })?;
        let entity = database.entities.get(entity_name);

        let defaults = MappingConfig::new(entity_name);
        Ok(MappingConfig {
            repository_type: resolve(
                entity.and_then(|e| e.repository_type.as_ref()),
                database.repository_type.as_ref(),
                defaults.repository_type,
            ),
            collection_type: resolve(
                entity.and_then(|e| e.collection_type.as_ref()),
                database.collection_type.as_ref(),
                defaults.collection_type,
            ),
            timestamp_format: resolve(
                entity.and_then(|e| e.timestamp_format.as_ref()),
                database.timestamp_format.as_ref(),
                defaults.timestamp_format,
            ),
            table_name: resolve(
                entity.and_then(|e| e.table_name.as_ref()),
                None,
                defaults.table_name,
            ),
            attributes: entity.map(|e| e.attributes.clone()).unwrap_or_default(),
            entity_name: defaults.entity_name,
        })
    }

    /// Build the [`DataMapper`] for `E` in database `db`.
    pub fn data_mapper_for<E: Entity>(&self, db: Option<&str>) -> OrmResult<DataMapper<E>> {
        DataMapper::new(self.mapping_for(E::NAME, db)?)
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository_type(mut self, value: impl Into<String>) -> Self {
        self.repository_type = Some(value.into());
        self
    }

    pub fn collection_type(mut self, value: impl Into<String>) -> Self {
        self.collection_type = Some(value.into());
        self
    }

    pub fn timestamp_format(mut self, value: impl Into<String>) -> Self {
        self.timestamp_format = Some(value.into());
        self
    }

    pub fn entity(mut self, name: impl Into<String>, config: EntityConfig) -> Self {
        self.entities.insert(name.into(), config);
        self
    }
}

impl EntityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository_type(mut self, value: impl Into<String>) -> Self {
        self.repository_type = Some(value.into());
        self
    }

    pub fn collection_type(mut self, value: impl Into<String>) -> Self {
        self.collection_type = Some(value.into());
        self
    }

    pub fn timestamp_format(mut self, value: impl Into<String>) -> Self {
        self.timestamp_format = Some(value.into());
        self
    }

    pub fn table_name(mut self, value: impl Into<String>) -> Self {
        self.table_name = Some(value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, mapping: AttributeMapping) -> Self {
        self.attributes.insert(name.into(), mapping);
        self
    }
}

/// Entity value, else database value, else the built-in default.
fn resolve(entity: Option<&String>, database: Option<&String>, default: String) -> String {
    entity.or(database).cloned().unwrap_or(default)
}
