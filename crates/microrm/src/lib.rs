//! # microrm
//!
//! A small data-mapper ORM.
//!
//! ## Features
//!
//! - **Explicit mapping**: entities expose an accessor table (`#[derive(Entity)]`);
//!   a [`DataMapper`] renames attributes to columns and coerces values
//! - **Plain SQL rendering**: [`CrudQueryBuilder`] builds parameterized
//!   INSERT/SELECT/UPDATE/DELETE for backtick or double-quote dialects
//! - **Transactional commands**: every command, bulk or not, runs in one
//!   transaction and rolls back on the first failure
//! - **Config-driven**: table names, collection types and timestamp formats
//!   resolve per entity and per database from TOML
//!
//! ## Example
//!
//! ```ignore
//! use microrm::{CrudClient, Dialect, Entity, OrmConfig, PgDriver, Repository, filter};
//!
//! #[derive(Debug, Default, Entity)]
//! struct User {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! let config = OrmConfig::load("microrm.toml")?;
//! let crud = CrudClient::new(PgDriver::connect(&url).await?, Dialect::POSTGRES);
//! let users = Repository::new(&crud, config.data_mapper_for::<User>(None)?);
//!
//! let mut alice = User { id: None, name: "alice".into() };
//! users.persist(&mut alice).await?;
//! let found = users.find_one_by(&filter! { "name" => "alice" }).await?;
//! ```

pub mod builder;
pub mod client;
pub mod coercion;
pub mod config;
pub mod crud;
pub mod entity;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod repository;
pub mod value;

#[cfg(test)]
mod test_support;

pub use builder::{Binding, CrudQueryBuilder, DEFAULT_OFFSET, Dialect, Query};
pub use client::postgres::PgDriver;
pub use client::{Bindings, Client, ClientConfig, Driver, PreparedStatement, SqlParam};
pub use coercion::{SemanticType, TypeCoercer};
pub use config::{DatabaseConfig, EntityConfig, OrmConfig};
pub use crud::CrudClient;
pub use entity::{Accessor, AccessorTable, Entity, EntityCollection};
pub use error::{DriverError, OrmError, OrmResult};
pub use manager::{EntityManager, FlushReport};
pub use mapper::{AttributeMapping, ColumnMapper, DataMapper, MappingConfig};
pub use repository::{ID_ATTRIBUTE, Repository};
pub use value::{
    ConversionError, Direction, Filter, FilterValue, FromValue, IntoValue, OrderBy, Record, Value,
};

#[cfg(feature = "derive")]
pub use microrm_derive::Entity;
