//! CRUD statement rendering.
//!
//! [`CrudQueryBuilder`] turns a table name plus column-keyed maps into SQL
//! text and an ordered list of bindings. It never touches the database.
//!
//! ```ignore
//! use microrm::{CrudQueryBuilder, Dialect, filter};
//!
//! let qb = CrudQueryBuilder::new(Dialect::MYSQL);
//! let q = qb.delete_query("users", &filter! { "status" => vec!["banned", "spam"] });
//! assert_eq!(q.sql, "DELETE FROM `users` WHERE (`status`=? OR `status`=?)");
//! ```

pub mod dialect;
mod where_builder;

pub use dialect::{Dialect, IdentQuote, PlaceholderStyle};

use crate::error::{OrmError, OrmResult};
use crate::value::{Filter, OrderBy, Record, Value};
use serde::Serialize;
use where_builder::{Params, WhereBuilder};

/// Offset value that is treated as "no offset".
///
/// A read with `offset == DEFAULT_OFFSET` renders no `OFFSET` clause; any
/// other value, `0` included, is rendered.
pub const DEFAULT_OFFSET: u64 = 1;

/// One bound parameter: placeholder name and value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// SQL text plus its bindings in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

impl Query {
    /// Bound values in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.bindings.iter().map(|b| &b.value)
    }
}

/// Renders INSERT/SELECT/UPDATE/DELETE statements for one [`Dialect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrudQueryBuilder {
    dialect: Dialect,
}

impl CrudQueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// `INSERT INTO <t> (<cols>) VALUES (<phs>)` in record key order.
    pub fn create_query(&self, table: &str, data: &Record) -> Query {
        let mut params = Params::new(&self.dialect);
        let mut columns = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (column, value) in data {
            columns.push(self.dialect.quote_ident(column));
            placeholders.push(params.push(column, value.clone()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        Query {
            sql,
            bindings: params.into_bindings(),
        }
    }

    /// `INSERT ... RETURNING <column>`, for dialects that support it.
    ///
    /// Fails with [`OrmError::Validation`] when the dialect has no `RETURNING`.
    pub fn create_returning_query(
        &self,
        table: &str,
        data: &Record,
        column: &str,
    ) -> OrmResult<Query> {
        if !self.dialect.returning {
            return Err(OrmError::validation(format!(
                "dialect cannot return '{column}' from an INSERT into '{table}'"
            )));
        }
        let mut q = self.create_query(table, data);
        q.sql.push_str(" RETURNING ");
        self.dialect.write_ident(column, &mut q.sql);
        Ok(q)
    }

    /// `SELECT * FROM <t>` with optional WHERE, ORDER BY, LIMIT and OFFSET.
    ///
    /// `OFFSET` is left out when `offset` equals [`DEFAULT_OFFSET`].
    pub fn read_query(
        &self,
        table: &str,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<u64>,
        offset: u64,
    ) -> Query {
        let mut params = Params::new(&self.dialect);
        let mut sql = format!("SELECT * FROM {}", self.dialect.quote_ident(table));

        WhereBuilder::from_filter(&self.dialect, filter, &mut params).append_to(&mut sql);

        if !order_by.is_empty() {
            let items: Vec<String> = order_by
                .iter()
                .map(|(column, dir)| format!("{} {}", self.dialect.quote_ident(column), dir))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if offset != DEFAULT_OFFSET {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Query {
            sql,
            bindings: params.into_bindings(),
        }
    }

    /// `UPDATE <t> SET <c>=<ph>, ...` with an optional WHERE.
    ///
    /// SET bindings precede WHERE bindings. Fails when `data` is empty.
    pub fn update_query(&self, table: &str, filter: &Filter, data: &Record) -> OrmResult<Query> {
        if data.is_empty() {
            return Err(OrmError::validation(format!(
                "UPDATE on '{table}' requires at least one column"
            )));
        }

        let mut params = Params::new(&self.dialect);
        let set: Vec<String> = data
            .iter()
            .map(|(column, value)| {
                let ph = params.push(column, value.clone());
                format!("{}={ph}", self.dialect.quote_ident(column))
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.quote_ident(table),
            set.join(", ")
        );
        WhereBuilder::from_filter(&self.dialect, filter, &mut params).append_to(&mut sql);

        Ok(Query {
            sql,
            bindings: params.into_bindings(),
        })
    }

    /// `DELETE FROM <t>` with an optional WHERE.
    pub fn delete_query(&self, table: &str, filter: &Filter) -> Query {
        let mut params = Params::new(&self.dialect);
        let mut sql = format!("DELETE FROM {}", self.dialect.quote_ident(table));
        WhereBuilder::from_filter(&self.dialect, filter, &mut params).append_to(&mut sql);
        Query {
            sql,
            bindings: params.into_bindings(),
        }
    }
}
