//! Table-shaped CRUD on top of [`Client`] and [`CrudQueryBuilder`].

use crate::builder::{CrudQueryBuilder, Dialect};
use crate::client::{Bindings, Client, ClientConfig, Driver};
use crate::error::{OrmError, OrmResult};
use crate::value::{Filter, OrderBy, Record};

/// Renders CRUD statements and runs them through one [`Client`].
#[derive(Debug)]
pub struct CrudClient<D> {
    client: Client<D>,
    builder: CrudQueryBuilder,
}

impl<D: Driver> CrudClient<D> {
    pub fn new(driver: D, dialect: Dialect) -> Self {
        Self::with_client(Client::new(driver), dialect)
    }

    pub fn with_config(driver: D, dialect: Dialect, config: ClientConfig) -> Self {
        Self::with_client(Client::with_config(driver, config), dialect)
    }

    pub fn with_client(client: Client<D>, dialect: Dialect) -> Self {
        Self {
            client,
            builder: CrudQueryBuilder::new(dialect),
        }
    }

    pub fn client(&self) -> &Client<D> {
        &self.client
    }

    pub fn builder(&self) -> &CrudQueryBuilder {
        &self.builder
    }

    /// Insert one row.
    pub async fn create(&self, table: &str, data: &Record) -> OrmResult<u64> {
        let q = self.builder.create_query(table, data);
        self.client.execute_command(&q.sql, q.bindings).await
    }

    /// Insert one row and return `column` of the inserted row.
    ///
    /// Only for dialects with `RETURNING`; see [`Dialect::returning`].
    pub async fn create_returning(
        &self,
        table: &str,
        data: &Record,
        column: &str,
    ) -> OrmResult<Vec<Record>> {
        let q = self.builder.create_returning_query(table, data, column)?;
        self.client.execute_returning(&q.sql, &q.bindings).await
    }

    /// Insert several rows with one prepared statement in one transaction.
    ///
    /// Every row must have the same columns in the same order.
    pub async fn create_many(&self, table: &str, rows: &[Record]) -> OrmResult<u64> {
        let Some((first, rest)) = rows.split_first() else {
            return Ok(0);
        };

        let head = self.builder.create_query(table, first);
        let mut sets = Vec::with_capacity(rows.len());
        sets.push(head.bindings);
        for row in rest {
            if !row.keys().eq(first.keys()) {
                return Err(OrmError::validation(format!(
                    "bulk insert into '{table}' needs identical columns in every row"
                )));
            }
            sets.push(self.builder.create_query(table, row).bindings);
        }

        self.client
            .execute_command(&head.sql, Bindings::Bulk(sets))
            .await
    }

    /// Select rows. See [`CrudQueryBuilder::read_query`] for `offset`.
    pub async fn read(
        &self,
        table: &str,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<u64>,
        offset: u64,
    ) -> OrmResult<Vec<Record>> {
        let q = self
            .builder
            .read_query(table, filter, order_by, limit, offset);
        self.client.execute_query(&q.sql, &q.bindings).await
    }

    pub async fn update(&self, table: &str, filter: &Filter, data: &Record) -> OrmResult<u64> {
        let q = self.builder.update_query(table, filter, data)?;
        self.client.execute_command(&q.sql, q.bindings).await
    }

    pub async fn delete(&self, table: &str, filter: &Filter) -> OrmResult<u64> {
        let q = self.builder.delete_query(table, filter);
        self.client.execute_command(&q.sql, q.bindings).await
    }

    /// Identifier generated by the most recent insert.
    pub async fn last_insert_id(&self) -> OrmResult<Option<i64>> {
        self.client.last_insert_id().await
    }
}
