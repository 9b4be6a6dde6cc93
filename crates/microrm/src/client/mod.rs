//! Prepared-statement execution.
//!
//! [`Client`] sits on top of a [`Driver`]. Reads are prepared, bound and
//! fetched. Commands always run inside one transaction: the statement is
//! prepared once and executed once per binding set, then committed; the first
//! failure rolls everything back.
//!
//! Parameter types are inferred from values before anything reaches the
//! driver, so a value with no parameter type fails the whole call up front.
//!
//! A driver is one session. The client holds a lock for the duration of each
//! operation, so concurrent callers sharing a client never interleave
//! statements inside another caller's transaction.

mod config;
#[cfg(test)]
pub(crate) mod mock;
pub mod postgres;

pub use config::{ClientConfig, SQL_TARGET};

use crate::builder::Binding;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::value::{Record, Value};
use std::future::Future;
use tokio::sync::Mutex;

const NO_PARAMS: &[Binding] = &[];

/// Parameter type a value is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Str,
    Null,
}

/// A value ready to be bound.
///
/// Floats are carried as their string form.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(bool),
    Int(i64),
    Str(String),
    Null,
}

impl SqlParam {
    pub fn param_type(&self) -> ParamType {
        match self {
            SqlParam::Bool(_) => ParamType::Bool,
            SqlParam::Int(_) => ParamType::Int,
            SqlParam::Str(_) => ParamType::Str,
            SqlParam::Null => ParamType::Null,
        }
    }

    /// Infer the parameter for `binding`.
    ///
    /// Fails with [`OrmError::TypeResolution`] for timestamps, which must be
    /// formatted by the data mapper first.
    pub fn resolve(binding: &Binding) -> OrmResult<Self> {
        Ok(match &binding.value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Int(i) => SqlParam::Int(*i),
            Value::Float(x) => SqlParam::Str(x.to_string()),
            Value::Text(s) => SqlParam::Str(s.clone()),
            other @ Value::Timestamp(_) => {
                return Err(OrmError::TypeResolution {
                    name: binding.name.clone(),
                    type_name: other.type_name(),
                });
            }
        })
    }
}

/// Binding sets for a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Bindings {
    /// One execution.
    Single(Vec<Binding>),
    /// One execution per set, all in the same transaction.
    Bulk(Vec<Vec<Binding>>),
}

impl Bindings {
    fn into_sets(self) -> Vec<Vec<Binding>> {
        match self {
            Bindings::Single(set) => vec![set],
            Bindings::Bulk(sets) => sets,
        }
    }
}

impl From<Vec<Binding>> for Bindings {
    fn from(set: Vec<Binding>) -> Self {
        Bindings::Single(set)
    }
}

impl From<Vec<Vec<Binding>>> for Bindings {
    fn from(sets: Vec<Vec<Binding>>) -> Self {
        Bindings::Bulk(sets)
    }
}

/// Connection-level operations a database driver provides.
pub trait Driver: Send + Sync {
    type Statement<'a>: PreparedStatement + 'a
    where
        Self: 'a;

    /// Prepare `sql` for binding and execution.
    fn prepare<'a>(
        &'a self,
        sql: &'a str,
    ) -> impl Future<Output = Result<Self::Statement<'a>, DriverError>> + Send + 'a;

    fn begin(&self) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn commit(&self) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn rollback(&self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Identifier generated by the most recent insert on this connection.
    fn last_insert_id(&self) -> impl Future<Output = Result<Option<i64>, DriverError>> + Send;
}

/// A statement prepared by a [`Driver`].
///
/// Values bound with [`bind_value`](Self::bind_value) stay bound until
/// overwritten, so a statement can be executed repeatedly with new values.
pub trait PreparedStatement: Send {
    /// Bind `param` to the placeholder called `name` (a 1-based index for
    /// positional and numbered placeholders).
    fn bind_value(&mut self, name: &str, param: &SqlParam) -> Result<(), DriverError>;

    /// Execute and return the number of affected rows.
    fn execute(&mut self) -> impl Future<Output = Result<u64, DriverError>> + Send;

    /// Execute and return every result row.
    fn fetch_all(&mut self) -> impl Future<Output = Result<Vec<Record>, DriverError>> + Send;
}

/// Executes queries and transactional commands through a [`Driver`].
#[derive(Debug)]
pub struct Client<D> {
    driver: D,
    config: ClientConfig,
    session: Mutex<()>,
}

impl<D: Driver> Client<D> {
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, ClientConfig::default())
    }

    pub fn with_config(driver: D, config: ClientConfig) -> Self {
        Self {
            driver,
            config,
            session: Mutex::new(()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run a read and return its rows.
    pub async fn execute_query(&self, sql: &str, bindings: &[Binding]) -> OrmResult<Vec<Record>> {
        let params = resolve_set(bindings)?;
        self.config.log_statement("query", sql, 1);

        let _session = self.session.lock().await;
        self.fetch(sql, bindings, &params).await
    }

    /// Run a command once per binding set inside one transaction.
    ///
    /// Returns the total number of affected rows. On any failure the
    /// transaction is rolled back and the failure is returned.
    pub async fn execute_command(&self, sql: &str, bindings: impl Into<Bindings>) -> OrmResult<u64> {
        let sets = bindings.into().into_sets();
        let params = sets
            .iter()
            .map(|set| resolve_set(set))
            .collect::<OrmResult<Vec<_>>>()?;
        self.config.log_statement("command", sql, sets.len());

        let _session = self.session.lock().await;
        self.begin().await?;
        let result = self.run_sets(sql, &sets, &params).await;
        self.finish(result).await
    }

    /// Run a single-row command that returns rows (`INSERT ... RETURNING`)
    /// inside one transaction.
    pub async fn execute_returning(
        &self,
        sql: &str,
        bindings: &[Binding],
    ) -> OrmResult<Vec<Record>> {
        let params = resolve_set(bindings)?;
        self.config.log_statement("command", sql, 1);

        let _session = self.session.lock().await;
        self.begin().await?;
        let result = self.fetch(sql, bindings, &params).await;
        self.finish(result).await
    }

    /// Identifier generated by the most recent insert.
    pub async fn last_insert_id(&self) -> OrmResult<Option<i64>> {
        let _session = self.session.lock().await;
        self.driver
            .last_insert_id()
            .await
            .map_err(|e| OrmError::execution("last_insert_id()", NO_PARAMS, e))
    }

    async fn begin(&self) -> OrmResult<()> {
        self.driver
            .begin()
            .await
            .map_err(|e| OrmError::execution("BEGIN", NO_PARAMS, e))
    }

    /// Commit on success, roll back on failure.
    async fn finish<T>(&self, result: OrmResult<T>) -> OrmResult<T> {
        match result {
            Ok(value) => {
                self.driver
                    .commit()
                    .await
                    .map_err(|e| OrmError::execution("COMMIT", NO_PARAMS, e))?;
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(target: SQL_TARGET, error = %error, "rolling back transaction");
                match self.driver.rollback().await {
                    Ok(()) => Err(error),
                    Err(rollback_err) => Err(OrmError::Other(format!(
                        "{error} (rollback failed: {rollback_err})"
                    ))),
                }
            }
        }
    }

    async fn fetch(
        &self,
        sql: &str,
        bindings: &[Binding],
        params: &[SqlParam],
    ) -> OrmResult<Vec<Record>> {
        let mut stmt = self
            .driver
            .prepare(sql)
            .await
            .map_err(|e| OrmError::execution(sql, bindings, e))?;
        bind_set(&mut stmt, sql, bindings, params)?;
        stmt.fetch_all()
            .await
            .map_err(|e| OrmError::execution(sql, bindings, e))
    }

    async fn run_sets(
        &self,
        sql: &str,
        sets: &[Vec<Binding>],
        params: &[Vec<SqlParam>],
    ) -> OrmResult<u64> {
        let mut stmt = self
            .driver
            .prepare(sql)
            .await
            .map_err(|e| OrmError::execution(sql, sets, e))?;

        let mut affected = 0;
        for (set, set_params) in sets.iter().zip(params) {
            bind_set(&mut stmt, sql, set, set_params)?;
            affected += stmt
                .execute()
                .await
                .map_err(|e| OrmError::execution(sql, set, e))?;
        }
        Ok(affected)
    }
}

fn resolve_set(bindings: &[Binding]) -> OrmResult<Vec<SqlParam>> {
    bindings.iter().map(SqlParam::resolve).collect()
}

fn bind_set<S: PreparedStatement>(
    stmt: &mut S,
    sql: &str,
    bindings: &[Binding],
    params: &[SqlParam],
) -> OrmResult<()> {
    for (binding, param) in bindings.iter().zip(params) {
        stmt.bind_value(&binding.name, param)
            .map_err(|e| OrmError::binding(sql, binding, e))?;
    }
    Ok(())
}
