//! [`Driver`] implementation over `tokio_postgres`.
//!
//! Statements must use numbered placeholders ([`Dialect::POSTGRES`]); a
//! binding named `"3"` fills `$3`. Bound values are converted to whatever
//! type the server inferred for the placeholder, and row values are decoded
//! into the scalar [`Value`]s records hold. Date/time columns come back as
//! text in the driver's timestamp format.
//!
//! [`Dialect::POSTGRES`]: crate::builder::Dialect::POSTGRES

use super::{Driver, PreparedStatement, SQL_TARGET, SqlParam};
use crate::coercion::DEFAULT_TIMESTAMP_FORMAT;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::value::{Record, Value};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::fmt::Write as _;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{NoTls, Row, Statement};

type BoxError = Box<dyn Error + Sync + Send>;

/// SQLSTATE `55000`: `lastval` called before any sequence was used.
const OBJECT_NOT_IN_PREREQUISITE_STATE: &str = "55000";

/// A single `tokio_postgres` connection used as a [`Driver`].
pub struct PgDriver {
    client: tokio_postgres::Client,
    timestamp_format: String,
}

impl PgDriver {
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    /// Format used to exchange date/time values as text.
    ///
    /// Should match the `timestamp_format` of the mappings used with this driver.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Connect without TLS and drive the connection on the current runtime.
    pub async fn connect(url: &str) -> OrmResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: SQL_TARGET, error = %e, "postgres connection error");
            }
        });
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }
}

impl std::fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDriver")
            .field("timestamp_format", &self.timestamp_format)
            .finish_non_exhaustive()
    }
}

impl Driver for PgDriver {
    type Statement<'a> = PgStatement<'a>;

    async fn prepare<'a>(&'a self, sql: &'a str) -> Result<PgStatement<'a>, DriverError> {
        let statement = self.client.prepare(sql).await?;
        let params = vec![None; statement.params().len()];
        Ok(PgStatement {
            driver: self,
            statement,
            params,
        })
    }

    async fn begin(&self) -> Result<(), DriverError> {
        Ok(self.client.batch_execute("BEGIN").await?)
    }

    async fn commit(&self) -> Result<(), DriverError> {
        Ok(self.client.batch_execute("COMMIT").await?)
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        Ok(self.client.batch_execute("ROLLBACK").await?)
    }

    async fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        match self.client.query_one("SELECT lastval()", &[]).await {
            Ok(row) => Ok(Some(row.try_get(0)?)),
            Err(e) => {
                let err = DriverError::from(e);
                if err.code.as_deref() == Some(OBJECT_NOT_IN_PREREQUISITE_STATE) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// A prepared statement with its current bindings.
pub struct PgStatement<'a> {
    driver: &'a PgDriver,
    statement: Statement,
    params: Vec<Option<SqlParam>>,
}

impl PgStatement<'_> {
    fn bound(&self) -> Result<Vec<PgParam<'_>>, DriverError> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| match p {
                Some(param) => Ok(PgParam {
                    param,
                    timestamp_format: &self.driver.timestamp_format,
                }),
                None => Err(DriverError::new(format!("placeholder ${} is not bound", i + 1))),
            })
            .collect()
    }
}

impl PreparedStatement for PgStatement<'_> {
    fn bind_value(&mut self, name: &str, param: &SqlParam) -> Result<(), DriverError> {
        let index: usize = name.parse().map_err(|_| {
            DriverError::new(format!(
                "postgres placeholders are numbered, cannot bind '{name}'"
            ))
        })?;
        let slot = index
            .checked_sub(1)
            .filter(|&i| i < self.params.len())
            .ok_or_else(|| DriverError::new(format!("statement has no placeholder ${index}")))?;
        let ty = &self.statement.params()[slot];
        check_param(param, ty, &self.driver.timestamp_format)
            .map_err(|e| DriverError::new(format!("cannot bind ${index} as {ty}: {e}")))?;
        self.params[slot] = Some(param.clone());
        Ok(())
    }

    async fn execute(&mut self) -> Result<u64, DriverError> {
        let params = self.bound()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Ok(self.driver.client.execute(&self.statement, &refs).await?)
    }

    async fn fetch_all(&mut self) -> Result<Vec<Record>, DriverError> {
        let params = self.bound()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self.driver.client.query(&self.statement, &refs).await?;
        rows.iter()
            .map(|row| decode_row(row, &self.driver.timestamp_format))
            .collect()
    }
}

/// A bound parameter converted on demand to the placeholder's server type.
#[derive(Debug)]
struct PgParam<'a> {
    param: &'a SqlParam,
    timestamp_format: &'a str,
}

impl PgParam<'_> {
    fn text(&self) -> String {
        match self.param {
            SqlParam::Str(s) => s.clone(),
            SqlParam::Int(i) => i.to_string(),
            SqlParam::Bool(true) => "1".to_string(),
            SqlParam::Bool(false) | SqlParam::Null => String::new(),
        }
    }

    fn int(&self) -> Result<i64, BoxError> {
        match self.param {
            SqlParam::Int(i) => Ok(*i),
            SqlParam::Bool(b) => Ok(i64::from(*b)),
            SqlParam::Str(s) => Ok(s.trim().parse::<i64>()?),
            SqlParam::Null => Ok(0),
        }
    }

    fn float(&self) -> Result<f64, BoxError> {
        match self.param {
            SqlParam::Int(i) => Ok(*i as f64),
            SqlParam::Bool(b) => Ok(f64::from(u8::from(*b))),
            SqlParam::Str(s) => Ok(s.trim().parse::<f64>()?),
            SqlParam::Null => Ok(0.0),
        }
    }

    fn bool(&self) -> bool {
        match self.param {
            SqlParam::Bool(b) => *b,
            SqlParam::Int(i) => *i != 0,
            SqlParam::Str(s) => !matches!(s.as_str(), "" | "0" | "f" | "false"),
            SqlParam::Null => false,
        }
    }

    fn timestamp(&self) -> Result<NaiveDateTime, BoxError> {
        Ok(NaiveDateTime::parse_from_str(&self.text(), self.timestamp_format)?)
    }

    fn date(&self) -> Result<NaiveDate, BoxError> {
        let text = self.text();
        match NaiveDateTime::parse_from_str(&text, self.timestamp_format) {
            Ok(ts) => Ok(ts.date()),
            Err(_) => Ok(NaiveDate::parse_from_str(&text, "%Y-%m-%d")?),
        }
    }
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if matches!(self.param, SqlParam::Null) {
            return Ok(IsNull::Yes);
        }

        if *ty == Type::BOOL {
            self.bool().to_sql(ty, out)
        } else if *ty == Type::INT2 {
            i16::try_from(self.int()?)?.to_sql(ty, out)
        } else if *ty == Type::INT4 {
            i32::try_from(self.int()?)?.to_sql(ty, out)
        } else if *ty == Type::INT8 {
            self.int()?.to_sql(ty, out)
        } else if *ty == Type::FLOAT4 {
            (self.float()? as f32).to_sql(ty, out)
        } else if *ty == Type::FLOAT8 {
            self.float()?.to_sql(ty, out)
        } else if *ty == Type::TIMESTAMP {
            self.timestamp()?.to_sql(ty, out)
        } else if *ty == Type::TIMESTAMPTZ {
            self.timestamp()?.and_utc().to_sql(ty, out)
        } else if *ty == Type::DATE {
            self.date()?.to_sql(ty, out)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            serde_json::from_str::<serde_json::Value>(&self.text())?.to_sql(ty, out)
        } else if *ty == Type::UUID {
            uuid::Uuid::parse_str(&self.text())?.to_sql(ty, out)
        } else if <&str as ToSql>::accepts(ty) {
            self.text().as_str().to_sql(ty, out)
        } else {
            Err(format!(
                "cannot bind {:?} parameter to column type {ty}",
                self.param.param_type()
            )
            .into())
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert `param` to `ty` without sending it, so a value the column cannot
/// hold is rejected when it is bound.
fn check_param(param: &SqlParam, ty: &Type, timestamp_format: &str) -> Result<(), BoxError> {
    let mut scratch = BytesMut::new();
    PgParam {
        param,
        timestamp_format,
    }
    .to_sql(ty, &mut scratch)
    .map(|_| ())
}

fn decode_row(row: &Row, timestamp_format: &str) -> Result<Record, DriverError> {
    let mut record = Record::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, i, column.type_(), timestamp_format).map_err(|e| {
            DriverError::new(format!("cannot decode column '{}': {e}", column.name()))
        })?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_value(row: &Row, i: usize, ty: &Type, timestamp_format: &str) -> Result<Value, BoxError> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(i)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(i)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(i)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(i)?.map(Value::Int)
    } else if *ty == Type::OID {
        row.try_get::<_, Option<u32>>(i)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(i)?.map(|v| Value::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(i)?.map(Value::Float)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(i)?
            .map(|ts| format_timestamp(&ts, timestamp_format).map(Value::Text))
            .transpose()?
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(i)?
            .map(|ts| format_timestamp(&ts.naive_utc(), timestamp_format).map(Value::Text))
            .transpose()?
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(i)?
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(i)?
            .map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(i)?
            .map(|v| Value::Text(v.to_string()))
    } else {
        row.try_get::<_, Option<String>>(i)?.map(Value::Text)
    };
    Ok(value.unwrap_or(Value::Null))
}

fn format_timestamp(ts: &NaiveDateTime, format: &str) -> Result<String, BoxError> {
    let mut out = String::new();
    write!(out, "{}", ts.format(format))
        .map_err(|_| format!("invalid timestamp format '{format}'"))?;
    Ok(out)
}
