//! Error types for microrm

use thiserror::Error;

/// Result type alias for microrm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// An error reported by a [`Driver`](crate::client::Driver) or its prepared statements.
///
/// Drivers only know about the statement they were asked to run; the client attaches
/// the SQL text and parameters when it turns this into an [`OrmError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    /// Driver-specific error code (SQLSTATE for Postgres), if any.
    pub code: Option<String>,
    /// Human readable message.
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => Self::with_code(db_err.code().code(), db_err.message()),
            None => Self::new(err.to_string()),
        }
    }
}

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A runtime value has no bindable parameter type
    #[error("Invalid type '{type_name}' for query parameter '{name}'")]
    TypeResolution {
        name: String,
        type_name: &'static str,
    },

    /// The driver rejected binding a parameter
    #[error("Could not bind value {binding} for query '{sql}': {source}")]
    Binding {
        sql: String,
        binding: String,
        #[source]
        source: DriverError,
    },

    /// The driver rejected preparing or executing a statement
    #[error("Could not execute query '{sql}' with params {params}: {source}")]
    Execution {
        sql: String,
        params: String,
        #[source]
        source: DriverError,
    },

    /// Timestamp format/parse mismatch
    #[error("Format error: {0}")]
    Format(String),

    /// No row matched a single-entity lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one row matched a single-entity lookup
    #[error("Should find exactly one entity and found {found}")]
    AmbiguousResult { found: usize },

    /// Missing or invalid mapping configuration
    #[error("Mapping config error: {0}")]
    MappingConfig(String),

    /// Entity does not expose an expected attribute (or cannot hold its value)
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// A statement could not be built from its inputs
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a timestamp format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create a mapping configuration error
    pub fn mapping_config(message: impl Into<String>) -> Self {
        Self::MappingConfig(message.into())
    }

    /// Create an introspection error
    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an execution error for a statement failure.
    pub fn execution(sql: &str, params: impl serde::Serialize, source: DriverError) -> Self {
        Self::Execution {
            sql: sql.to_string(),
            params: to_json(&params),
            source,
        }
    }

    /// Create a binding error for a single rejected parameter.
    pub fn binding(sql: &str, binding: impl serde::Serialize, source: DriverError) -> Self {
        Self::Binding {
            sql: sql.to_string(),
            binding: to_json(&binding),
            source,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is an ambiguous result error
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousResult { .. })
    }

    /// Check if this is a type resolution error
    pub fn is_type_resolution(&self) -> bool {
        matches!(self, Self::TypeResolution { .. })
    }
}

fn to_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_carries_sql_and_params() {
        let err = OrmError::execution(
            "DELETE FROM `users`",
            vec![("1", 5)],
            DriverError::with_code("42P01", "relation does not exist"),
        );
        let msg = err.to_string();
        assert!(msg.contains("DELETE FROM `users`"));
        assert!(msg.contains("[[\"1\",5]]"));
        assert!(msg.contains("relation does not exist"));
    }

    #[test]
    fn predicates() {
        assert!(OrmError::not_found("x").is_not_found());
        assert!(OrmError::AmbiguousResult { found: 2 }.is_ambiguous());
        assert!(
            OrmError::TypeResolution {
                name: "a".into(),
                type_name: "timestamp"
            }
            .is_type_resolution()
        );
    }
}
