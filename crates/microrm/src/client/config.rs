use tracing::Level;

/// Tracing target for statement events.
pub const SQL_TARGET: &str = "microrm.sql";

/// Configuration for [`Client`](super::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Level statements are logged at before they are prepared.
    pub sql_log_level: Level,
    /// Truncate logged SQL (in bytes, on a char boundary). `None` logs it whole.
    pub max_sql_length: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sql_log_level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the statement log level.
    pub fn sql_log_level(mut self, level: Level) -> Self {
        self.sql_log_level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    pub(crate) fn log_statement(&self, kind: &'static str, sql: &str, binding_sets: usize) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        emit_at_level!(
            self.sql_log_level,
            target: SQL_TARGET,
            kind,
            binding_sets,
            sql = %sql,
        );
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ClientConfig::new().sql_log_level(Level::INFO).max_sql_length(10);
        assert_eq!(cfg.sql_log_level, Level::INFO);
        assert_eq!(cfg.truncate_sql("SELECT * FROM users"), "SELECT * F...");
        assert_eq!(cfg.no_truncate().truncate_sql("SELECT * FROM users"), "SELECT * FROM users");
    }
}
