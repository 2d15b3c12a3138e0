//! Application configuration loaded from environment variables.

use service_layer::{BusSettings, DEFAULT_STOCK_ALERTS_RECIPIENT};
use stock_store::{ConcurrencyMode, ParseConcurrencyModeError};
use thiserror::Error;

/// Errors raised for configuration values that cannot be defaulted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CONCURRENCY_MODE: {0}")]
    ConcurrencyMode(#[from] ParseConcurrencyModeError),
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `CONCURRENCY_MODE`: `optimistic` or `pessimistic` (default: `optimistic`)
/// - `STOCK_ALERTS_RECIPIENT`: where out-of-stock alerts go
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub concurrency: ConcurrencyMode,
    pub stock_alerts_recipient: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    ///
    /// Unparseable numbers fall back to their default. An unknown
    /// concurrency mode is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let concurrency = match lookup("CONCURRENCY_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.concurrency,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(format) if format.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            concurrency,
            stock_alerts_recipient: lookup("STOCK_ALERTS_RECIPIENT")
                .unwrap_or(defaults.stock_alerts_recipient),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings the message bus is bootstrapped with.
    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            concurrency: self.concurrency,
            stock_alerts_recipient: self.stock_alerts_recipient.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            concurrency: ConcurrencyMode::Optimistic,
            stock_alerts_recipient: DEFAULT_STOCK_ALERTS_RECIPIENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.stock_alerts_recipient, "stock@made.com");
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = from_vars(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/allocation"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("CONCURRENCY_MODE", "Pessimistic"),
            ("STOCK_ALERTS_RECIPIENT", "alerts@example.com"),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/allocation")
        );
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.concurrency, ConcurrencyMode::Pessimistic);

        let settings = config.bus_settings();
        assert_eq!(settings.concurrency, ConcurrencyMode::Pessimistic);
        assert_eq!(settings.stock_alerts_recipient, "alerts@example.com");
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = from_vars(&[("PORT", "http"), ("DATABASE_MAX_CONNECTIONS", "-1")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 5);
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = from_vars(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_unknown_concurrency_mode_is_rejected() {
        let err = from_vars(&[("CONCURRENCY_MODE", "yolo")]).unwrap_err();
        assert!(err.to_string().contains("yolo"));
    }
}
