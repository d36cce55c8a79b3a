//! Startup configuration for the report service binary.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8002;

/// Default time allowed for the first database connection.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable, for development.
    Pretty,
}

impl LogFormat {
    /// Parse `LOG_FORMAT`; anything but `pretty` is JSON.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ => Self::Json,
        }
    }
}

/// Service startup settings.
///
/// Store and cache settings live in `PostgresConfig` and `CacheConfig`;
/// this covers the listener, logging and startup behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Log output format.
    pub log_format: LogFormat,
    /// Create missing tables before serving.
    pub run_migrations: bool,
    /// Deadline for the initial database connection.
    pub startup_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_format: LogFormat::default(),
            run_migrations: false,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    ///
    /// Reads `HOST`, `PORT`, `LOG_FORMAT`, `RUN_MIGRATIONS` (`1` enables)
    /// and `DB_STARTUP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build config from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            log_format: LogFormat::from_param(lookup("LOG_FORMAT").as_deref()),
            run_migrations: lookup("RUN_MIGRATIONS").as_deref() == Some("1"),
            startup_timeout: lookup("DB_STARTUP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.startup_timeout),
        }
    }

    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.addr().unwrap().port(), 8002);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("LOG_FORMAT", "Pretty"),
            ("RUN_MIGRATIONS", "1"),
            ("DB_STARTUP_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:9100");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.run_migrations);
        assert_eq!(config.startup_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("PORT", "eighty"),
            ("LOG_FORMAT", "xml"),
            ("RUN_MIGRATIONS", "yes"),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_bad_host_is_an_error() {
        assert!(config(&[("HOST", "not a host")]).addr().is_err());
    }
}
