//! metacache configuration
//!
//! Settings are read from up to three places, later ones winning:
//! - Global config: `~/.metacache/config.toml`
//! - Local config: `.metacache/config.toml` under the working directory
//! - Command-line overrides via [`ConfigOverrides`]
//!
//! ```toml
//! [catalog]
//! path = "catalog.db"
//! default_schema = "SALES"
//! busy_timeout_ms = 5000
//!
//! [cache]
//! dedupe_anomalies = true
//!
//! [logging]
//! level = "info"
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Log levels accepted in `logging.level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound for `catalog.busy_timeout_ms`
const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Fully merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub catalog: CatalogConfig,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

/// Where catalog metadata is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite catalog database
    pub path: Option<PathBuf>,

    /// Schema used when a command names none
    pub default_schema: Option<String>,

    /// How long to wait on a locked catalog, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_schema: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl CatalogConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Log an unknown parent once per load instead of once per row
    pub dedupe_anomalies: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dedupe_anomalies: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of [`LOG_LEVELS`]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub default_schema: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub dedupe_anomalies: Option<bool>,
    pub log_level: Option<String>,
}

impl CacheConfig {
    /// Apply command-line overrides on top of file settings.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.catalog_path {
            self.catalog.path = Some(path.clone());
        }
        if let Some(ref schema) = overrides.default_schema {
            self.catalog.default_schema = Some(schema.clone());
        }
        if let Some(timeout) = overrides.busy_timeout_ms {
            self.catalog.busy_timeout_ms = timeout;
        }
        if let Some(dedupe) = overrides.dedupe_anomalies {
            self.cache.dedupe_anomalies = dedupe;
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Check value ranges that TOML parsing cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::invalid_value(
                "catalog.busy_timeout_ms",
                format!("must be at most {}", MAX_BUSY_TIMEOUT_MS),
            ));
        }
        if self.catalog.default_schema.as_deref() == Some("") {
            return Err(ConfigError::invalid_value(
                "catalog.default_schema",
                "must not be empty",
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.catalog.path, None);
        assert_eq!(config.catalog.busy_timeout(), Duration::from_secs(5));
        assert!(config.cache.dedupe_anomalies);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CacheConfig = toml::from_str(
            r#"
            [catalog]
            path = "meta.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.path, Some(PathBuf::from("meta.db")));
        assert_eq!(config.catalog.busy_timeout_ms, 5000);
        assert!(config.cache.dedupe_anomalies);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = CacheConfig::default();
        let overrides = ConfigOverrides {
            catalog_path: Some(PathBuf::from("/data/catalog.db")),
            dedupe_anomalies: Some(false),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.catalog.path, Some(PathBuf::from("/data/catalog.db")));
        assert!(!config.cache.dedupe_anomalies);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.catalog.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CacheConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));

        let mut config = CacheConfig::default();
        config.catalog.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());

        let mut config = CacheConfig::default();
        config.catalog.default_schema = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_level_is_case_insensitive() {
        let mut config = CacheConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = CacheConfig::default();
        config.catalog.default_schema = Some("SALES".to_string());

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CacheConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
