//! Layered configuration loading.
//!
//! Defaults, then `~/.metacache/config.toml`, then `.metacache/config.toml`
//! in the working directory, then command-line overrides. A key left out of
//! a file keeps the value from the layer below.

use crate::error::ConfigError;
use crate::{CacheConfig, CacheSettings, CatalogConfig, ConfigOverrides, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding the config file, both under home and locally
const CONFIG_DIR: &str = ".metacache";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// `~/.metacache`, if a home directory exists
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
        }
    }

    /// Use `global_dir` in place of `~/.metacache` (tests, sandboxes)
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Merge every layer for `root` and validate the result.
    pub fn load(
        &self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CacheConfig, ConfigError> {
        let mut config = CacheConfig::default();

        if let Some(global) = self.load_global()? {
            config = merge_configs(config, global);
        }
        if let Some(local) = self.load_local(root)? {
            config = merge_configs(config, local);
        }
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults, then one explicit file, then overrides; the global and local
    /// files are not read.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CacheConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        let mut config: CacheConfig =
            toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?;
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load_global(&self) -> Result<Option<CacheConfig>, ConfigError> {
        let Some(path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };
        load_if_present(&path)
    }

    pub fn load_local(&self, root: &Path) -> Result<Option<CacheConfig>, ConfigError> {
        load_if_present(&self.local_config_path(root))
    }

    /// Write a default global config unless one exists; returns its path.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path().ok_or(ConfigError::NoHomeDir)?;
        write_default(&path)?;
        Ok(path)
    }

    /// Write a default local config under `root` unless one exists.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(root);
        write_default(&path)?;
        Ok(path)
    }
}

fn load_if_present(path: &Path) -> Result<Option<CacheConfig>, ConfigError> {
    if !path.exists() {
        trace!("No config at {:?}", path);
        return Ok(None);
    }
    debug!("Loading config from {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::parse(path, e))
}

fn write_default(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        debug!("Config already present at {:?}", path);
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
    }
    let content = toml::to_string_pretty(&CacheConfig::default())?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Merge two layers, `overlay` winning wherever it differs from the default.
fn merge_configs(base: CacheConfig, overlay: CacheConfig) -> CacheConfig {
    CacheConfig {
        catalog: merge_catalog(base.catalog, overlay.catalog),
        cache: merge_cache(base.cache, overlay.cache),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_catalog(base: CatalogConfig, overlay: CatalogConfig) -> CatalogConfig {
    let defaults = CatalogConfig::default();
    CatalogConfig {
        path: overlay.path.or(base.path),
        default_schema: overlay.default_schema.or(base.default_schema),
        busy_timeout_ms: if overlay.busy_timeout_ms != defaults.busy_timeout_ms {
            overlay.busy_timeout_ms
        } else {
            base.busy_timeout_ms
        },
    }
}

fn merge_cache(base: CacheSettings, overlay: CacheSettings) -> CacheSettings {
    CacheSettings {
        // Only `false` can be an explicit choice
        dedupe_anomalies: base.dedupe_anomalies && overlay.dedupe_anomalies,
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != LoggingConfig::default().level {
            overlay.level
        } else {
            base.level
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_local(root: &Path, content: &str) {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    fn write_global(global_dir: &Path, content: &str) {
        std::fs::create_dir_all(global_dir).unwrap();
        std::fs::write(global_dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_no_files_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        write_global(
            &global_dir,
            r#"
            [catalog]
            path = "/shared/catalog.db"
            busy_timeout_ms = 20000

            [logging]
            level = "debug"
            "#,
        );
        write_local(
            temp.path(),
            r#"
            [catalog]
            path = "local.db"
            "#,
        );

        let loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.catalog.path, Some(PathBuf::from("local.db")));
        // Keys absent locally keep the global values
        assert_eq!(config.catalog.busy_timeout_ms, 20000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_disabled_dedupe_survives_merge() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        write_global(&global_dir, "[cache]\ndedupe_anomalies = false\n");
        write_local(temp.path(), "[logging]\nlevel = \"warn\"\n");

        let config = ConfigLoader::with_global_dir(&global_dir)
            .load(temp.path(), None)
            .unwrap();

        assert!(!config.cache.dedupe_anomalies);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_overrides_win() {
        let temp = TempDir::new().unwrap();
        write_local(temp.path(), "[catalog]\ndefault_schema = \"SALES\"\n");

        let overrides = ConfigOverrides {
            default_schema: Some("HR".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        let config = ConfigLoader::with_global_dir(temp.path().join("global"))
            .load(temp.path(), Some(&overrides))
            .unwrap();

        assert_eq!(config.catalog.default_schema.as_deref(), Some("HR"));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_merged_value_is_rejected() {
        let temp = TempDir::new().unwrap();
        write_local(temp.path(), "[logging]\nlevel = \"chatty\"\n");

        let result = ConfigLoader::with_global_dir(temp.path().join("global")).load(temp.path(), None);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let temp = TempDir::new().unwrap();
        write_local(temp.path(), "[catalog\npath = 1");

        let err = ConfigLoader::with_global_dir(temp.path().join("global"))
            .load(temp.path(), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_DIR));
    }

    #[test]
    fn test_init_local_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let path = loader.init_local(temp.path()).unwrap();
        assert_eq!(path, temp.path().join(".metacache").join("config.toml"));
        assert_eq!(loader.load_local(temp.path()).unwrap(), Some(CacheConfig::default()));

        std::fs::write(&path, "[logging]\nlevel = \"error\"\n").unwrap();
        loader.init_local(temp.path()).unwrap();
        let config = loader.load_local(temp.path()).unwrap().unwrap();
        assert_eq!(config.logging.level, "error");
    }

    #[test]
    fn test_load_file_skips_layers() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        write_global(&global_dir, "[logging]\nlevel = \"debug\"\n");
        let explicit = temp.path().join("ci.toml");
        std::fs::write(&explicit, "[catalog]\npath = \"ci.db\"\n").unwrap();

        let config = ConfigLoader::with_global_dir(&global_dir)
            .load_file(&explicit, None)
            .unwrap();

        assert_eq!(config.catalog.path, Some(PathBuf::from("ci.db")));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = ConfigLoader::with_global_dir(temp.path())
            .load_file(&temp.path().join("absent.toml"), None);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_init_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("home").join(".metacache");
        let loader = ConfigLoader::with_global_dir(&global_dir);

        let path = loader.init_global().unwrap();
        assert!(path.exists());
        assert!(loader.load_global().unwrap().is_some());
    }
}
