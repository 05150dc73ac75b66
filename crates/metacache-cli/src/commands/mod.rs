//! CLI command implementations

pub mod config;
pub mod foreign_keys;
pub mod stats;

use std::sync::Arc;

use anyhow::{Context, Result};
use metacache_config::{CacheConfig, ConfigLoader};
use metacache_core::{foreign_key_cache, ForeignKeyCache, ObjectCatalog, QueryTexts, SqliteRowSource};
use tracing::debug;

use crate::{GlobalOptions, Logging};

/// Cache over a SQLite catalog, as used by every data command
pub type CatalogCache = ForeignKeyCache<ObjectCatalog, SqliteRowSource>;

/// Load configuration with optional config file override, then apply its
/// log level.
pub fn load_config(global: &GlobalOptions, logging: &Logging) -> Result<CacheConfig> {
    let loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    let config = match global.config {
        Some(ref config_path) => loader
            .load_file(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?,
        None => {
            let root = std::env::current_dir().context("Failed to get current directory")?;
            loader
                .load(&root, Some(&overrides))
                .context("Failed to load configuration")?
        }
    };

    logging.apply_config(&config);
    Ok(config)
}

/// Pick the schema from the command line or `catalog.default_schema`.
pub fn resolve_schema(arg: Option<String>, config: &CacheConfig) -> Result<String> {
    arg.or_else(|| config.catalog.default_schema.clone())
        .ok_or_else(|| anyhow::anyhow!("No schema given; pass --schema or set catalog.default_schema"))
}

/// Open the catalog and build a cache whose object catalog covers `schema`.
pub fn open_cache(config: &CacheConfig, schema: &str) -> Result<CatalogCache> {
    let Some(ref path) = config.catalog.path else {
        anyhow::bail!("No catalog database; pass --db or set catalog.path");
    };
    if !path.exists() {
        anyhow::bail!("Catalog database not found: {}", path.display());
    }

    let source = SqliteRowSource::open(
        path,
        QueryTexts::foreign_keys(),
        config.catalog.busy_timeout(),
    )
    .with_context(|| format!("Failed to open catalog {}", path.display()))?;
    let objects = source
        .load_objects(schema)
        .with_context(|| format!("Failed to read tables of schema {}", schema))?;
    debug!("Schema {} has {} tables", schema, objects.table_count());

    Ok(foreign_key_cache(Arc::new(objects), source)
        .with_anomaly_dedupe(config.cache.dedupe_anomalies))
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
