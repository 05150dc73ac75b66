//! metacache CLI - browse catalog metadata through the composite cache
//!
//! # Usage
//!
//! ```bash
//! # Foreign keys of a schema
//! metacache --db catalog.db foreign-keys --schema SALES
//!
//! # Foreign keys of one table, as JSON
//! metacache --db catalog.db foreign-keys --schema SALES --table LINES --json
//!
//! # Load statistics for a schema
//! metacache --db catalog.db stats --schema SALES
//!
//! # Effective configuration
//! metacache config show
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use metacache_config::CacheConfig;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, Registry};

mod commands;

/// metacache - cached foreign-key metadata from a catalog database
#[derive(Parser, Debug)]
#[command(name = "metacache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Catalog database (overrides catalog.path)
    #[arg(long, global = true, env = "METACACHE_DB")]
    db: Option<PathBuf>,

    /// Read this configuration file instead of the global and local ones
    #[arg(long, short = 'c', global = true, env = "METACACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log every row with an unknown table instead of once per table
    #[arg(long, global = true)]
    log_every_anomaly: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    fn to_config_overrides(&self) -> metacache_config::ConfigOverrides {
        metacache_config::ConfigOverrides {
            catalog_path: self.db.clone(),
            dedupe_anomalies: self.log_every_anomaly.then_some(false),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List foreign keys of a schema or table
    ForeignKeys(commands::foreign_keys::ForeignKeysArgs),

    /// Load a schema and report cache statistics
    Stats(commands::stats::StatsArgs),

    /// View and initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging = init_logging(&cli.global)?;

    match cli.command {
        Commands::ForeignKeys(args) => commands::foreign_keys::execute(args, &cli.global, &logging),
        Commands::Stats(args) => commands::stats::execute(args, &cli.global, &logging),
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.global, &logging),
    }
}

/// Log level control, raised or lowered once a command has read its config
struct Logging {
    handle: reload::Handle<LevelFilter, Registry>,
    /// Set by `--verbose` or `--quiet`; `logging.level` does not override it
    pinned: bool,
}

impl Logging {
    fn apply_config(&self, config: &CacheConfig) {
        if self.pinned {
            return;
        }
        let Ok(level) = LevelFilter::from_str(&config.logging.level) else {
            return;
        };
        if let Err(e) = self.handle.reload(level) {
            warn!("Cannot apply logging.level '{}': {}", config.logging.level, e);
        }
    }
}

fn init_logging(global: &GlobalOptions) -> Result<Logging> {
    let (level, pinned) = if global.quiet {
        (LevelFilter::ERROR, true)
    } else if global.verbose {
        (LevelFilter::DEBUG, true)
    } else {
        (LevelFilter::INFO, false)
    };

    let (filter, handle) = reload::Layer::new(level);
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true),
    );
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Logging { handle, pinned })
}
