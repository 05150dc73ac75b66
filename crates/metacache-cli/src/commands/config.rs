//! Config command - view and initialize configuration
//!
//! - Show the effective configuration after merging every layer
//! - Show configuration file paths
//! - Write a default configuration file
//!
//! Only `show` reads the configuration, so `path` and `init` still work
//! while a config file is broken.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use metacache_config::{CacheConfig, ConfigLoader};
use serde::Serialize;

use super::{load_config, print_info};
use crate::{GlobalOptions, Logging};

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Show configuration file paths
    Path(PathArgs),

    /// Write a default configuration file
    Init(InitArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Write ~/.metacache/config.toml instead of the local file
    #[arg(long)]
    global: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    global_exists: bool,
    local_exists: bool,
}

pub fn execute(cmd: ConfigCommand, global: &GlobalOptions, logging: &Logging) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, &load_config(global, logging)?),
        ConfigCommand::Path(args) => execute_path(args),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_show(args: ShowArgs, config: &CacheConfig) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

fn execute_path(args: PathArgs) -> Result<()> {
    let loader = ConfigLoader::new();
    let root = std::env::current_dir().context("Failed to get current directory")?;
    let global = loader.global_config_path();
    let local = loader.local_config_path(&root);

    let paths = ConfigPaths {
        global_exists: global.as_ref().is_some_and(|p| p.exists()),
        local_exists: local.exists(),
        global,
        local,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let status = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!("Local:  {} ({})", paths.local.display(), status(paths.local_exists));
    Ok(())
}

fn execute_init(args: InitArgs, global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader
            .init_global()
            .context("Failed to write global config")?
    } else {
        let root = std::env::current_dir().context("Failed to get current directory")?;
        loader
            .init_local(&root)
            .context("Failed to write local config")?
    };

    print_info(&format!("Config: {}", path.display()), global.quiet);
    Ok(())
}
