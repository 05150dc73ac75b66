//! Stats command - load a schema and report what the cache did

use anyhow::{Context, Result};
use clap::Args;
use metacache_core::{CacheStats, LoadReport, Schema};
use serde::Serialize;

use super::{load_config, open_cache, resolve_schema};
use crate::{GlobalOptions, Logging};

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Schema to load (defaults to catalog.default_schema)
    #[arg(long, short = 's')]
    schema: Option<String>,

    /// Also read every table scope after the schema load
    #[arg(long)]
    tables: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    schema: String,
    tables: usize,
    load: Option<LoadReport>,
    cache: CacheStats,
}

pub fn execute(args: StatsArgs, global: &GlobalOptions, logging: &Logging) -> Result<()> {
    let config = load_config(global, logging)?;
    let schema_name = resolve_schema(args.schema, &config)?;
    let cache = open_cache(&config, &schema_name)?;
    let schema = Schema::new(schema_name.as_str());

    cache
        .get_entries(&schema, None)
        .with_context(|| format!("Failed to load foreign keys of {}", schema_name))?;
    let load = cache.last_report();

    let table_names = cache.resolver().table_names(&schema_name);
    if args.tables {
        for name in &table_names {
            if let Some(table) = cache.resolver().table(&schema_name, name) {
                cache.get_entries(&schema, Some(&*table))?;
            }
        }
    }

    let output = StatsOutput {
        schema: schema_name,
        tables: table_names.len(),
        load,
        cache: cache.stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_stats(&output);
    }
    Ok(())
}

fn print_stats(output: &StatsOutput) {
    println!("Schema: {} ({} tables)", output.schema, output.tables);

    if let Some(ref load) = output.load {
        println!("\nLoad");
        println!("  Rows read:        {}", load.rows_read);
        println!("  Foreign keys:     {}", load.entries);
        println!("  Rows skipped:     {}", load.rows_skipped);
        println!("  Columns dropped:  {}", load.columns_dropped);
        if !load.unknown_parents.is_empty() {
            let names: Vec<&str> = load.unknown_parents.iter().map(String::as_str).collect();
            println!("  Unknown tables:   {}", names.join(", "));
        }
    }

    let metrics = &output.cache.metrics;
    println!("\nCache");
    println!("  Entries:          {}", output.cache.entries);
    println!("  Hits / misses:    {} / {}", metrics.hits, metrics.misses);
    println!("  Hit rate:         {:.1}%", metrics.hit_rate() * 100.0);
    println!("  Failed loads:     {}", metrics.failed_loads);
}
