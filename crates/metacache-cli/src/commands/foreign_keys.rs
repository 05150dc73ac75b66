//! Foreign-keys command - list cached foreign keys of a schema or table

use anyhow::{Context, Result};
use clap::Args;
use metacache_core::{ForeignKey, Schema};

use super::{load_config, open_cache, print_info, resolve_schema};
use crate::{GlobalOptions, Logging};

/// Arguments for the foreign-keys command
#[derive(Args, Debug)]
pub struct ForeignKeysArgs {
    /// Schema to read (defaults to catalog.default_schema)
    #[arg(long, short = 's')]
    schema: Option<String>,

    /// Only keys declared on this table
    #[arg(long, short = 't')]
    table: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: ForeignKeysArgs, global: &GlobalOptions, logging: &Logging) -> Result<()> {
    let config = load_config(global, logging)?;
    let schema_name = resolve_schema(args.schema, &config)?;
    let cache = open_cache(&config, &schema_name)?;
    let schema = Schema::new(schema_name.as_str());

    let keys = match args.table {
        Some(ref table_name) => {
            let table = cache
                .resolver()
                .table(&schema_name, table_name)
                .ok_or_else(|| {
                    anyhow::anyhow!("Table '{}.{}' not found in catalog", schema_name, table_name)
                })?;
            cache.get_entries(&schema, Some(&*table))
        }
        None => cache.get_entries(&schema, None),
    }
    .with_context(|| format!("Failed to load foreign keys of {}", schema_name))?;

    if args.json {
        let keys: Vec<&ForeignKey> = keys.iter().map(|fk| fk.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    for fk in &keys {
        print_key(fk);
    }

    let mut summary = format!("{} foreign keys", keys.len());
    if let Some(report) = cache.last_report() {
        if report.has_anomalies() {
            summary.push_str(&format!(
                " ({} rows with unknown tables, {} unknown columns)",
                report.rows_skipped, report.columns_dropped
            ));
        }
    }
    print_info(&summary, global.quiet);

    Ok(())
}

fn print_key(fk: &ForeignKey) {
    let target = match (&fk.referenced_schema, &fk.referenced_table) {
        (Some(schema), Some(table)) => format!("{}.{}", schema, table),
        (None, Some(table)) => table.clone(),
        _ => "?".to_string(),
    };
    let mut header = format!("{} -> {}", fk.qualified_name(), target);
    if let Some(ref pk) = fk.referenced_key {
        header.push_str(&format!(" ({})", pk));
    }
    if !fk.enabled {
        header.push_str(" [disabled]");
    }
    println!("{}", header);

    for column in fk.columns() {
        match column.referenced_column {
            Some(ref referenced) => println!(
                "  {:>3}  {} -> {}",
                column.ordinal_position, column.column, referenced
            ),
            None => println!("  {:>3}  {}", column.ordinal_position, column.column),
        }
    }
}
