//! SQLite catalog integration tests.
//!
//! Runs the foreign-key cache against an on-disk catalog database, with the
//! object catalog loaded from the same file.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{sqlite_sales_catalog, summarize};
use metacache_core::{
    foreign_key_cache, CacheError, ForeignKeyRow, ObjectCatalog, QueryTexts, Schema,
    SqliteRowSource, DEFAULT_BUSY_TIMEOUT,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn owned(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
    pairs
        .iter()
        .map(|(name, cols)| {
            (
                name.to_string(),
                cols.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_schema_load_from_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let source = sqlite_sales_catalog(&temp_dir.path().join("catalog.db"));
    let catalog = Arc::new(source.load_objects("SALES").unwrap());
    let cache = foreign_key_cache(catalog, source);

    let keys = cache.get_entries(&Schema::new("SALES"), None).unwrap();

    assert_eq!(
        summarize(&keys),
        owned(&[
            ("FK_LINES_ORDER", &["ORDER_ID", "ORDER_REGION"]),
            ("FK_LINES_PRODUCT", &["PRODUCT_ID"]),
            ("FK_ORDERS_CUSTOMER", &["CUSTOMER_ID"]),
        ])
    );
    // Primary keys are seeded as PK_<table>
    assert_eq!(keys[0].referenced_key.as_deref(), Some("PK_ORDERS"));
    assert_eq!(
        keys[0].columns()[1].referenced_column.as_deref(),
        Some("REGION")
    );
    assert!(keys.iter().all(|fk| fk.enabled));
}

#[test]
fn test_key_order_follows_ordinal_position() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let source = sqlite_sales_catalog(&path);
    // Third column added with a position before the existing ones
    source
        .insert_foreign_key_row(
            &ForeignKeyRow::new("SALES", "LINES", "FK_LINES_ORDER", "ID", 0)
                .references("SALES", "ORDERS", "ID"),
        )
        .unwrap();
    let catalog = Arc::new(source.load_objects("SALES").unwrap());
    let lines = catalog.table("SALES", "LINES").unwrap();
    let cache = foreign_key_cache(catalog, source);

    let keys = cache
        .get_entries(&Schema::new("SALES"), Some(&*lines))
        .unwrap();

    assert_eq!(
        keys[0].column_names(),
        vec!["ID", "ORDER_ID", "ORDER_REGION"]
    );
}

#[test]
fn test_reopened_catalog_serves_same_keys() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    drop(sqlite_sales_catalog(&path));

    let source =
        SqliteRowSource::open(&path, QueryTexts::foreign_keys(), DEFAULT_BUSY_TIMEOUT).unwrap();
    let catalog = Arc::new(source.load_objects("SALES").unwrap());
    assert_eq!(catalog.table_count(), 4);

    let cache = foreign_key_cache(catalog, source);
    let keys = cache.get_entries(&Schema::new("SALES"), None).unwrap();
    assert_eq!(keys.len(), 3);
    assert_eq!(cache.metrics().rows_read, 4);
}

#[test]
fn test_dropped_table_in_catalog_is_tolerated() {
    let temp_dir = TempDir::new().unwrap();
    let source = sqlite_sales_catalog(&temp_dir.path().join("catalog.db"));
    let mut catalog = source.load_objects("SALES").unwrap();
    catalog.remove_table("SALES", "LINES");
    let cache = foreign_key_cache(Arc::new(catalog), source);

    let keys = cache.get_entries(&Schema::new("SALES"), None).unwrap();

    assert_eq!(summarize(&keys), owned(&[("FK_ORDERS_CUSTOMER", &["CUSTOMER_ID"])]));
    let report = cache.last_report().unwrap();
    assert_eq!(report.rows_skipped, 3);
    assert_eq!(report.unknown_parents.len(), 1);
}

#[test]
fn test_cancelled_load_leaves_scope_unloaded() {
    // Spins until a READY constraint exists, then returns no rows
    let queries = QueryTexts {
        all_in_container: "WITH RECURSIVE n(x) AS \
             (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < \
              (SELECT CASE WHEN EXISTS \
               (SELECT 1 FROM all_constraints WHERE constraint_name = 'READY') \
               THEN 0 ELSE 2000000000 END)) \
             SELECT ?1 AS CONSTRAINT_SCHEMA FROM n WHERE x < 0"
            .to_string(),
        single_parent: QueryTexts::foreign_keys().single_parent,
    };
    let source = SqliteRowSource::in_memory(queries).unwrap();
    let cache = foreign_key_cache(Arc::new(ObjectCatalog::new()), source);
    let schema = Schema::new("SALES");
    let done = AtomicBool::new(false);

    let result = std::thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                cache.source().interrupt();
                std::thread::sleep(Duration::from_millis(10));
            }
        });
        let result = cache.get_entries(&schema, None);
        done.store(true, Ordering::SeqCst);
        result
    });

    assert!(matches!(result, Err(CacheError::Cancelled)));
    assert!(!cache.is_loaded("SALES", None));
    assert_eq!(cache.metrics().failed_loads, 1);

    cache
        .source()
        .insert_constraint("SALES", "ORDERS", "READY", "PRIMARY KEY", true)
        .unwrap();
    assert!(cache.get_entries(&schema, None).unwrap().is_empty());
    assert!(cache.is_loaded("SALES", None));
    assert_eq!(cache.metrics().loads, 1);
}
