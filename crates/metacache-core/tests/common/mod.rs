//! Common test utilities for integration tests.
//!
//! Builds small sales catalogs, either scripted in memory or seeded into a
//! SQLite database, shared across integration test files.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use metacache_core::{
    ForeignKey, ForeignKeyRow, MemoryRowSource, ObjectCatalog, QueryTexts, SqliteRowSource, Table,
};

/// Foreign-key rows of the `SALES` schema, in catalog order.
///
/// `LINES` has a two-column key to `ORDERS` and a key to `PRODUCTS`;
/// `ORDERS` has a key to `CUSTOMERS`.
pub fn sales_rows() -> Vec<ForeignKeyRow> {
    vec![
        ForeignKeyRow::new("SALES", "LINES", "FK_LINES_ORDER", "ORDER_ID", 1)
            .references("SALES", "ORDERS", "ID")
            .referenced_key("PK_ORDERS"),
        ForeignKeyRow::new("SALES", "LINES", "FK_LINES_ORDER", "ORDER_REGION", 2)
            .references("SALES", "ORDERS", "REGION")
            .referenced_key("PK_ORDERS"),
        ForeignKeyRow::new("SALES", "LINES", "FK_LINES_PRODUCT", "PRODUCT_ID", 1)
            .references("SALES", "PRODUCTS", "ID")
            .referenced_key("PK_PRODUCTS"),
        ForeignKeyRow::new("SALES", "ORDERS", "FK_ORDERS_CUSTOMER", "CUSTOMER_ID", 1)
            .references("SALES", "CUSTOMERS", "ID")
            .referenced_key("PK_CUSTOMERS"),
    ]
}

/// Tables of the `SALES` schema
pub fn sales_tables() -> Vec<Table> {
    vec![
        Table::with_columns("SALES", "CUSTOMERS", &["ID", "NAME"]),
        Table::with_columns("SALES", "ORDERS", &["ID", "REGION", "CUSTOMER_ID"]),
        Table::with_columns("SALES", "PRODUCTS", &["ID", "LABEL"]),
        Table::with_columns(
            "SALES",
            "LINES",
            &["ID", "ORDER_ID", "ORDER_REGION", "PRODUCT_ID"],
        ),
    ]
}

pub fn sales_catalog() -> Arc<ObjectCatalog> {
    let mut catalog = ObjectCatalog::new();
    for table in sales_tables() {
        catalog.add_table(table);
    }
    Arc::new(catalog)
}

/// Scripted source holding the given rows
pub fn memory_source(rows: &[ForeignKeyRow]) -> MemoryRowSource {
    let source = metacache_core::foreign_key::memory_source();
    for row in rows {
        source.push_row(row.values()).expect("row matches columns");
    }
    source
}

/// Create a SQLite catalog at `path` holding the sales schema
pub fn sqlite_sales_catalog(path: &Path) -> SqliteRowSource {
    let source =
        SqliteRowSource::create(path, QueryTexts::foreign_keys()).expect("create catalog");
    for table in sales_tables() {
        source.insert_table(&table).expect("insert table");
        source
            .insert_constraint(
                &table.schema,
                &table.name,
                &format!("PK_{}", table.name),
                "PRIMARY KEY",
                true,
            )
            .expect("insert primary key");
    }
    for row in sales_rows() {
        source.insert_foreign_key_row(&row).expect("insert foreign key");
    }
    source
}

/// `(name, columns)` pairs, for compact assertions
pub fn summarize(keys: &[Arc<ForeignKey>]) -> Vec<(String, Vec<String>)> {
    keys.iter()
        .map(|fk| {
            (
                fk.name.clone(),
                fk.column_names().into_iter().map(String::from).collect(),
            )
        })
        .collect()
}
