//! metacache core - two-level composite cache for database catalog metadata
//!
//! This crate provides:
//! - A loader that groups ordered catalog rows into parent-keyed entries
//!   (foreign keys, their columns) in a single pass
//! - A cache store with whole-container and single-parent scopes, loaded at
//!   most once per scope and shared between concurrent callers
//! - A SQLite catalog row source and an in-memory object catalog
//! - Cache metrics and per-load reports

pub mod error;
pub mod foreign_key;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod query;
pub mod row;
pub mod sqlite;
pub mod store;

pub use error::CacheError;

// Model re-exports
pub use model::{Container, ObjectCatalog, ObjectResolver, ParentObject, Schema, Table, TableColumn};

// Row reader re-exports
pub use query::{select_query, BoundQuery, QueryTemplate};
pub use row::{MemoryRowSource, Row, RowCursor, RowSource, Value, VecRowCursor};

// Loader and store re-exports
pub use loader::{CompositeLoader, CompositeMapper, EntryKey, LoadOutcome, LoadReport, LoadedEntry};
pub use metrics::CacheMetrics;
pub use store::{CacheStats, CompositeCache, ScopeKey};

// Foreign-key re-exports
pub use foreign_key::{
    foreign_key_cache, ConstraintKind, ForeignKey, ForeignKeyCache, ForeignKeyMapper,
    ForeignKeyRow, KeyColumn, FOREIGN_KEY_COLUMNS,
};

// SQLite re-exports
pub use sqlite::{QueryTexts, SqliteRowSource, DEFAULT_BUSY_TIMEOUT};
