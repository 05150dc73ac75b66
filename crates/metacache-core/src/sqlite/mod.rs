//! SQLite Catalog Row Source
//!
//! Runs the cache's query templates against a SQLite catalog database and
//! hands the results back as [`Row`]s. Also loads the [`ObjectCatalog`] the
//! cache resolves parents against, and seeds catalogs for fixtures.
//!
//! Results are fetched completely while the connection lock is held, then
//! replayed through a [`VecRowCursor`]. One connection serves every load, so
//! loads of different containers queue at the source even though the cache
//! lets them proceed in parallel. A long query can be stopped from
//! another thread with [`SqliteRowSource::interrupt`]; the load then fails
//! with [`CacheError::Cancelled`].

pub mod schema;

use crate::error::CacheError;
use crate::foreign_key::ForeignKeyRow;
use crate::model::{ObjectCatalog, Table, TableColumn};
use crate::query::{BoundQuery, QueryTemplate};
use crate::row::{Row, RowCursor, RowSource, Value, VecRowCursor};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, InterruptHandle, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use schema::{
    SCHEMA_CREATE_COLUMNS, SCHEMA_CREATE_CONSTRAINTS, SCHEMA_CREATE_CONSTRAINT_COLUMNS,
    SCHEMA_CREATE_INDEXES, SQL_FOREIGN_KEYS_ALL, SQL_FOREIGN_KEYS_TABLE, SQL_SCHEMA_COLUMNS,
};

/// Default time to wait on a locked catalog database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// SQL text for each query template.
///
/// Each text selects the mapper's parent and object columns and binds the
/// container as `?1` and, for the single-parent text, the parent as `?2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTexts {
    pub all_in_container: String,
    pub single_parent: String,
}

impl QueryTexts {
    /// Foreign-key queries over `all_constraints` and `all_constraint_columns`
    pub fn foreign_keys() -> Self {
        Self {
            all_in_container: SQL_FOREIGN_KEYS_ALL.to_string(),
            single_parent: SQL_FOREIGN_KEYS_TABLE.to_string(),
        }
    }

    pub fn sql(&self, template: QueryTemplate) -> &str {
        match template {
            QueryTemplate::AllInContainer => &self.all_in_container,
            QueryTemplate::SingleParent => &self.single_parent,
        }
    }
}

/// Row source backed by a SQLite catalog database
pub struct SqliteRowSource {
    conn: Mutex<Connection>,
    interrupt: InterruptHandle,
    queries: QueryTexts,
}

impl SqliteRowSource {
    /// Open an existing catalog database
    pub fn open(path: &Path, queries: QueryTexts, busy_timeout: Duration) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        Self::configure_connection(&conn, busy_timeout)?;
        debug!("Opened catalog {}", path.display());
        Ok(Self::from_connection(conn, queries))
    }

    /// Create a catalog database with an empty schema
    pub fn create(path: &Path, queries: QueryTexts) -> Result<Self, CacheError> {
        let source = Self::open(path, queries, DEFAULT_BUSY_TIMEOUT)?;
        source.create_schema()?;
        Ok(source)
    }

    /// Create an in-memory catalog database (for testing)
    pub fn in_memory(queries: QueryTexts) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn, DEFAULT_BUSY_TIMEOUT)?;
        let source = Self::from_connection(conn, queries);
        source.create_schema()?;
        Ok(source)
    }

    fn from_connection(conn: Connection, queries: QueryTexts) -> Self {
        let interrupt = conn.get_interrupt_handle();
        Self {
            conn: Mutex::new(conn),
            interrupt,
            queries,
        }
    }

    fn configure_connection(conn: &Connection, busy_timeout: Duration) -> SqliteResult<()> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "cache_size", -16000)?; // 16MB cache
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Ok(())
    }

    /// Create the catalog tables if missing
    pub fn create_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.execute(SCHEMA_CREATE_COLUMNS, [])?;
        conn.execute(SCHEMA_CREATE_CONSTRAINTS, [])?;
        conn.execute(SCHEMA_CREATE_CONSTRAINT_COLUMNS, [])?;
        conn.execute_batch(SCHEMA_CREATE_INDEXES)?;
        Ok(())
    }

    /// Abort the query currently running on this source, if any
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    // =========================================================================
    // Object Catalog
    // =========================================================================

    /// Load every table of a schema, with its columns
    pub fn load_objects(&self, schema: &str) -> Result<ObjectCatalog, CacheError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(SQL_SCHEMA_COLUMNS)?;
        let mut rows = stmt.query(params![schema])?;

        let mut catalog = ObjectCatalog::new();
        let mut current: Option<Table> = None;
        while let Some(row) = rows.next()? {
            let table_name: String = row.get(0)?;
            let position: i64 = row.get(2)?;
            let ordinal_position = u32::try_from(position).map_err(|_| {
                CacheError::RowMapping(format!(
                    "column position out of range in '{}.{}': {}",
                    schema, table_name, position
                ))
            })?;

            let mut column = TableColumn::new(row.get::<_, String>(1)?, ordinal_position);
            if let Some(data_type) = row.get::<_, Option<String>>(3)? {
                column = column.with_type(data_type);
            }
            if !row.get::<_, bool>(4)? {
                column = column.not_null();
            }

            if current.as_ref().map_or(true, |t| t.name != table_name) {
                if let Some(table) = current.take() {
                    catalog.add_table(table);
                }
                current = Some(Table::new(schema, table_name));
            }
            if let Some(table) = current.as_mut() {
                table.add_column(column);
            }
        }
        if let Some(table) = current {
            catalog.add_table(table);
        }

        debug!("Loaded {} tables from schema {}", catalog.table_count(), schema);
        Ok(catalog)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a table and its columns into `all_columns`
    pub fn insert_table(&self, table: &Table) -> Result<(), CacheError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO all_columns
                 (column_schema, column_table, column_name, column_ordinal_position,
                  column_type, column_is_nullable)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for column in table.columns() {
                stmt.execute(params![
                    table.schema,
                    table.name,
                    column.name,
                    column.ordinal_position,
                    column.data_type,
                    column.nullable,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a constraint row (without columns)
    pub fn insert_constraint(
        &self,
        schema: &str,
        table: &str,
        name: &str,
        kind: &str,
        enabled: bool,
    ) -> Result<(), CacheError> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO all_constraints
             (constraint_schema, constraint_table, constraint_name, constraint_type, constraint_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![schema, table, name, kind, enabled],
        )?;
        Ok(())
    }

    /// Insert one foreign-key column, creating its constraint on first use
    pub fn insert_foreign_key_row(&self, fk: &ForeignKeyRow) -> Result<(), CacheError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO all_constraints
             (constraint_schema, constraint_table, constraint_name, constraint_owner,
              constraint_type, constraint_enabled)
             VALUES (?1, ?2, ?3, ?4, 'FOREIGN KEY', ?5)",
            params![fk.schema, fk.table, fk.name, fk.owner, fk.enabled],
        )?;
        tx.execute(
            "INSERT INTO all_constraint_columns
             (constraint_schema, constraint_table, constraint_name, column_name,
              ordinal_position, referenced_schema, referenced_table, referenced_column)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                fk.schema,
                fk.table,
                fk.name,
                fk.column,
                fk.ordinal_position,
                fk.referenced_schema,
                fk.referenced_table,
                fk.referenced_column,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn to_value(value: ValueRef<'_>) -> Result<Value, CacheError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(r) => Ok(Value::Real(r)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(CacheError::RowMapping(
            "binary values are not supported in catalog rows".to_string(),
        )),
    }
}

impl RowSource for SqliteRowSource {
    fn execute(&self, query: &BoundQuery) -> Result<Box<dyn RowCursor + '_>, CacheError> {
        let template = query.template.as_str();
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(self.queries.sql(query.template))
            .map_err(|e| CacheError::from_query(template, e))?;

        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params_from_iter(query.params.iter()))
            .map_err(|e| CacheError::from_query(template, e))?;

        let mut fetched = Vec::new();
        while let Some(row) = rows.next().map_err(|e| CacheError::from_query(template, e))? {
            let values = (0..columns.len())
                .map(|idx| {
                    row.get_ref(idx)
                        .map_err(|e| CacheError::from_query(template, e))
                        .and_then(to_value)
                })
                .collect::<Result<Vec<_>, _>>()?;
            fetched.push(Row::new(Arc::clone(&columns), values)?);
        }

        debug!("Query {} returned {} rows", template, fetched.len());
        Ok(Box::new(VecRowCursor::new(fetched)))
    }
}
