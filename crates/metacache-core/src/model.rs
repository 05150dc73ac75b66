//! Object Model Capabilities
//!
//! The cache never depends on concrete schema/table classes. It consumes
//! three narrow capabilities:
//!
//! - [`Container`]: anything with a stable name that scopes parent objects
//! - [`ParentObject`]: anything offering `resolve_column(name)`
//! - [`ObjectResolver`]: maps `(container, parent name)` to a known parent
//!
//! [`ObjectCatalog`] is the in-memory implementation used by the SQLite
//! catalog and by tests.

use std::collections::HashMap;
use std::sync::Arc;

/// A scoping entity (e.g. a schema)
pub trait Container {
    /// Stable container name used as the cache key
    fn name(&self) -> &str;
}

/// A parent object (e.g. a table) that owns constraint entries
pub trait ParentObject: Send + Sync {
    /// Column type returned by [`ParentObject::resolve_column`]
    type Column;

    /// Object name, unique within its container
    fn name(&self) -> &str;

    /// Name used in log messages
    fn qualified_name(&self) -> String {
        self.name().to_string()
    }

    /// Look up one of this object's columns by name
    fn resolve_column(&self, name: &str) -> Option<&Self::Column>;
}

/// Resolves parent names read from catalog rows to known parent objects.
///
/// Resolution never fails: `None` signals a parent that is unknown to the
/// current object set (schema drift between metadata queries).
pub trait ObjectResolver: Send + Sync {
    type Parent: ParentObject;

    fn resolve_parent(&self, container: &dyn Container, name: &str) -> Option<Arc<Self::Parent>>;
}

/// A named schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    pub name: String,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Container for Schema {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// 1-based position of the column in the table
    pub ordinal_position: u32,
    pub data_type: Option<String>,
    pub nullable: bool,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            ordinal_position,
            data_type: None,
            nullable: true,
        }
    }

    /// Set the declared data type
    pub fn with_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Mark the column NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A table and its columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    columns: Vec<TableColumn>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Build a table from column names, numbering them from 1
    pub fn with_columns(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        let mut table = Self::new(schema, name);
        for (idx, column) in columns.iter().enumerate() {
            table.add_column(TableColumn::new(*column, idx as u32 + 1));
        }
        table
    }

    pub fn add_column(&mut self, column: TableColumn) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }
}

impl ParentObject for Table {
    type Column = TableColumn;

    fn name(&self) -> &str {
        &self.name
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    fn resolve_column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// In-memory set of known tables, grouped by schema
#[derive(Debug, Default)]
pub struct ObjectCatalog {
    schemas: HashMap<String, HashMap<String, Arc<Table>>>,
}

impl ObjectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous definition with the same name
    pub fn add_table(&mut self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        self.schemas
            .entry(table.schema.clone())
            .or_default()
            .insert(table.name.clone(), Arc::clone(&table));
        table
    }

    /// Forget a table (simulates a drop between metadata queries)
    pub fn remove_table(&mut self, schema: &str, name: &str) -> Option<Arc<Table>> {
        self.schemas.get_mut(schema)?.remove(name)
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<Arc<Table>> {
        self.schemas.get(schema)?.get(name).cloned()
    }

    /// Table names of a schema, sorted
    pub fn table_names(&self, schema: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .get(schema)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn table_count(&self) -> usize {
        self.schemas.values().map(|t| t.len()).sum()
    }
}

impl ObjectResolver for ObjectCatalog {
    type Parent = Table;

    fn resolve_parent(&self, container: &dyn Container, name: &str) -> Option<Arc<Table>> {
        self.table(container.name(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_column() {
        let table = Table::with_columns("S", "T1", &["C1", "C2"]);
        assert_eq!(table.resolve_column("C2").unwrap().ordinal_position, 2);
        assert!(table.resolve_column("c2").is_none());
        assert_eq!(table.qualified_name(), "S.T1");
    }

    #[test]
    fn test_catalog_resolution_is_scoped_by_container() {
        let mut catalog = ObjectCatalog::new();
        catalog.add_table(Table::with_columns("S1", "T1", &["C1"]));

        assert!(catalog.resolve_parent(&Schema::new("S1"), "T1").is_some());
        assert!(catalog.resolve_parent(&Schema::new("S2"), "T1").is_none());
        assert!(catalog.resolve_parent(&Schema::new("S1"), "MISSING").is_none());
    }

    #[test]
    fn test_remove_table() {
        let mut catalog = ObjectCatalog::new();
        catalog.add_table(Table::new("S", "A"));
        catalog.add_table(Table::new("S", "B"));
        assert_eq!(catalog.table_names("S"), vec!["A", "B"]);

        assert!(catalog.remove_table("S", "A").is_some());
        assert_eq!(catalog.table_count(), 1);
        assert!(catalog.remove_table("S", "A").is_none());
    }
}
