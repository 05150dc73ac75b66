//! Foreign-key specialization of the composite cache.
//!
//! Catalog rows carry one key column each; the rows of one constraint are
//! grouped by `(CONSTRAINT_TABLE, CONSTRAINT_NAME)` into a [`ForeignKey`]
//! whose [`KeyColumn`]s keep row order.

use crate::error::CacheError;
use crate::loader::CompositeMapper;
use crate::model::{ObjectResolver, ParentObject, Table};
use crate::row::{MemoryRowSource, Row, RowSource, Value};
use crate::store::CompositeCache;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result columns of the foreign-key queries
pub mod columns {
    pub const CONSTRAINT_NAME: &str = "CONSTRAINT_NAME";
    pub const CONSTRAINT_TABLE: &str = "CONSTRAINT_TABLE";
    pub const CONSTRAINT_SCHEMA: &str = "CONSTRAINT_SCHEMA";
    pub const CONSTRAINT_OWNER: &str = "CONSTRAINT_OWNER";
    pub const CONSTRAINT_ENABLED: &str = "CONSTRAINT_ENABLED";
    pub const CONSTRAINT_TYPE: &str = "CONSTRAINT_TYPE";
    pub const COLUMN_NAME: &str = "COLUMN_NAME";
    pub const ORDINAL_POSITION: &str = "ORDINAL_POSITION";
    pub const REFERENCED_SCHEMA: &str = "REFERENCED_SCHEMA";
    pub const REFERENCED_TABLE: &str = "REFERENCED_TABLE";
    pub const REFERENCED_COLUMN: &str = "REFERENCED_COLUMN";
    pub const REF_PK_NAME: &str = "REF_PK_NAME";
}

/// All result columns, in select order
pub const FOREIGN_KEY_COLUMNS: [&str; 12] = [
    columns::CONSTRAINT_NAME,
    columns::CONSTRAINT_TABLE,
    columns::CONSTRAINT_SCHEMA,
    columns::CONSTRAINT_OWNER,
    columns::CONSTRAINT_ENABLED,
    columns::CONSTRAINT_TYPE,
    columns::COLUMN_NAME,
    columns::ORDINAL_POSITION,
    columns::REFERENCED_SCHEMA,
    columns::REFERENCED_TABLE,
    columns::REFERENCED_COLUMN,
    columns::REF_PK_NAME,
];

/// Constraint type as stored in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    NotNull,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::NotNull => "NOT NULL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
            "FOREIGN KEY" => Some(ConstraintKind::ForeignKey),
            "UNIQUE" => Some(ConstraintKind::Unique),
            "NOT NULL" => Some(ConstraintKind::NotNull),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyColumn {
    /// 1-based position within the key; 0 when the catalog has none
    pub ordinal_position: u32,
    pub column: String,
    pub referenced_column: Option<String>,
}

/// A foreign-key constraint and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub owner: Option<String>,
    pub enabled: bool,
    pub kind: ConstraintKind,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<String>,
    /// Primary key of the referenced table
    pub referenced_key: Option<String>,
    columns: Vec<KeyColumn>,
}

impl ForeignKey {
    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    pub fn set_columns(&mut self, columns: Vec<KeyColumn>) {
        self.columns = columns;
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.schema, self.table, self.name)
    }
}

fn parse_enabled(value: Option<&str>) -> Result<bool, CacheError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_uppercase().as_str() {
        "TRUE" | "1" | "Y" | "YES" | "ENABLED" => Ok(true),
        "FALSE" | "0" | "N" | "NO" | "DISABLED" => Ok(false),
        other => Err(CacheError::RowMapping(format!(
            "column '{}' is not a boolean: '{}'",
            columns::CONSTRAINT_ENABLED,
            other
        ))),
    }
}

/// Maps foreign-key catalog rows onto [`ForeignKey`] entries of a [`Table`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignKeyMapper;

impl CompositeMapper for ForeignKeyMapper {
    type Parent = Table;
    type Object = ForeignKey;
    type Child = KeyColumn;

    fn parent_column(&self) -> &str {
        columns::CONSTRAINT_TABLE
    }

    fn object_column(&self) -> &str {
        columns::CONSTRAINT_NAME
    }

    fn fetch_object(&self, parent: &Table, name: &str, row: &Row) -> Result<ForeignKey, CacheError> {
        let kind_name = row.require_string(columns::CONSTRAINT_TYPE)?;
        let kind = ConstraintKind::parse(&kind_name).ok_or_else(|| {
            CacheError::RowMapping(format!(
                "constraint '{}' has unknown type '{}'",
                name, kind_name
            ))
        })?;

        Ok(ForeignKey {
            schema: parent.schema.clone(),
            table: parent.name.clone(),
            name: name.to_string(),
            owner: row.get_string(columns::CONSTRAINT_OWNER)?,
            enabled: parse_enabled(row.get_string(columns::CONSTRAINT_ENABLED)?.as_deref())?,
            kind,
            referenced_schema: row.get_string(columns::REFERENCED_SCHEMA)?,
            referenced_table: row.get_string(columns::REFERENCED_TABLE)?,
            referenced_key: row.get_string(columns::REF_PK_NAME)?,
            columns: Vec::new(),
        })
    }

    fn fetch_object_row(
        &self,
        parent: &Table,
        _object: &ForeignKey,
        row: &Row,
    ) -> Result<Option<KeyColumn>, CacheError> {
        let column_name = row.get_string(columns::COLUMN_NAME)?.unwrap_or_default();
        let Some(column) = parent.resolve_column(&column_name) else {
            debug!(
                "Column '{}' not found in table '{}'",
                column_name,
                parent.qualified_name()
            );
            return Ok(None);
        };

        let position = row.get_int(columns::ORDINAL_POSITION)?.unwrap_or(0);
        let ordinal_position = u32::try_from(position).map_err(|_| {
            CacheError::RowMapping(format!(
                "column '{}' out of range: {}",
                columns::ORDINAL_POSITION,
                position
            ))
        })?;

        Ok(Some(KeyColumn {
            ordinal_position,
            column: column.name.clone(),
            referenced_column: row.get_string(columns::REFERENCED_COLUMN)?,
        }))
    }

    fn cache_children(&self, object: &mut ForeignKey, children: Vec<KeyColumn>) {
        object.set_columns(children);
    }
}

/// Cache of foreign keys per schema and table
pub type ForeignKeyCache<R, S> = CompositeCache<ForeignKeyMapper, R, S>;

/// Create a foreign-key cache over a resolver and row source
pub fn foreign_key_cache<R, S>(resolver: Arc<R>, source: S) -> ForeignKeyCache<R, S>
where
    R: ObjectResolver<Parent = Table>,
    S: RowSource,
{
    CompositeCache::new(ForeignKeyMapper, resolver, source)
}

// ============================================================================
// Fixtures
// ============================================================================

/// One foreign-key catalog row, for seeding fixtures and scripted sources
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRow {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub owner: Option<String>,
    pub enabled: bool,
    pub column: String,
    pub ordinal_position: Option<i64>,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<String>,
    pub referenced_column: Option<String>,
    pub referenced_key: Option<String>,
}

impl ForeignKeyRow {
    pub fn new(schema: &str, table: &str, name: &str, column: &str, ordinal_position: i64) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            owner: None,
            enabled: true,
            column: column.to_string(),
            ordinal_position: Some(ordinal_position),
            referenced_schema: None,
            referenced_table: None,
            referenced_column: None,
            referenced_key: None,
        }
    }

    pub fn references(mut self, schema: &str, table: &str, column: &str) -> Self {
        self.referenced_schema = Some(schema.to_string());
        self.referenced_table = Some(table.to_string());
        self.referenced_column = Some(column.to_string());
        self
    }

    pub fn referenced_key(mut self, name: &str) -> Self {
        self.referenced_key = Some(name.to_string());
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn without_position(mut self) -> Self {
        self.ordinal_position = None;
        self
    }

    /// Values in [`FOREIGN_KEY_COLUMNS`] order
    pub fn values(&self) -> Vec<Value> {
        vec![
            self.name.as_str().into(),
            self.table.as_str().into(),
            self.schema.as_str().into(),
            self.owner.clone().into(),
            Value::from(if self.enabled { "TRUE" } else { "FALSE" }),
            ConstraintKind::ForeignKey.as_str().into(),
            self.column.as_str().into(),
            self.ordinal_position.into(),
            self.referenced_schema.clone().into(),
            self.referenced_table.clone().into(),
            self.referenced_column.clone().into(),
            self.referenced_key.clone().into(),
        ]
    }
}

/// Scripted source producing foreign-key result rows
pub fn memory_source() -> MemoryRowSource {
    MemoryRowSource::new(
        &FOREIGN_KEY_COLUMNS,
        columns::CONSTRAINT_SCHEMA,
        columns::CONSTRAINT_TABLE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectCatalog, Schema};
    use pretty_assertions::assert_eq;

    fn catalog() -> Arc<ObjectCatalog> {
        let mut catalog = ObjectCatalog::new();
        catalog.add_table(Table::with_columns("S", "T1", &["C1", "C2", "C3"]));
        catalog.add_table(Table::with_columns("S", "PARENT", &["ID", "CODE"]));
        Arc::new(catalog)
    }

    fn push(source: &MemoryRowSource, row: ForeignKeyRow) {
        source.push_row(row.values()).unwrap();
    }

    #[test]
    fn test_constraint_kind_parse() {
        assert_eq!(ConstraintKind::parse("foreign key"), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::parse("PRIMARY KEY"), Some(ConstraintKind::PrimaryKey));
        assert_eq!(ConstraintKind::parse("CHECK"), None);
    }

    #[test]
    fn test_parse_enabled() {
        assert!(parse_enabled(Some("TRUE")).unwrap());
        assert!(parse_enabled(Some("1")).unwrap());
        assert!(!parse_enabled(Some("false")).unwrap());
        assert!(!parse_enabled(None).unwrap());
        assert!(parse_enabled(Some("maybe")).is_err());
    }

    #[test]
    fn test_two_keys_on_one_table() {
        let source = memory_source();
        push(
            &source,
            ForeignKeyRow::new("S", "T1", "FK_A", "C1", 1)
                .references("S", "PARENT", "ID")
                .referenced_key("PK_PARENT")
                .owner("SYS"),
        );
        push(
            &source,
            ForeignKeyRow::new("S", "T1", "FK_A", "C2", 2).references("S", "PARENT", "CODE"),
        );
        push(&source, ForeignKeyRow::new("S", "T1", "FK_B", "C3", 1).disabled());

        let cache = foreign_key_cache(catalog(), source);
        let keys = cache.get_entries(&Schema::new("S"), None).unwrap();

        assert_eq!(keys.len(), 2);
        let fk_a = &keys[0];
        assert_eq!(fk_a.qualified_name(), "S.T1.FK_A");
        assert_eq!(fk_a.kind, ConstraintKind::ForeignKey);
        assert_eq!(fk_a.owner.as_deref(), Some("SYS"));
        assert!(fk_a.enabled);
        assert_eq!(fk_a.referenced_table.as_deref(), Some("PARENT"));
        assert_eq!(fk_a.referenced_key.as_deref(), Some("PK_PARENT"));
        assert_eq!(
            fk_a.columns(),
            &[
                KeyColumn {
                    ordinal_position: 1,
                    column: "C1".to_string(),
                    referenced_column: Some("ID".to_string()),
                },
                KeyColumn {
                    ordinal_position: 2,
                    column: "C2".to_string(),
                    referenced_column: Some("CODE".to_string()),
                },
            ]
        );

        let fk_b = &keys[1];
        assert_eq!(fk_b.column_names(), vec!["C3"]);
        assert!(!fk_b.enabled);
    }

    #[test]
    fn test_unknown_column_is_dropped() {
        let source = memory_source();
        push(&source, ForeignKeyRow::new("S", "T1", "FK_A", "C1", 1));
        push(&source, ForeignKeyRow::new("S", "T1", "FK_A", "GONE", 2));

        let cache = foreign_key_cache(catalog(), source);
        let keys = cache.get_entries(&Schema::new("S"), None).unwrap();

        assert_eq!(keys[0].column_names(), vec!["C1"]);
        assert_eq!(cache.metrics().columns_dropped, 1);
    }

    #[test]
    fn test_missing_position_defaults_to_zero() {
        let source = memory_source();
        push(&source, ForeignKeyRow::new("S", "T1", "FK_A", "C1", 1).without_position());

        let cache = foreign_key_cache(catalog(), source);
        let keys = cache.get_entries(&Schema::new("S"), None).unwrap();
        assert_eq!(keys[0].columns()[0].ordinal_position, 0);
    }

    #[test]
    fn test_unknown_constraint_type_fails_load() {
        let source = memory_source();
        let mut values = ForeignKeyRow::new("S", "T1", "CK_A", "C1", 1).values();
        values[5] = "CHECK".into();
        source.push_row(values).unwrap();

        let cache = foreign_key_cache(catalog(), source);
        let result = cache.get_entries(&Schema::new("S"), None);
        assert!(matches!(result, Err(CacheError::RowMapping(_))));
        assert!(!cache.is_loaded("S", None));
    }

    #[test]
    fn test_serializes_for_output() {
        let source = memory_source();
        push(&source, ForeignKeyRow::new("S", "T1", "FK_A", "C1", 1));

        let cache = foreign_key_cache(catalog(), source);
        let keys = cache.get_entries(&Schema::new("S"), None).unwrap();
        let json = serde_json::to_value(keys[0].as_ref()).unwrap();

        assert_eq!(json["kind"], "FOREIGN_KEY");
        assert_eq!(json["columns"][0]["column"], "C1");
    }
}
