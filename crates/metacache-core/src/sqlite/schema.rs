//! SQLite Schema Definitions for Catalog Databases
//!
//! A catalog database mirrors the system views of a relational database:
//! table columns, constraints, and the columns of each constraint.

/// SQL to create the columns table
///
/// One row per table column; feeds the object catalog used to resolve
/// parents and key columns.
pub const SCHEMA_CREATE_COLUMNS: &str = r#"
CREATE TABLE IF NOT EXISTS all_columns (
    column_schema TEXT NOT NULL,
    column_table TEXT NOT NULL,
    column_name TEXT NOT NULL,
    column_ordinal_position INTEGER NOT NULL,
    column_type TEXT,
    column_is_nullable INTEGER NOT NULL DEFAULT 1,

    PRIMARY KEY (column_schema, column_table, column_name)
)
"#;

/// SQL to create the constraints table
pub const SCHEMA_CREATE_CONSTRAINTS: &str = r#"
CREATE TABLE IF NOT EXISTS all_constraints (
    constraint_schema TEXT NOT NULL,
    constraint_table TEXT NOT NULL,
    constraint_name TEXT NOT NULL,
    constraint_owner TEXT,

    -- PRIMARY KEY, FOREIGN KEY, UNIQUE, NOT NULL
    constraint_type TEXT NOT NULL,
    constraint_enabled INTEGER NOT NULL DEFAULT 1,

    PRIMARY KEY (constraint_schema, constraint_table, constraint_name)
)
"#;

/// SQL to create the constraint columns table
///
/// One row per constraint column. The referenced_* columns are only set
/// for foreign keys.
pub const SCHEMA_CREATE_CONSTRAINT_COLUMNS: &str = r#"
CREATE TABLE IF NOT EXISTS all_constraint_columns (
    constraint_schema TEXT NOT NULL,
    constraint_table TEXT NOT NULL,
    constraint_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    ordinal_position INTEGER,
    referenced_schema TEXT,
    referenced_table TEXT,
    referenced_column TEXT
)
"#;

/// SQL to create indexes for scope lookups
pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_constraints_type
    ON all_constraints(constraint_schema, constraint_type);

CREATE INDEX IF NOT EXISTS idx_constraint_columns_owner
    ON all_constraint_columns(constraint_schema, constraint_table, constraint_name);
"#;

/// Select list and joins shared by both foreign-key queries, followed by a
/// scope filter and the grouping order.
///
/// Rows of one constraint come out contiguously and in key order. The
/// referenced primary key is optional.
macro_rules! foreign_key_query {
    ($filter:literal) => {
        concat!(
            r#"
SELECT
    c.constraint_name AS CONSTRAINT_NAME,
    c.constraint_table AS CONSTRAINT_TABLE,
    c.constraint_schema AS CONSTRAINT_SCHEMA,
    c.constraint_owner AS CONSTRAINT_OWNER,
    c.constraint_enabled AS CONSTRAINT_ENABLED,
    c.constraint_type AS CONSTRAINT_TYPE,
    cc.column_name AS COLUMN_NAME,
    cc.ordinal_position AS ORDINAL_POSITION,
    cc.referenced_schema AS REFERENCED_SCHEMA,
    cc.referenced_table AS REFERENCED_TABLE,
    cc.referenced_column AS REFERENCED_COLUMN,
    pk.constraint_name AS REF_PK_NAME
FROM all_constraints c
INNER JOIN all_constraint_columns cc
    ON cc.constraint_schema = c.constraint_schema
   AND cc.constraint_table = c.constraint_table
   AND cc.constraint_name = c.constraint_name
LEFT JOIN all_constraints pk
    ON pk.constraint_schema = cc.referenced_schema
   AND pk.constraint_table = cc.referenced_table
   AND pk.constraint_type = 'PRIMARY KEY'
WHERE c.constraint_type = 'FOREIGN KEY'
  AND "#,
            $filter,
            r#"
ORDER BY c.constraint_table, c.constraint_name, cc.ordinal_position
"#
        )
    };
}

/// Every foreign key of a schema; binds `[schema]`
pub const SQL_FOREIGN_KEYS_ALL: &str = foreign_key_query!("c.constraint_schema = ?1");

/// Foreign keys of one table; binds `[schema, table]`
pub const SQL_FOREIGN_KEYS_TABLE: &str =
    foreign_key_query!("c.constraint_schema = ?1 AND c.constraint_table = ?2");

/// Columns of every table in a schema, in table then column order
pub const SQL_SCHEMA_COLUMNS: &str = r#"
SELECT column_table, column_name, column_ordinal_position, column_type, column_is_nullable
FROM all_columns
WHERE column_schema = ?1
ORDER BY column_table, column_ordinal_position
"#;
