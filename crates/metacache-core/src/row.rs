//! Row Reader Collaborator
//!
//! The cache consumes query results through two traits:
//!
//! - [`RowSource`]: executes a [`BoundQuery`] and returns a cursor
//! - [`RowCursor`]: forward-only, single-pass iteration over [`Row`]s
//!
//! Rows expose named-column access with null-safe typed getters. Asking for a
//! column the result set does not carry is a fatal [`CacheError::RowMapping`].
//!
//! [`MemoryRowSource`] is a scripted source that replays fixed rows and counts
//! executions. It backs unit tests and fixtures.

use crate::error::CacheError;
use crate::query::{BoundQuery, QueryTemplate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single value read from a result row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row with named columns
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Column names are shared between all rows of one result.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Result<Self, CacheError> {
        if columns.len() != values.len() {
            return Err(CacheError::RowMapping(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Raw value of a column (case-insensitive lookup)
    pub fn value(&self, column: &str) -> Result<&Value, CacheError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|idx| &self.values[idx])
            .ok_or_else(|| {
                CacheError::RowMapping(format!("column '{}' not present in result set", column))
            })
    }

    /// Read a column as text. NULL yields `None`; numbers are rendered.
    pub fn get_string(&self, column: &str) -> Result<Option<String>, CacheError> {
        Ok(match self.value(column)? {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
        })
    }

    /// Read a column as an integer. NULL yields `None`.
    pub fn get_int(&self, column: &str) -> Result<Option<i64>, CacheError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Real(r) if r.fract() == 0.0 => Ok(Some(*r as i64)),
            Value::Text(s) => s.trim().parse::<i64>().map(Some).map_err(|_| {
                CacheError::RowMapping(format!("column '{}' is not an integer: '{}'", column, s))
            }),
            Value::Real(r) => Err(CacheError::RowMapping(format!(
                "column '{}' is not an integer: {}",
                column, r
            ))),
        }
    }

    /// Read a text column that must not be NULL
    pub fn require_string(&self, column: &str) -> Result<String, CacheError> {
        self.get_string(column)?
            .ok_or_else(|| CacheError::RowMapping(format!("column '{}' is NULL", column)))
    }
}

/// Forward-only cursor over query results
pub trait RowCursor {
    /// Next row, or `None` once the result set is exhausted
    fn next_row(&mut self) -> Result<Option<Row>, CacheError>;
}

/// Executes query templates against some catalog
pub trait RowSource: Send + Sync {
    fn execute(&self, query: &BoundQuery) -> Result<Box<dyn RowCursor + '_>, CacheError>;
}

/// Cursor over rows that were already fetched
pub struct VecRowCursor {
    rows: std::vec::IntoIter<Row>,
}

impl VecRowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for VecRowCursor {
    fn next_row(&mut self) -> Result<Option<Row>, CacheError> {
        Ok(self.rows.next())
    }
}

/// Cursor that yields a fixed number of rows and then fails
struct FailingCursor {
    inner: VecRowCursor,
    remaining: usize,
    message: String,
}

impl RowCursor for FailingCursor {
    fn next_row(&mut self) -> Result<Option<Row>, CacheError> {
        if self.remaining == 0 {
            return Err(CacheError::query_execution("cursor", self.message.clone()));
        }
        self.remaining -= 1;
        self.inner.next_row()
    }
}

/// Planned failure for the next execution
#[derive(Debug, Clone)]
enum Failure {
    OnExecute(String),
    AfterRows(usize, String),
}

/// Scripted row source.
///
/// Rows are replayed in insertion order, which stands in for the ORDER BY of
/// a real catalog query. The single-parent template filters on the parent
/// column; both templates filter on the container column.
pub struct MemoryRowSource {
    columns: Arc<[String]>,
    container_column: String,
    parent_column: String,
    rows: Mutex<Vec<Vec<Value>>>,
    executions: AtomicUsize,
    failure: Mutex<Option<Failure>>,
}

impl MemoryRowSource {
    /// Create a source with the given result columns.
    ///
    /// `container_column` and `parent_column` name the columns compared with
    /// the bound parameters.
    pub fn new(columns: &[&str], container_column: &str, parent_column: &str) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            container_column: container_column.to_string(),
            parent_column: parent_column.to_string(),
            rows: Mutex::new(Vec::new()),
            executions: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Append a row; values must follow the column order given to `new`
    pub fn push_row(&self, values: Vec<Value>) -> Result<(), CacheError> {
        Row::new(Arc::clone(&self.columns), values.clone())?;
        self.rows.lock().push(values);
        Ok(())
    }

    /// Drop all rows
    pub fn clear_rows(&self) {
        self.rows.lock().clear();
    }

    /// Make the next execution fail before returning a cursor
    pub fn fail_next_execution(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(Failure::OnExecute(message.into()));
    }

    /// Make the next cursor fail after yielding `rows` rows
    pub fn fail_next_cursor_after(&self, rows: usize, message: impl Into<String>) {
        *self.failure.lock() = Some(Failure::AfterRows(rows, message.into()));
    }

    /// Number of times `execute` was called
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn matches(&self, values: &[Value], column: &str, expected: &str) -> bool {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .is_some_and(|idx| matches!(&values[idx], Value::Text(s) if s == expected))
    }
}

impl RowSource for MemoryRowSource {
    fn execute(&self, query: &BoundQuery) -> Result<Box<dyn RowCursor + '_>, CacheError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().take();
        if let Some(Failure::OnExecute(message)) = &failure {
            return Err(CacheError::query_execution(query.template.as_str(), message.clone()));
        }

        let container = query.params.first().map(String::as_str).unwrap_or_default();
        let parent = match query.template {
            QueryTemplate::AllInContainer => None,
            QueryTemplate::SingleParent => query.params.get(1).map(String::as_str),
        };

        let rows = self
            .rows
            .lock()
            .iter()
            .filter(|values| self.matches(values, &self.container_column, container))
            .filter(|values| parent.map_or(true, |p| self.matches(values, &self.parent_column, p)))
            .map(|values| Row::new(Arc::clone(&self.columns), values.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let cursor = VecRowCursor::new(rows);
        match failure {
            Some(Failure::AfterRows(remaining, message)) => Ok(Box::new(FailingCursor {
                inner: cursor,
                remaining,
                message,
            })),
            _ => Ok(Box::new(cursor)),
        }
    }
}
