//! Composite Loader
//!
//! Turns an ordered row cursor into completed parent-keyed entries.
//!
//! # Grouping
//!
//! ```text
//! row ──► resolve parent ──► key = (parent, object name)
//!                              │
//!            key changed? ─────┤ yes: finish current entry, fetch_object(row)
//!                              │
//!                              └─► fetch_object_row(row) ──► child list
//! end of cursor ──► finish last entry
//! ```
//!
//! Boundaries are detected between adjacent rows only. The loader never
//! re-sorts, so the query must return the rows of one entry contiguously.
//! If it does not, the same key yields two entries and the later one wins
//! once stored.
//!
//! Rows whose parent does not resolve are skipped; children that
//! `fetch_object_row` declines are dropped. Both are counted in the
//! [`LoadReport`] and logged, never returned as errors.

use crate::error::CacheError;
use crate::model::{Container, ObjectResolver, ParentObject};
use crate::query::select_query;
use crate::row::{Row, RowSource};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, debug_span, warn};

/// Maps catalog rows onto one kind of entry (foreign keys, indexes, ...)
pub trait CompositeMapper: Send + Sync {
    type Parent: ParentObject;
    type Object: Send + Sync;
    type Child;

    /// Column holding the parent object name
    fn parent_column(&self) -> &str;

    /// Column holding the entry name
    fn object_column(&self) -> &str;

    /// Build an entry from the first row of its group.
    ///
    /// Errors are fatal for the whole load.
    fn fetch_object(
        &self,
        parent: &Self::Parent,
        name: &str,
        row: &Row,
    ) -> Result<Self::Object, CacheError>;

    /// Build the child carried by a row, or `None` to drop it
    fn fetch_object_row(
        &self,
        parent: &Self::Parent,
        object: &Self::Object,
        row: &Row,
    ) -> Result<Option<Self::Child>, CacheError>;

    /// Attach the collected children, in row order, to a finished entry
    fn cache_children(&self, object: &mut Self::Object, children: Vec<Self::Child>);
}

/// Identity of an entry within a container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryKey {
    pub parent: String,
    pub name: String,
}

impl EntryKey {
    pub fn new(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
        }
    }
}

/// A finished entry and its key
#[derive(Debug)]
pub struct LoadedEntry<O> {
    pub key: EntryKey,
    pub object: O,
}

/// What happened during one load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Rows returned by the cursor
    pub rows_read: usize,
    /// Entries finished (before last-one-wins deduplication)
    pub entries: usize,
    /// Rows skipped because their parent did not resolve
    pub rows_skipped: usize,
    /// Rows whose child was dropped
    pub columns_dropped: usize,
    /// Distinct parent names that did not resolve
    pub unknown_parents: BTreeSet<String>,
    /// Skipped rows that were logged
    pub anomalies_reported: usize,
}

impl LoadReport {
    pub fn has_anomalies(&self) -> bool {
        self.rows_skipped > 0 || self.columns_dropped > 0
    }
}

/// Entries and report of a successful load
#[derive(Debug)]
pub struct LoadOutcome<O> {
    pub entries: Vec<LoadedEntry<O>>,
    pub report: LoadReport,
}

/// Per-load accumulator: the entry being built and its children so far
struct GroupingState<M: CompositeMapper> {
    current: Option<LoadedEntry<M::Object>>,
    children: Vec<M::Child>,
}

impl<M: CompositeMapper> GroupingState<M> {
    fn new() -> Self {
        Self {
            current: None,
            children: Vec::new(),
        }
    }

    fn is_current(&self, key: &EntryKey) -> bool {
        self.current.as_ref().is_some_and(|e| &e.key == key)
    }

    fn start(&mut self, key: EntryKey, object: M::Object) {
        self.current = Some(LoadedEntry { key, object });
        self.children.clear();
    }

    /// Attach collected children to the current entry and emit it
    fn finish(&mut self, mapper: &M, out: &mut Vec<LoadedEntry<M::Object>>) {
        if let Some(mut entry) = self.current.take() {
            mapper.cache_children(&mut entry.object, std::mem::take(&mut self.children));
            out.push(entry);
        }
    }
}

/// Single-pass loader for one scope
pub struct CompositeLoader<'a, M, R> {
    mapper: &'a M,
    resolver: &'a R,
    dedupe_anomalies: bool,
}

impl<'a, M, R> CompositeLoader<'a, M, R>
where
    M: CompositeMapper,
    R: ObjectResolver<Parent = M::Parent>,
{
    pub fn new(mapper: &'a M, resolver: &'a R) -> Self {
        Self {
            mapper,
            resolver,
            dedupe_anomalies: true,
        }
    }

    /// Log every unresolved-parent row instead of once per parent name
    pub fn with_anomaly_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_anomalies = dedupe;
        self
    }

    /// Run the query for a scope and build its entries.
    ///
    /// Any error discards everything built so far.
    pub fn load(
        &self,
        source: &dyn RowSource,
        container: &dyn Container,
        parent: Option<&str>,
    ) -> Result<LoadOutcome<M::Object>, CacheError> {
        let query = select_query(Some(container), parent)?;
        let span = debug_span!(
            "composite_load",
            container = container.name(),
            parent = parent.unwrap_or("*"),
            template = query.template.as_str()
        );
        let _enter = span.enter();

        let mut cursor = source.execute(&query)?;
        let mut state = GroupingState::<M>::new();
        let mut entries = Vec::new();
        let mut report = LoadReport::default();

        while let Some(row) = cursor.next_row()? {
            report.rows_read += 1;

            let parent_name = row.require_string(self.mapper.parent_column())?;
            let object_name = row.require_string(self.mapper.object_column())?;

            let Some(parent_obj) = self.resolver.resolve_parent(container, &parent_name) else {
                report.rows_skipped += 1;
                let first_sighting = report.unknown_parents.insert(parent_name.clone());
                if first_sighting || !self.dedupe_anomalies {
                    report.anomalies_reported += 1;
                    debug!(
                        "Parent '{}' not found in '{}', skipping '{}'",
                        parent_name,
                        container.name(),
                        object_name
                    );
                }
                continue;
            };

            let key = EntryKey::new(parent_obj.name(), object_name.as_str());
            if !state.is_current(&key) {
                state.finish(self.mapper, &mut entries);
                let object = self.mapper.fetch_object(&parent_obj, &object_name, &row)?;
                state.start(key, object);
            }

            let child = match &state.current {
                Some(entry) => self
                    .mapper
                    .fetch_object_row(&parent_obj, &entry.object, &row)?,
                None => None,
            };
            match child {
                Some(child) => state.children.push(child),
                None => report.columns_dropped += 1,
            }
        }
        state.finish(self.mapper, &mut entries);
        report.entries = entries.len();

        if report.has_anomalies() {
            warn!(
                "Loaded {} entries from {} rows ({} rows skipped, {} columns dropped)",
                report.entries, report.rows_read, report.rows_skipped, report.columns_dropped
            );
        } else {
            debug!(
                "Loaded {} entries from {} rows",
                report.entries, report.rows_read
            );
        }

        Ok(LoadOutcome { entries, report })
    }
}
