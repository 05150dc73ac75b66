//! Composite Cache Store
//!
//! Owns every materialized entry and the scope flags that say which parts of
//! a container are loaded:
//!
//! ```text
//! CompositeCache
//! ├── containers: container → ContainerState
//! │     ├── fully_loaded      (whole-container flag)
//! │     ├── loaded_parents    (single-parent flags)
//! │     └── entries: (parent, name) → Arc<entry>
//! ├── loading_locks: container → Mutex   (one load per container at a time)
//! └── metrics
//! ```
//!
//! A whole-container flag implies every parent under it is loaded; the
//! per-parent flags are only consulted while it is unset.
//!
//! Loads use double-checked locking on a per-container lock. A whole-container
//! load and any single-parent load under it share that lock, so concurrent
//! callers for overlapping scopes run one query and see the same `Arc`s.
//! Different containers load in parallel.

use crate::error::CacheError;
use crate::loader::{CompositeLoader, CompositeMapper, EntryKey, LoadReport, LoadedEntry};
use crate::metrics::CacheMetrics;
use crate::model::{Container, ObjectResolver, ParentObject};
use crate::row::RowSource;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Explicit key of a cache scope: a container, optionally narrowed to one parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub container: String,
    pub parent: Option<String>,
}

impl ScopeKey {
    pub fn new(container: &str, parent: Option<&str>) -> Result<Self, CacheError> {
        if container.is_empty() {
            return Err(CacheError::InvalidScope("container has no name".to_string()));
        }
        if parent == Some("") {
            return Err(CacheError::InvalidScope(format!(
                "parent in '{}' has no name",
                container
            )));
        }
        Ok(Self {
            container: container.to_string(),
            parent: parent.map(str::to_string),
        })
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}.{}", self.container, parent),
            None => write!(f, "{}", self.container),
        }
    }
}

/// Materialized entries and flags of one container
struct ContainerState<O> {
    fully_loaded: bool,
    loaded_parents: HashSet<String>,
    entries: BTreeMap<EntryKey, Arc<O>>,
}

impl<O> ContainerState<O> {
    fn new() -> Self {
        Self {
            fully_loaded: false,
            loaded_parents: HashSet::new(),
            entries: BTreeMap::new(),
        }
    }

    fn is_loaded(&self, parent: Option<&str>) -> bool {
        self.fully_loaded || parent.is_some_and(|p| self.loaded_parents.contains(p))
    }

    fn collect(&self, parent: Option<&str>) -> Vec<Arc<O>> {
        self.entries
            .iter()
            .filter(|(key, _)| parent.map_or(true, |p| key.parent == p))
            .map(|(_, entry)| Arc::clone(entry))
            .collect()
    }
}

/// Snapshot of cache contents
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Containers with any cached state
    pub containers: usize,
    /// Containers whose whole-container flag is set
    pub fully_loaded_containers: usize,
    /// Single-parent scopes loaded (excluding fully loaded containers)
    pub loaded_parents: usize,
    /// Entries held across all containers
    pub entries: usize,
    pub metrics: CacheMetrics,
}

/// Two-level cache of entries loaded through a [`CompositeMapper`]
pub struct CompositeCache<M: CompositeMapper, R, S> {
    mapper: M,
    resolver: Arc<R>,
    source: S,
    containers: DashMap<String, ContainerState<M::Object>>,
    /// Per-container loading locks; Arc so a lock can be held without
    /// holding the DashMap entry
    loading_locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: Mutex<CacheMetrics>,
    last_report: Mutex<Option<LoadReport>>,
    dedupe_anomalies: bool,
}

impl<M, R, S> CompositeCache<M, R, S>
where
    M: CompositeMapper,
    R: ObjectResolver<Parent = M::Parent>,
    S: RowSource,
{
    pub fn new(mapper: M, resolver: Arc<R>, source: S) -> Self {
        Self {
            mapper,
            resolver,
            source,
            containers: DashMap::new(),
            loading_locks: DashMap::new(),
            metrics: Mutex::new(CacheMetrics::default()),
            last_report: Mutex::new(None),
            dedupe_anomalies: true,
        }
    }

    /// Log every unresolved-parent row instead of once per parent name per load
    pub fn with_anomaly_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_anomalies = dedupe;
        self
    }

    pub fn resolver(&self) -> &Arc<R> {
        &self.resolver
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // =========================================================================
    // Entry Access
    // =========================================================================

    /// Entries of a container, or of one parent in it.
    ///
    /// Returns cached entries when the scope is loaded; otherwise loads the
    /// scope first. Entries are shared: repeated calls hand out the same
    /// `Arc`s until the scope is reset.
    pub fn get_entries(
        &self,
        container: &dyn Container,
        parent: Option<&M::Parent>,
    ) -> Result<Vec<Arc<M::Object>>, CacheError> {
        let scope = ScopeKey::new(container.name(), parent.map(|p| p.name()))?;

        // First check: already loaded?
        if let Some(entries) = self.cached(&scope) {
            trace!("Cache hit for {}", scope);
            self.metrics.lock().record_hit();
            return Ok(entries);
        }

        let loading_lock = self.loading_lock(&scope.container);
        let _guard = loading_lock.lock();

        // Second check: another caller may have loaded it while we waited
        if let Some(entries) = self.cached(&scope) {
            trace!("Cache hit for {} after waiting for load", scope);
            self.metrics.lock().record_hit();
            return Ok(entries);
        }

        self.metrics.lock().record_miss();
        debug!("Loading {}", scope);

        let loader = CompositeLoader::new(&self.mapper, self.resolver.as_ref())
            .with_anomaly_dedupe(self.dedupe_anomalies);
        let outcome = match loader.load(&self.source, container, scope.parent.as_deref()) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("Load of {} failed: {}", scope, err);
                self.metrics.lock().record_failure();
                return Err(err);
            }
        };

        self.metrics.lock().record_load(&outcome.report);
        *self.last_report.lock() = Some(outcome.report);
        Ok(self.commit(&scope, outcome.entries))
    }

    /// One entry by name, loading its parent's scope if needed
    pub fn get_entry(
        &self,
        container: &dyn Container,
        parent: &M::Parent,
        name: &str,
    ) -> Result<Option<Arc<M::Object>>, CacheError> {
        self.get_entries(container, Some(parent))?;
        let key = EntryKey::new(parent.name(), name);
        Ok(self
            .containers
            .get(container.name())
            .and_then(|state| state.entries.get(&key).cloned()))
    }

    /// Drop all entries and flags of a container
    pub fn reset(&self, container: &dyn Container) {
        let loading_lock = self.loading_lock(container.name());
        let _guard = loading_lock.lock();

        if let Some((_, state)) = self.containers.remove(container.name()) {
            debug!(
                "Reset {} ({} entries dropped)",
                container.name(),
                state.entries.len()
            );
        }
        // Only our clone and the map's are left when nobody else waits on it
        self.loading_locks
            .remove_if(container.name(), |_, lock| Arc::strong_count(lock) <= 2);
        self.metrics.lock().record_reset();
    }

    /// Drop the entries and flag of one parent.
    ///
    /// Fails with [`CacheError::InconsistentReset`] while the container is
    /// fully loaded; reset the whole container instead.
    pub fn reset_parent(
        &self,
        container: &dyn Container,
        parent: &M::Parent,
    ) -> Result<(), CacheError> {
        let loading_lock = self.loading_lock(container.name());
        let _guard = loading_lock.lock();

        if let Some(mut state) = self.containers.get_mut(container.name()) {
            if state.fully_loaded {
                return Err(CacheError::inconsistent_reset(
                    container.name(),
                    parent.name(),
                ));
            }
            let parent_name = parent.name();
            state.entries.retain(|key, _| key.parent != parent_name);
            state.loaded_parents.remove(parent_name);
            debug!("Reset {}.{}", container.name(), parent_name);
        }
        self.metrics.lock().record_reset();
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether a scope would be answered without a query
    pub fn is_loaded(&self, container: &str, parent: Option<&str>) -> bool {
        self.containers
            .get(container)
            .is_some_and(|state| state.is_loaded(parent))
    }

    /// Containers whose whole-container flag is set, sorted
    pub fn loaded_containers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .containers
            .iter()
            .filter(|state| state.fully_loaded)
            .map(|state| state.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of cached entries in a container
    pub fn entry_count(&self, container: &str) -> usize {
        self.containers
            .get(container)
            .map_or(0, |state| state.entries.len())
    }

    /// Get a snapshot of cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    /// Report of the most recent completed load
    pub fn last_report(&self) -> Option<LoadReport> {
        self.last_report.lock().clone()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            containers: 0,
            fully_loaded_containers: 0,
            loaded_parents: 0,
            entries: 0,
            metrics: self.metrics(),
        };
        for state in self.containers.iter() {
            stats.containers += 1;
            stats.entries += state.entries.len();
            if state.fully_loaded {
                stats.fully_loaded_containers += 1;
            } else {
                stats.loaded_parents += state.loaded_parents.len();
            }
        }
        stats
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn cached(&self, scope: &ScopeKey) -> Option<Vec<Arc<M::Object>>> {
        let state = self.containers.get(&scope.container)?;
        let parent = scope.parent.as_deref();
        state.is_loaded(parent).then(|| state.collect(parent))
    }

    /// Store a finished load and set its scope flag.
    ///
    /// A whole-container load replaces everything in the container; a
    /// single-parent load replaces that parent's entries. Later entries with
    /// the same key replace earlier ones.
    fn commit(&self, scope: &ScopeKey, loaded: Vec<LoadedEntry<M::Object>>) -> Vec<Arc<M::Object>> {
        let mut state = self
            .containers
            .entry(scope.container.clone())
            .or_insert_with(ContainerState::new);

        match scope.parent.as_deref() {
            None => {
                state.entries.clear();
                state.loaded_parents.clear();
                state.fully_loaded = true;
            }
            Some(parent) => {
                state.entries.retain(|key, _| key.parent != parent);
                state.loaded_parents.insert(parent.to_string());
            }
        }
        for entry in loaded {
            state.entries.insert(entry.key, Arc::new(entry.object));
        }

        state.collect(scope.parent.as_deref())
    }

    fn loading_lock(&self, container: &str) -> Arc<Mutex<()>> {
        self.loading_locks
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
