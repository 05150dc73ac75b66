//! Cache metrics for monitoring

use crate::loader::LoadReport;
use serde::Serialize;

/// Counters collected by a [`CompositeCache`](crate::store::CompositeCache)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    /// Requests answered from already-loaded scopes
    pub hits: u64,
    /// Requests that needed a load
    pub misses: u64,
    /// Loads that completed
    pub loads: u64,
    /// Loads that failed and left their scope unloaded
    pub failed_loads: u64,
    /// Rows read by completed loads
    pub rows_read: u64,
    /// Rows skipped because their parent was unknown
    pub rows_skipped: u64,
    /// Children dropped because their column was unknown
    pub columns_dropped: u64,
    /// Scope resets (container or parent)
    pub resets: u64,
}

impl CacheMetrics {
    /// Get hit rate as a percentage (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record a completed load and its anomalies
    pub fn record_load(&mut self, report: &LoadReport) {
        self.loads += 1;
        self.rows_read += report.rows_read as u64;
        self.rows_skipped += report.rows_skipped as u64;
        self.columns_dropped += report.columns_dropped as u64;
    }

    pub fn record_failure(&mut self) {
        self.failed_loads += 1;
    }

    pub fn record_reset(&mut self) {
        self.resets += 1;
    }
}
