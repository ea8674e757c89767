use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use ordered_float::OrderedFloat;
use tracing::trace;

use crate::dfg::dfg_struct::DirectlyFollowsGraph;
use crate::event_log::activity_log::{Activity, ActivityLog, LogHash};
use crate::event_log::filters::{
    activities_below_threshold, filter_activities, filter_traces, minimum_trace_frequency,
};

/// Default number of entries each inner cache retains.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Bounded memoization for the expensive intermediates of discovery.
///
/// Every cache is keyed by the order-independent [`LogHash`] of the input log
/// (plus the thresholds that shaped the result, as [`OrderedFloat`] so they
/// can be hashed), and evicts least-recently-used entries once full. Values
/// are shared via [`Arc`], so a hit never clones the underlying data.
///
/// The recursive miners descend into sub-logs that repeat across traces and
/// across repeated `mine` calls with different parameters; memoizing per
/// log *content* lets those descents share their graphs.
pub struct DiscoveryCache {
    dfgs: LruCache<LogHash, Arc<DirectlyFollowsGraph>>,
    edge_frequencies: LruCache<LogHash, Arc<HashMap<(Activity, Activity), u64>>>,
    filtered_dfgs: LruCache<(LogHash, OrderedFloat<f64>), Arc<DirectlyFollowsGraph>>,
    filtered_logs: LruCache<(LogHash, OrderedFloat<f64>, OrderedFloat<f64>), Arc<ActivityLog>>,
    binnings:
        LruCache<(LogHash, OrderedFloat<f64>, OrderedFloat<f64>), Arc<HashMap<Activity, Activity>>>,
}

impl DiscoveryCache {
    /// Create a cache with [`DEFAULT_CACHE_CAPACITY`] entries per concern.
    pub fn new() -> Self {
        // The constant is non-zero.
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap())
    }

    /// Create a cache retaining at most `capacity` entries per concern.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            dfgs: LruCache::new(capacity),
            edge_frequencies: LruCache::new(capacity),
            filtered_dfgs: LruCache::new(capacity),
            filtered_logs: LruCache::new(capacity),
            binnings: LruCache::new(capacity),
        }
    }

    /// Directly-follows graph of `log`, computed once per log content.
    pub fn dfg_for(&mut self, log: &ActivityLog) -> Arc<DirectlyFollowsGraph> {
        let key = log.content_hash();
        if let Some(hit) = self.dfgs.get(&key) {
            trace!(hash = key.0, "dfg cache hit");
            return Arc::clone(hit);
        }
        let dfg = Arc::new(DirectlyFollowsGraph::from_log(log));
        self.dfgs.put(key, Arc::clone(&dfg));
        dfg
    }

    /// Directly-follows edge frequencies of `log`, computed once per log
    /// content.
    pub fn edge_frequencies_for(
        &mut self,
        log: &ActivityLog,
    ) -> Arc<HashMap<(Activity, Activity), u64>> {
        let key = log.content_hash();
        if let Some(hit) = self.edge_frequencies.get(&key) {
            return Arc::clone(hit);
        }
        let frequencies = Arc::new(self.dfg_for(log).edges.clone());
        self.edge_frequencies.put(key, Arc::clone(&frequencies));
        frequencies
    }

    /// Directly-follows graph of `log` with edges weaker than
    /// `threshold * max_edge_weight` removed.
    ///
    /// The cutoff is rounded up, so integer edge weights survive exactly when
    /// they reach the fractional cutoff. A threshold of 0 keeps every edge.
    pub fn filtered_dfg_for(
        &mut self,
        log: &ActivityLog,
        threshold: f64,
    ) -> Arc<DirectlyFollowsGraph> {
        let key = (log.content_hash(), OrderedFloat(threshold));
        if let Some(hit) = self.filtered_dfgs.get(&key) {
            return Arc::clone(hit);
        }
        let dfg = self.dfg_for(log);
        let cutoff = (dfg.max_edge_weight().unwrap_or(0) as f64 * threshold).ceil() as u64;
        let filtered = Arc::new(dfg.filtered_by_edge_weight(cutoff));
        self.filtered_dfgs.put(key, Arc::clone(&filtered));
        filtered
    }

    /// `log` with infrequent activities and traces removed, per the relative
    /// thresholds of the miner configuration.
    ///
    /// Both cutoffs are resolved against the unfiltered input, then traces are
    /// filtered before activities; dropping a frequent trace never loosens the
    /// activity cutoff for the survivors.
    pub fn filtered_log_for(
        &mut self,
        log: &ActivityLog,
        activity_threshold: f64,
        traces_threshold: f64,
    ) -> Arc<ActivityLog> {
        let key = (
            log.content_hash(),
            OrderedFloat(activity_threshold),
            OrderedFloat(traces_threshold),
        );
        if let Some(hit) = self.filtered_logs.get(&key) {
            return Arc::clone(hit);
        }
        let to_remove = activities_below_threshold(log, activity_threshold);
        let min_frequency = minimum_trace_frequency(log, traces_threshold);
        let by_traces = filter_traces(log, min_frequency);
        let filtered = Arc::new(filter_activities(&by_traces, &to_remove));
        self.filtered_logs.put(key, Arc::clone(&filtered));
        filtered
    }

    /// Activity binning for `log` under the given parameters, computing it
    /// with `compute` on a miss.
    pub fn binning_for<F>(
        &mut self,
        log: &ActivityLog,
        min_bin_frequency: f64,
        simplification_threshold: f64,
        compute: F,
    ) -> Arc<HashMap<Activity, Activity>>
    where
        F: FnOnce() -> HashMap<Activity, Activity>,
    {
        let key = (
            log.content_hash(),
            OrderedFloat(min_bin_frequency),
            OrderedFloat(simplification_threshold),
        );
        if let Some(hit) = self.binnings.get(&key) {
            return Arc::clone(hit);
        }
        let binning = Arc::new(compute());
        self.binnings.put(key, Arc::clone(&binning));
        binning
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("dfgs", &self.dfgs.len())
            .field("edge_frequencies", &self.edge_frequencies.len())
            .field("filtered_dfgs", &self.filtered_dfgs.len())
            .field("filtered_logs", &self.filtered_logs.len())
            .field("binnings", &self.binnings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::activity_log::tests::log_of;

    #[test]
    fn dfg_is_computed_once_per_content() {
        let mut cache = DiscoveryCache::new();
        let log = log_of(&[(&["A", "B"], 2)]);
        let first = cache.dfg_for(&log);
        let second = cache.dfg_for(&log);
        assert!(Arc::ptr_eq(&first, &second));

        // Same content built in a different order hits the same entry.
        let same_content = log_of(&[(&["A", "B"], 2)]);
        let third = cache.dfg_for(&same_content);
        assert!(Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn filtered_dfg_depends_on_threshold() {
        let mut cache = DiscoveryCache::new();
        let log = log_of(&[(&["A", "B"], 10), (&["B", "C"], 1)]);
        let loose = cache.filtered_dfg_for(&log, 0.0);
        let tight = cache.filtered_dfg_for(&log, 0.5);
        assert_eq!(loose.edges.len(), 2);
        assert_eq!(tight.edges.len(), 1);
        assert!(tight.contains_edge("A", "B"));
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let mut cache = DiscoveryCache::with_capacity(NonZeroUsize::new(1).unwrap());
        let first = log_of(&[(&["A"], 1)]);
        let second = log_of(&[(&["B"], 1)]);
        let before = cache.dfg_for(&first);
        cache.dfg_for(&second);
        // The first entry was evicted, so this recomputes.
        let after = cache.dfg_for(&first);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[test]
    fn filtered_log_applies_trace_then_activity_threshold() {
        let mut cache = DiscoveryCache::new();
        let log = log_of(&[(&["A", "B"], 10), (&["A", "C"], 1)]);
        let filtered = cache.filtered_log_for(&log, 0.0, 0.5);
        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered.frequency_of(&["A".to_string(), "B".to_string()]),
            10
        );
    }

    #[test]
    fn activity_cutoff_resolves_against_the_unfiltered_log() {
        let mut cache = DiscoveryCache::new();
        let long_a = vec!["A"; 20];
        let log = log_of(&[(long_a.as_slice(), 1), (&["B", "C"], 10), (&["D"], 8)]);
        // A's 20 appearances set the activity cutoff to 16 even though its
        // trace falls to the trace threshold; B, C and D all drop below it.
        let filtered = cache.filtered_log_for(&log, 0.8, 0.5);
        assert!(filtered.is_empty());
    }

    #[test]
    fn binning_uses_cached_result() {
        let mut cache = DiscoveryCache::new();
        let log = log_of(&[(&["A", "B"], 1)]);
        let computed = cache.binning_for(&log, 0.2, 0.1, || {
            HashMap::from([("B".to_string(), "A".to_string())])
        });
        // The second closure must not run.
        let hit = cache.binning_for(&log, 0.2, 0.1, || panic!("expected a cache hit"));
        assert!(Arc::ptr_eq(&computed, &hit));
    }
}
