use std::collections::HashSet;

use tracing::debug;

use super::activity_log::{Activity, ActivityLog};

/// Activities whose total frequency falls below `threshold` times the maximum
/// activity frequency of the log.
///
/// `threshold` is expected in `[0, 1]`; the cutoff is rounded to the nearest
/// integer, so a threshold of 0 removes nothing.
pub fn activities_below_threshold(log: &ActivityLog, threshold: f64) -> HashSet<Activity> {
    let frequencies = log.activity_frequencies();
    let max_frequency = match frequencies.values().max() {
        Some(max) => *max,
        None => return HashSet::new(),
    };
    let cutoff = (max_frequency as f64 * threshold).round() as u64;
    frequencies
        .into_iter()
        .filter(|(_, frequency)| *frequency < cutoff)
        .map(|(activity, _)| activity)
        .collect()
}

/// Minimum trace frequency implied by `threshold` relative to the most
/// frequent trace of the log.
pub fn minimum_trace_frequency(log: &ActivityLog, threshold: f64) -> u64 {
    (log.max_trace_frequency() as f64 * threshold).round() as u64
}

/// Remove the given activities from every trace of the log.
///
/// Traces emptied by the removal are dropped; genuinely empty input traces are
/// kept, since they carry the skip-behavior the miner turns into a tau branch.
pub fn filter_activities(log: &ActivityLog, to_remove: &HashSet<Activity>) -> ActivityLog {
    if to_remove.is_empty() {
        return log.clone();
    }
    debug!(removed = to_remove.len(), "filtering activities from log");
    let mut filtered = ActivityLog::new();
    for (trace, frequency) in log.iter() {
        let filtered_trace: Vec<Activity> = trace
            .iter()
            .filter(|activity| !to_remove.contains(*activity))
            .cloned()
            .collect();
        if !filtered_trace.is_empty() || trace.is_empty() {
            filtered.accumulate(filtered_trace, frequency);
        }
    }
    filtered
}

/// Keep only traces with a frequency of at least `min_frequency`.
pub fn filter_traces(log: &ActivityLog, min_frequency: u64) -> ActivityLog {
    if min_frequency <= 1 {
        return log.clone();
    }
    log.iter()
        .filter(|(_, frequency)| *frequency >= min_frequency)
        .map(|(trace, frequency)| (trace.clone(), frequency))
        .collect()
}
