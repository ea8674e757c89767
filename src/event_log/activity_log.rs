use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Activity label in an event log.
pub type Activity = String;

///
/// Error encountered while constructing an [`ActivityLog`]
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// A trace was inserted with frequency 0 (trace included)
    ZeroFrequency(Vec<Activity>),
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::ZeroFrequency(trace) => {
                write!(f, "Trace {:?} has frequency 0; frequencies must be > 0", trace)
            }
        }
    }
}

impl std::error::Error for LogError {}

/// Order-independent 64-bit content hash of an [`ActivityLog`].
///
/// Used as the memoization key of the discovery caches: two logs with the same
/// trace multiset hash identically regardless of insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogHash(pub u64);

///
/// An event log projected on activity labels: a multiset of traces.
///
/// Each trace is an ordered (possibly empty) sequence of [`Activity`] labels,
/// mapped to its frequency in the log. Invariants: all frequencies are > 0 and
/// there are no duplicate trace keys (inserting an existing trace accumulates
/// its frequency instead).
///
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLog {
    /// Traces and their frequencies
    #[serde_as(as = "Vec<(_, _)>")]
    traces: HashMap<Vec<Activity>, u64>,
}

impl ActivityLog {
    /// Create a new, empty [`ActivityLog`].
    pub fn new() -> Self {
        Self {
            traces: HashMap::new(),
        }
    }

    /// Build an [`ActivityLog`] from an ordered list of traces.
    ///
    /// Each occurrence counts with frequency 1; duplicate traces accumulate.
    pub fn from_traces<I, T>(traces: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = Activity>,
    {
        let mut log = Self::new();
        for trace in traces {
            log.accumulate(trace.into_iter().collect(), 1);
        }
        log
    }

    /// Build an [`ActivityLog`] from pre-aggregated trace counts.
    ///
    /// Returns [`LogError::ZeroFrequency`] if any count is 0.
    pub fn from_counts<I>(counts: I) -> Result<Self, LogError>
    where
        I: IntoIterator<Item = (Vec<Activity>, u64)>,
    {
        let mut log = Self::new();
        for (trace, frequency) in counts {
            log.add_trace(trace, frequency)?;
        }
        Ok(log)
    }

    /// Add a trace with the given frequency, accumulating if it already exists.
    ///
    /// Returns [`LogError::ZeroFrequency`] if `frequency` is 0.
    pub fn add_trace(&mut self, trace: Vec<Activity>, frequency: u64) -> Result<(), LogError> {
        if frequency == 0 {
            return Err(LogError::ZeroFrequency(trace));
        }
        self.accumulate(trace, frequency);
        Ok(())
    }

    /// Accumulate a trace known to have a positive frequency.
    pub(crate) fn accumulate(&mut self, trace: Vec<Activity>, frequency: u64) {
        if frequency > 0 {
            *self.traces.entry(trace).or_insert(0) += frequency;
        }
    }

    /// Iterate over the distinct traces and their frequencies.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<Activity>, u64)> {
        self.traces.iter().map(|(t, f)| (t, *f))
    }

    /// Number of distinct traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// `true` if the log contains no traces at all.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Sum of all trace frequencies.
    pub fn total_frequency(&self) -> u64 {
        self.traces.values().sum()
    }

    /// Largest frequency of any single trace (0 for an empty log).
    pub fn max_trace_frequency(&self) -> u64 {
        self.traces.values().copied().max().unwrap_or(0)
    }

    /// Frequency of the given trace (0 if absent).
    pub fn frequency_of(&self, trace: &[Activity]) -> u64 {
        self.traces.get(trace).copied().unwrap_or(0)
    }

    /// `true` if the empty trace occurs in the log.
    pub fn contains_empty_trace(&self) -> bool {
        self.traces.contains_key([].as_slice())
    }

    /// Remove the empty trace, returning its frequency if it was present.
    pub fn remove_empty_trace(&mut self) -> Option<u64> {
        self.traces.remove([].as_slice())
    }

    /// Copy of this log without the empty trace.
    pub fn without_empty_trace(&self) -> Self {
        let mut log = self.clone();
        log.remove_empty_trace();
        log
    }

    /// The set of all distinct activities occurring in the log.
    pub fn alphabet(&self) -> HashSet<Activity> {
        self.traces
            .keys()
            .flat_map(|trace| trace.iter().cloned())
            .collect()
    }

    /// Total occurrence count per activity, weighted by trace frequency.
    pub fn activity_frequencies(&self) -> HashMap<Activity, u64> {
        let mut frequencies: HashMap<Activity, u64> = HashMap::new();
        for (trace, frequency) in &self.traces {
            for activity in trace {
                *frequencies.entry(activity.clone()).or_insert(0) += frequency;
            }
        }
        frequencies
    }

    /// Order-independent content hash of the log.
    ///
    /// Each (trace, frequency) entry is hashed on its own and the entry hashes
    /// are combined commutatively, so insertion order does not matter.
    pub fn content_hash(&self) -> LogHash {
        let mut combined: u64 = 0x9e37_79b9_7f4a_7c15;
        for (trace, frequency) in &self.traces {
            let mut hasher = DefaultHasher::new();
            trace.hash(&mut hasher);
            frequency.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        LogHash(combined)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

impl FromIterator<(Vec<Activity>, u64)> for ActivityLog {
    /// Collect pre-aggregated counts, silently skipping zero frequencies.
    fn from_iter<I: IntoIterator<Item = (Vec<Activity>, u64)>>(iter: I) -> Self {
        let mut log = Self::new();
        for (trace, frequency) in iter {
            log.accumulate(trace, frequency);
        }
        log
    }
}
