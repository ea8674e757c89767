use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::event_log::activity_log::{Activity, ActivityLog};
use crate::process_tree::process_tree_struct::Operator;

use super::cache::DiscoveryCache;
use super::cuts::Partitions;
use super::miner::{
    check_threshold, cut_on_dfg, mine_tree, ConfigError, CutStrategy, DiscoveredModel, MinerConfig,
};

///
/// Configuration of the approximate miner variant
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ApproximationConfig {
    /// Directly-follows edges weaker than this fraction of the strongest edge
    /// are dropped when cut detection retries on the simplified graph
    pub simplification_threshold: f64,
    /// Minimum behavioral-profile similarity at which two activities merge
    /// into one bin; 0 disables binning
    pub min_bin_frequency: f64,
    /// Whether candidate cuts are checked against the per-operator quality
    /// heuristics before acceptance
    pub validate_cuts: bool,
}

impl Default for ApproximationConfig {
    fn default() -> Self {
        Self {
            simplification_threshold: 0.1,
            min_bin_frequency: 0.2,
            validate_cuts: true,
        }
    }
}

impl ApproximationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("simplification_threshold", self.simplification_threshold)?;
        check_threshold("min_bin_frequency", self.min_bin_frequency)
    }
}

/// Behavioral fingerprint of one activity, used to decide which activities
/// are similar enough to share a bin.
#[derive(Debug, Default)]
struct BehaviorProfile {
    predecessors: HashSet<Activity>,
    successors: HashSet<Activity>,
    /// Frequency-weighted mean of the relative trace position (0 = first,
    /// 1 = last, 0.5 for singleton traces).
    mean_position: f64,
    /// Number of distinct (predecessor, successor) contexts the activity
    /// occurs in; trace boundaries count as a context of their own.
    context_variety: usize,
}

#[derive(Debug, Default)]
struct ProfileAccumulator {
    predecessors: HashSet<Activity>,
    successors: HashSet<Activity>,
    contexts: HashSet<(Option<Activity>, Option<Activity>)>,
    position_sum: f64,
    occurrences: u64,
}

fn behavior_profiles(log: &ActivityLog) -> HashMap<Activity, BehaviorProfile> {
    let mut accumulators: HashMap<Activity, ProfileAccumulator> = HashMap::new();
    for (trace, frequency) in log.iter() {
        let len = trace.len();
        for (i, activity) in trace.iter().enumerate() {
            let entry = accumulators.entry(activity.clone()).or_default();
            let predecessor = (i > 0).then(|| trace[i - 1].clone());
            let successor = (i + 1 < len).then(|| trace[i + 1].clone());
            if let Some(p) = &predecessor {
                entry.predecessors.insert(p.clone());
            }
            if let Some(s) = &successor {
                entry.successors.insert(s.clone());
            }
            entry.contexts.insert((predecessor, successor));
            let relative = if len <= 1 {
                0.5
            } else {
                i as f64 / (len - 1) as f64
            };
            entry.position_sum += relative * frequency as f64;
            entry.occurrences += frequency;
        }
    }
    accumulators
        .into_iter()
        .map(|(activity, acc)| {
            let mean_position = if acc.occurrences > 0 {
                acc.position_sum / acc.occurrences as f64
            } else {
                0.5
            };
            (
                activity,
                BehaviorProfile {
                    predecessors: acc.predecessors,
                    successors: acc.successors,
                    mean_position,
                    context_variety: acc.contexts.len(),
                },
            )
        })
        .collect()
}

/// Similarity of two behavior profiles in `[0, 1]`: the Jaccard overlap of
/// the combined predecessor/successor neighborhoods, scaled by positional
/// proximity. Profiles with incompatible context varieties score 0.
fn profile_similarity(a: &BehaviorProfile, b: &BehaviorProfile) -> f64 {
    let variety_ratio = match (a.context_variety, b.context_variety) {
        (0, 0) => 1.0,
        (x, y) => x.min(y) as f64 / x.max(y) as f64,
    };
    if variety_ratio < 0.5 {
        return 0.0;
    }
    let shared = a.predecessors.intersection(&b.predecessors).count()
        + a.successors.intersection(&b.successors).count();
    let total = a.predecessors.union(&b.predecessors).count()
        + a.successors.union(&b.successors).count();
    if total == 0 {
        return 0.0;
    }
    let neighborhood = shared as f64 / total as f64;
    neighborhood * (1.0 - (a.mean_position - b.mean_position).abs())
}

/// Compute the activity binning of `log`: a map from merged activities to
/// their bin representative (the lexicographically smallest member).
/// Activities that stay on their own do not appear in the map.
///
/// Two merge sources feed one union-find: similarity merges (profile
/// similarity of at least `min_bin_frequency`) and rarity merges (all
/// activities whose strongest incident edge stays below
/// `simplification_threshold` times the maximum edge weight share one bin).
/// Raising the simplification threshold only ever adds rarity merges, so the
/// number of retained representatives is non-increasing in it.
pub(crate) fn compute_binning(
    log: &ActivityLog,
    edge_frequencies: &HashMap<(Activity, Activity), u64>,
    min_bin_frequency: f64,
    simplification_threshold: f64,
) -> HashMap<Activity, Activity> {
    let profiles = behavior_profiles(log);
    let activities: Vec<&Activity> = profiles.keys().sorted().collect();
    if activities.len() < 2 {
        return HashMap::new();
    }
    let mut union_find: UnionFind<usize> = UnionFind::new(activities.len());

    if min_bin_frequency > 0.0 {
        for (i, j) in (0..activities.len()).tuple_combinations() {
            let similarity =
                profile_similarity(&profiles[activities[i]], &profiles[activities[j]]);
            if similarity >= min_bin_frequency {
                union_find.union(i, j);
            }
        }
    }

    if simplification_threshold > 0.0 {
        if let Some(max_weight) = edge_frequencies.values().copied().max() {
            let cutoff = max_weight as f64 * simplification_threshold;
            let mut strongest: HashMap<&str, u64> = HashMap::new();
            for ((source, target), weight) in edge_frequencies {
                for endpoint in [source.as_str(), target.as_str()] {
                    let entry = strongest.entry(endpoint).or_insert(0);
                    *entry = (*entry).max(*weight);
                }
            }
            let rare: Vec<usize> = (0..activities.len())
                .filter(|&i| {
                    (strongest.get(activities[i].as_str()).copied().unwrap_or(0) as f64) < cutoff
                })
                .collect();
            for pair in rare.windows(2) {
                union_find.union(pair[0], pair[1]);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..activities.len() {
        groups.entry(union_find.find(i)).or_default().push(i);
    }
    let mut mapping = HashMap::new();
    for members in groups.values() {
        // Members are index-sorted, and the activities are sorted by label.
        let representative = activities[members[0]];
        for &i in &members[1..] {
            mapping.insert(activities[i].clone(), representative.clone());
        }
    }
    mapping
}

/// Rewrite every trace of `log` through the binning map, accumulating traces
/// that collapse onto each other.
pub(crate) fn rebin_log(log: &ActivityLog, mapping: &HashMap<Activity, Activity>) -> ActivityLog {
    if mapping.is_empty() {
        return log.clone();
    }
    log.iter()
        .map(|(trace, frequency)| {
            let rebinned: Vec<Activity> = trace
                .iter()
                .map(|activity| mapping.get(activity).unwrap_or(activity).clone())
                .collect();
            (rebinned, frequency)
        })
        .collect()
}

/// Per-operator acceptance limits for candidate cuts.
#[derive(Debug, Clone, Copy)]
struct ValidationLimits {
    /// Exclusive/parallel: largest tolerated fraction of alphabet overlap
    /// between sub-logs
    max_alphabet_overlap: f64,
    /// Sequence: smallest tolerated fraction of trace frequency whose
    /// partition order is non-decreasing
    min_order_ratio: f64,
    /// Loop: largest tolerated fraction of the alphabet living in the redo
    /// parts
    max_redo_ratio: f64,
    /// Exclusive: smallest tolerated fraction of total trace frequency
    /// surviving the split
    min_preserved_frequency: f64,
}

const STRICT_LIMITS: ValidationLimits = ValidationLimits {
    max_alphabet_overlap: 0.1,
    min_order_ratio: 0.9,
    max_redo_ratio: 0.5,
    min_preserved_frequency: 0.9,
};

const RELAXED_LIMITS: ValidationLimits = ValidationLimits {
    max_alphabet_overlap: 0.25,
    min_order_ratio: 0.75,
    max_redo_ratio: 0.6,
    min_preserved_frequency: 0.75,
};

/// (min_bin_frequency, simplification_threshold) pairs swept when neither the
/// full nor the simplified graph yields an acceptable cut.
const PARAMETER_GRID: [(f64, f64); 3] = [(0.1, 0.2), (0.2, 0.3), (0.3, 0.4)];

fn validate_cut(
    operator: Operator,
    partitions: &Partitions,
    sub_logs: &[ActivityLog],
    log: &ActivityLog,
    limits: &ValidationLimits,
) -> bool {
    match operator {
        Operator::Exclusive => {
            if sub_logs.iter().any(ActivityLog::is_empty) {
                return false;
            }
            let preserved: u64 = sub_logs.iter().map(ActivityLog::total_frequency).sum();
            let total = log.total_frequency();
            if (preserved as f64) < limits.min_preserved_frequency * total as f64 {
                return false;
            }
            average_pairwise_overlap(sub_logs) <= limits.max_alphabet_overlap
        }
        Operator::Sequence => ordered_fraction(log, partitions) >= limits.min_order_ratio,
        Operator::Parallel => shared_activity_fraction(sub_logs) <= limits.max_alphabet_overlap,
        Operator::Loop => {
            let redo: usize = partitions[1..].iter().map(HashSet::len).sum();
            let total: usize = partitions.iter().map(HashSet::len).sum();
            total > 0 && (redo as f64) / (total as f64) <= limits.max_redo_ratio
        }
    }
}

/// Average pairwise Jaccard overlap of the sub-log alphabets.
fn average_pairwise_overlap(sub_logs: &[ActivityLog]) -> f64 {
    let alphabets: Vec<HashSet<Activity>> = sub_logs.iter().map(ActivityLog::alphabet).collect();
    let mut pairs = 0usize;
    let mut sum = 0.0;
    for (a, b) in alphabets.iter().tuple_combinations() {
        let union = a.union(b).count();
        if union > 0 {
            sum += a.intersection(b).count() as f64 / union as f64;
        }
        pairs += 1;
    }
    if pairs == 0 {
        0.0
    } else {
        sum / pairs as f64
    }
}

/// Fraction of trace frequency whose activities visit the partitions in
/// non-decreasing order.
fn ordered_fraction(log: &ActivityLog, partitions: &Partitions) -> f64 {
    let total = log.total_frequency();
    if total == 0 {
        return 1.0;
    }
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (i, partition) in partitions.iter().enumerate() {
        for activity in partition {
            owner.insert(activity.as_str(), i);
        }
    }
    let mut ordered = 0u64;
    for (trace, frequency) in log.iter() {
        let mut last = 0usize;
        let respects = trace.iter().all(|activity| {
            match owner.get(activity.as_str()) {
                Some(&i) if i >= last => {
                    last = i;
                    true
                }
                Some(_) => false,
                None => true,
            }
        });
        if respects {
            ordered += frequency;
        }
    }
    ordered as f64 / total as f64
}

/// Fraction of all activities appearing in more than one sub-log alphabet.
fn shared_activity_fraction(sub_logs: &[ActivityLog]) -> f64 {
    let mut seen: HashMap<Activity, usize> = HashMap::new();
    for sub_log in sub_logs {
        for activity in sub_log.alphabet() {
            *seen.entry(activity).or_insert(0) += 1;
        }
    }
    if seen.is_empty() {
        return 0.0;
    }
    let shared = seen.values().filter(|count| **count > 1).count();
    shared as f64 / seen.len() as f64
}

/// Cut search ladder of the approximate variant: full graph under strict
/// limits, simplified graph under relaxed limits, then a small parameter grid
/// of re-binned logs.
#[derive(Debug)]
struct ApproximateCuts {
    config: ApproximationConfig,
}

impl ApproximateCuts {
    fn accept(
        &self,
        operator: Operator,
        partitions: &Partitions,
        sub_logs: &[ActivityLog],
        log: &ActivityLog,
        limits: &ValidationLimits,
    ) -> bool {
        if !self.config.validate_cuts {
            return true;
        }
        let accepted = validate_cut(operator, partitions, sub_logs, log, limits);
        if !accepted {
            debug!(operator = %operator, "candidate cut rejected by validation");
        }
        accepted
    }
}

impl CutStrategy for ApproximateCuts {
    fn find_cut(
        &mut self,
        log: &ActivityLog,
        cache: &mut DiscoveryCache,
    ) -> Option<(Operator, Vec<ActivityLog>)> {
        let full = cache.dfg_for(log);
        if let Some((operator, partitions, sub_logs)) = cut_on_dfg(&full, log) {
            if self.accept(operator, &partitions, &sub_logs, log, &STRICT_LIMITS) {
                return Some((operator, sub_logs));
            }
        }

        if self.config.simplification_threshold > 0.0 {
            let simplified = cache.filtered_dfg_for(log, self.config.simplification_threshold);
            if *simplified != *full {
                if let Some((operator, partitions, sub_logs)) = cut_on_dfg(&simplified, log) {
                    if self.accept(operator, &partitions, &sub_logs, log, &RELAXED_LIMITS) {
                        debug!(operator = %operator, "cut accepted on simplified graph");
                        return Some((operator, sub_logs));
                    }
                }
            }
        }

        for &(bin_frequency, simplification) in &PARAMETER_GRID {
            let edge_frequencies = cache.edge_frequencies_for(log);
            let binning = cache.binning_for(log, bin_frequency, simplification, || {
                compute_binning(log, &edge_frequencies, bin_frequency, simplification)
            });
            if binning.is_empty() {
                continue;
            }
            let binned = rebin_log(log, &binning);
            let dfg = cache.filtered_dfg_for(&binned, simplification);
            if let Some((operator, partitions, sub_logs)) = cut_on_dfg(&dfg, &binned) {
                if self.accept(operator, &partitions, &sub_logs, &binned, &RELAXED_LIMITS) {
                    debug!(
                        operator = %operator,
                        bin_frequency,
                        simplification,
                        "cut accepted on re-binned graph"
                    );
                    return Some((operator, sub_logs));
                }
            }
        }
        None
    }
}

///
/// The approximate miner variant: trades precision for robustness on large or
/// chaotic logs by binning behaviorally similar activities, simplifying the
/// directly-follows graph, and validating candidate cuts against quality
/// heuristics before accepting them.
///
#[derive(Debug)]
pub struct ApproximateMiner {
    config: MinerConfig,
    approximation: ApproximationConfig,
    cache: DiscoveryCache,
}

impl ApproximateMiner {
    /// Create a miner, validating both configurations.
    pub fn new(
        config: MinerConfig,
        approximation: ApproximationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        approximation.validate()?;
        Ok(Self {
            config,
            approximation,
            cache: DiscoveryCache::new(),
        })
    }

    /// Create a miner with the default configurations.
    pub fn with_defaults() -> Self {
        Self {
            config: MinerConfig::default(),
            approximation: ApproximationConfig::default(),
            cache: DiscoveryCache::new(),
        }
    }

    /// Discover a process tree from `log`, approximating where the exact
    /// structure is too noisy to cut.
    pub fn mine(&mut self, log: &ActivityLog) -> DiscoveredModel {
        info!(
            traces = log.len(),
            simplification_threshold = self.approximation.simplification_threshold,
            min_bin_frequency = self.approximation.min_bin_frequency,
            "mining process tree approximately"
        );
        let filtered = self.cache.filtered_log_for(
            log,
            self.config.activity_threshold,
            self.config.traces_threshold,
        );
        let approximation = self.approximation;
        let binned = if approximation.min_bin_frequency > 0.0 {
            let edge_frequencies = self.cache.edge_frequencies_for(&filtered);
            let binning = self.cache.binning_for(
                &filtered,
                approximation.min_bin_frequency,
                approximation.simplification_threshold,
                || {
                    compute_binning(
                        &filtered,
                        &edge_frequencies,
                        approximation.min_bin_frequency,
                        approximation.simplification_threshold,
                    )
                },
            );
            if !binning.is_empty() {
                debug!(merged = binning.len(), "binned similar activities");
            }
            rebin_log(&filtered, &binning)
        } else {
            (*filtered).clone()
        };

        let mut strategy = ApproximateCuts {
            config: self.approximation,
        };
        let tree = mine_tree(
            &mut strategy,
            &binned,
            &mut self.cache,
            0,
            self.config.max_recursion_depth,
        );
        DiscoveredModel {
            activity_frequencies: binned.activity_frequencies(),
            tree,
        }
    }
}
