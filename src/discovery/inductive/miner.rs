use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dfg::dfg_struct::DirectlyFollowsGraph;
use crate::event_log::activity_log::{Activity, ActivityLog};
use crate::process_tree::process_tree_struct::{Operator, ProcessTree};

use super::cache::DiscoveryCache;
use super::cuts::{exclusive_cut, loop_cut, parallel_cut, sequence_cut, Partitions};
use super::splits::{exclusive_split, loop_split, parallel_split, sequence_split};

///
/// Invalid miner configuration
///
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A relative threshold lies outside `[0, 1]` (parameter name and value
    /// included)
    ThresholdOutOfRange(&'static str, f64),
    /// The recursion depth ceiling is 0
    ZeroRecursionDepth,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ThresholdOutOfRange(name, value) => {
                write!(f, "{} must lie in [0, 1], got {}", name, value)
            }
            ConfigError::ZeroRecursionDepth => {
                write!(f, "max_recursion_depth must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Check that a relative threshold parameter lies in `[0, 1]`.
pub(crate) fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange(name, value))
    }
}

///
/// Shared configuration of the miner family
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MinerConfig {
    /// Relative frequency below which activities are dropped before mining
    /// (fraction of the most frequent activity)
    pub activity_threshold: f64,
    /// Relative frequency below which whole traces are dropped before mining
    /// (fraction of the most frequent trace)
    pub traces_threshold: f64,
    /// Recursion depth at which mining gives up and falls back to a flower
    /// model
    pub max_recursion_depth: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            activity_threshold: 0.0,
            traces_threshold: 0.2,
            max_recursion_depth: 100,
        }
    }
}

impl MinerConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("activity_threshold", self.activity_threshold)?;
        check_threshold("traces_threshold", self.traces_threshold)?;
        if self.max_recursion_depth == 0 {
            return Err(ConfigError::ZeroRecursionDepth);
        }
        Ok(())
    }
}

///
/// Result of a discovery run: the mined process tree plus the activity
/// frequencies of the (pre-filtered) log it was mined from.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredModel {
    /// The discovered process tree
    pub tree: ProcessTree,
    /// Occurrence counts of the activities the tree was mined from
    pub activity_frequencies: HashMap<Activity, u64>,
}

impl DiscoveredModel {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// Seam between the shared recursion and the variant-specific way of finding
/// a cut. Each miner variant decides which graph(s) to try the cuts on and
/// whether to accept what it finds.
pub(crate) trait CutStrategy {
    fn find_cut(
        &mut self,
        log: &ActivityLog,
        cache: &mut DiscoveryCache,
    ) -> Option<(Operator, Vec<ActivityLog>)>;
}

/// Try the four cuts on `dfg` in priority order and split `log` accordingly.
pub(crate) fn cut_on_dfg(
    dfg: &DirectlyFollowsGraph,
    log: &ActivityLog,
) -> Option<(Operator, Partitions, Vec<ActivityLog>)> {
    if let Some(partitions) = exclusive_cut(dfg) {
        let sub_logs = exclusive_split(log, &partitions);
        return Some((Operator::Exclusive, partitions, sub_logs));
    }
    if let Some(partitions) = sequence_cut(dfg) {
        let sub_logs = sequence_split(log, &partitions);
        return Some((Operator::Sequence, partitions, sub_logs));
    }
    if let Some(partitions) = parallel_cut(dfg) {
        let sub_logs = parallel_split(log, &partitions);
        return Some((Operator::Parallel, partitions, sub_logs));
    }
    if let Some(partitions) = loop_cut(dfg) {
        let sub_logs = loop_split(log, &partitions);
        return Some((Operator::Loop, partitions, sub_logs));
    }
    None
}

/// The shared recursion of the miner family: base cases, then the variant's
/// cut search, then the fallthroughs.
pub(crate) fn mine_tree<S: CutStrategy>(
    strategy: &mut S,
    log: &ActivityLog,
    cache: &mut DiscoveryCache,
    depth: usize,
    max_depth: usize,
) -> ProcessTree {
    if depth >= max_depth {
        warn!(depth, "recursion depth ceiling reached, falling back to flower model");
        return flower_model(&log.alphabet());
    }
    if let Some(tree) = base_case(log) {
        return tree;
    }
    // A cut can only describe the non-empty traces; the empty trace is
    // handled by the tau fallthrough below.
    if !log.contains_empty_trace() {
        if let Some((operator, sub_logs)) = strategy.find_cut(log, cache) {
            debug!(operator = %operator, parts = sub_logs.len(), depth, "cut found");
            let children = sub_logs
                .iter()
                .map(|sub_log| mine_tree(strategy, sub_log, cache, depth + 1, max_depth))
                .collect();
            return operator.with_children(children);
        }
    }
    fallthrough(strategy, log, cache, depth, max_depth)
}

/// The trivial logs a recursion step can answer directly: no traces, only the
/// empty trace, or a single one-activity trace.
fn base_case(log: &ActivityLog) -> Option<ProcessTree> {
    if log.is_empty() {
        return Some(ProcessTree::Tau);
    }
    if log.len() == 1 {
        let (trace, _) = log.iter().next()?;
        match trace.as_slice() {
            [] => return Some(ProcessTree::Tau),
            [activity] => return Some(ProcessTree::activity(activity.clone())),
            _ => {}
        }
    }
    None
}

fn fallthrough<S: CutStrategy>(
    strategy: &mut S,
    log: &ActivityLog,
    cache: &mut DiscoveryCache,
    depth: usize,
    max_depth: usize,
) -> ProcessTree {
    // An empty trace among others means the rest of the log is skippable.
    if log.contains_empty_trace() {
        debug!(depth, "splitting off tau branch for the empty trace");
        let rest = log.without_empty_trace();
        let mined = mine_tree(strategy, &rest, cache, depth + 1, max_depth);
        return ProcessTree::Exclusive(vec![ProcessTree::Tau, mined]);
    }

    let alphabet = log.alphabet();
    if alphabet.len() == 1 {
        let activity = alphabet
            .into_iter()
            .next()
            .map(ProcessTree::Activity)
            .unwrap_or(ProcessTree::Tau);
        let repeats = log.iter().any(|(trace, _)| trace.len() > 1);
        if repeats {
            return ProcessTree::Loop(vec![activity, ProcessTree::Tau]);
        }
        return activity;
    }

    debug!(depth, activities = alphabet.len(), "no cut found, flower model");
    flower_model(&alphabet)
}

/// The model of last resort: a loop with a tau body that allows the
/// activities in any order and number.
pub(crate) fn flower_model(alphabet: &HashSet<Activity>) -> ProcessTree {
    if alphabet.is_empty() {
        return ProcessTree::Tau;
    }
    let mut children = vec![ProcessTree::Tau];
    children.extend(
        alphabet
            .iter()
            .sorted()
            .map(|activity| ProcessTree::activity(activity.clone())),
    );
    ProcessTree::Loop(children)
}

/// Classic cut search: all four cuts, in priority order, on the unfiltered
/// directly-follows graph.
#[derive(Debug, Default)]
struct ClassicCuts;

impl CutStrategy for ClassicCuts {
    fn find_cut(
        &mut self,
        log: &ActivityLog,
        cache: &mut DiscoveryCache,
    ) -> Option<(Operator, Vec<ActivityLog>)> {
        let dfg = cache.dfg_for(log);
        cut_on_dfg(&dfg, log).map(|(operator, _, sub_logs)| (operator, sub_logs))
    }
}

///
/// The classic recursive miner: exact cut detection on the unfiltered
/// directly-follows graph, with a flower-model fallthrough.
///
/// The miner owns a [`DiscoveryCache`], so repeated `mine` calls (and the
/// recursive descents within one call) share their intermediate graphs.
///
#[derive(Debug)]
pub struct InductiveMiner {
    config: MinerConfig,
    cache: DiscoveryCache,
}

impl InductiveMiner {
    /// Create a miner, validating the configuration.
    pub fn new(config: MinerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cache: DiscoveryCache::new(),
        })
    }

    /// Create a miner with the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: MinerConfig::default(),
            cache: DiscoveryCache::new(),
        }
    }

    /// The configuration this miner runs with.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Discover a process tree from `log`.
    ///
    /// The log is first filtered by the relative activity/trace thresholds of
    /// the configuration, then mined recursively. Mining is deterministic:
    /// the same log and configuration always yield the same tree.
    pub fn mine(&mut self, log: &ActivityLog) -> DiscoveredModel {
        info!(traces = log.len(), total = log.total_frequency(), "mining process tree");
        let filtered = self.cache.filtered_log_for(
            log,
            self.config.activity_threshold,
            self.config.traces_threshold,
        );
        let mut strategy = ClassicCuts;
        let tree = mine_tree(
            &mut strategy,
            &filtered,
            &mut self.cache,
            0,
            self.config.max_recursion_depth,
        );
        debug!(tree = %tree, "mining finished");
        DiscoveredModel {
            activity_frequencies: filtered.activity_frequencies(),
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::activity_log::tests::log_of;

    fn mine(entries: &[(&[&str], u64)]) -> ProcessTree {
        let config = MinerConfig {
            activity_threshold: 0.0,
            traces_threshold: 0.0,
            ..MinerConfig::default()
        };
        InductiveMiner::new(config).unwrap().mine(&log_of(entries)).tree
    }

    fn act(label: &str) -> ProcessTree {
        ProcessTree::activity(label)
    }

    #[test]
    fn config_validation() {
        assert!(MinerConfig::default().validate().is_ok());
        let bad = MinerConfig {
            activity_threshold: 1.5,
            ..MinerConfig::default()
        };
        assert_eq!(
            bad.validate(),
            Err(ConfigError::ThresholdOutOfRange("activity_threshold", 1.5))
        );
        let zero_depth = MinerConfig {
            max_recursion_depth: 0,
            ..MinerConfig::default()
        };
        assert_eq!(zero_depth.validate(), Err(ConfigError::ZeroRecursionDepth));
    }

    #[test]
    fn empty_log_mines_to_tau() {
        assert_eq!(mine(&[]), ProcessTree::Tau);
        assert_eq!(mine(&[(&[], 3)]), ProcessTree::Tau);
    }

    #[test]
    fn single_activity_log_mines_to_leaf() {
        assert_eq!(mine(&[(&["A"], 5)]), act("A"));
    }

    #[test]
    fn strict_sequence() {
        let tree = mine(&[(&["A", "B", "C"], 1)]);
        assert_eq!(tree, ProcessTree::Sequence(vec![act("A"), act("B"), act("C")]));
    }

    #[test]
    fn sequence_with_exclusive_tail() {
        let tree = mine(&[(&["A", "B"], 1), (&["A", "C"], 1)]);
        let expected = ProcessTree::Sequence(vec![
            act("A"),
            ProcessTree::Exclusive(vec![act("B"), act("C")]),
        ]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn sequence_with_parallel_tail() {
        let tree = mine(&[(&["A", "B", "C"], 1), (&["A", "C", "B"], 1)]);
        let expected = ProcessTree::Sequence(vec![
            act("A"),
            ProcessTree::Parallel(vec![act("B"), act("C")]),
        ]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn optional_repetition_mines_to_loop() {
        let tree = mine(&[(&["A"], 1), (&["A", "B", "A"], 2)]);
        let expected = ProcessTree::Loop(vec![act("A"), act("B")]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn single_repeating_activity_mines_to_self_loop() {
        let tree = mine(&[(&["A"], 1), (&["A", "A", "A"], 5), (&["A", "A"], 1)]);
        let expected = ProcessTree::Loop(vec![act("A"), ProcessTree::Tau]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn empty_trace_becomes_tau_branch() {
        let tree = mine(&[(&[], 1), (&["A", "B"], 1)]);
        let expected = ProcessTree::Exclusive(vec![
            ProcessTree::Tau,
            ProcessTree::Sequence(vec![act("A"), act("B")]),
        ]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn unstructured_log_mines_to_flower_model() {
        let tree = mine(&[(&["A", "B", "C"], 1), (&["B", "C", "A"], 1)]);
        let expected = ProcessTree::Loop(vec![ProcessTree::Tau, act("A"), act("B"), act("C")]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn nested_operators_are_discovered() {
        let tree = mine(&[
            (&["1", "2", "3", "4"], 2),
            (&["1", "3", "2", "4"], 5),
            (&["1", "2", "3", "5", "6", "2", "3", "4"], 3),
            (&["1", "3", "2", "5", "6", "3", "2", "4"], 1),
        ]);
        let expected = ProcessTree::Sequence(vec![
            act("1"),
            ProcessTree::Loop(vec![
                ProcessTree::Parallel(vec![act("2"), act("3")]),
                ProcessTree::Sequence(vec![act("5"), act("6")]),
            ]),
            act("4"),
        ]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn skippable_middle_step_gets_tau_branch() {
        let tree = mine(&[(&["A", "B", "C"], 1), (&["A", "C"], 1)]);
        let expected = ProcessTree::Sequence(vec![
            act("A"),
            ProcessTree::Exclusive(vec![ProcessTree::Tau, act("B")]),
            act("C"),
        ]);
        assert!(tree.equivalent(&expected), "got {}", tree);
    }

    #[test]
    fn mining_is_deterministic() {
        let log = log_of(&[
            (&["A", "B", "C"], 1),
            (&["A", "C", "B"], 1),
            (&["A", "D"], 2),
        ]);
        let mut miner = InductiveMiner::with_defaults();
        let first = miner.mine(&log);
        let second = miner.mine(&log);
        assert_eq!(first, second);
        // A fresh miner (empty cache) must agree as well.
        let fresh = InductiveMiner::with_defaults().mine(&log);
        assert_eq!(first, fresh);
    }

    #[test]
    fn trace_threshold_drops_rare_traces() {
        let config = MinerConfig {
            traces_threshold: 0.5,
            ..MinerConfig::default()
        };
        let mut miner = InductiveMiner::new(config).unwrap();
        let model = miner.mine(&log_of(&[(&["A", "B"], 10), (&["C"], 1)]));
        let expected = ProcessTree::Sequence(vec![act("A"), act("B")]);
        assert!(model.tree.equivalent(&expected), "got {}", model.tree);
        assert!(!model.activity_frequencies.contains_key("C"));
    }

    #[test]
    fn trace_filtering_does_not_loosen_the_activity_cutoff() {
        let config = MinerConfig {
            activity_threshold: 0.8,
            traces_threshold: 0.5,
            ..MinerConfig::default()
        };
        let mut miner = InductiveMiner::new(config).unwrap();
        let long_a = vec!["A"; 20];
        let log = log_of(&[(long_a.as_slice(), 1), (&["B", "C"], 10), (&["D"], 8)]);
        // A's 20 appearances set the activity cutoff even though its own trace
        // is dropped by the trace threshold, so B, C and D fall below it too.
        let model = miner.mine(&log);
        assert_eq!(model.tree, ProcessTree::Tau);
    }

    #[test]
    fn depth_ceiling_forces_flower_model() {
        let config = MinerConfig {
            traces_threshold: 0.0,
            max_recursion_depth: 1,
            ..MinerConfig::default()
        };
        let mut miner = InductiveMiner::new(config).unwrap();
        let model = miner.mine(&log_of(&[(&["A", "B"], 1)]));
        // The first level still cuts; the children hit the ceiling.
        let expected = ProcessTree::Sequence(vec![
            ProcessTree::Loop(vec![ProcessTree::Tau, act("A")]),
            ProcessTree::Loop(vec![ProcessTree::Tau, act("B")]),
        ]);
        assert!(model.tree.equivalent(&expected), "got {}", model.tree);
    }

    #[test]
    fn discovered_model_reports_activity_frequencies() {
        let mut miner = InductiveMiner::with_defaults();
        let model = miner.mine(&log_of(&[(&["A", "B", "A"], 2), (&["A"], 1)]));
        assert_eq!(model.activity_frequencies["A"], 5);
        assert_eq!(model.activity_frequencies["B"], 2);
    }
}
