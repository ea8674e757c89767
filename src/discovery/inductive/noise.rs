use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::event_log::activity_log::ActivityLog;
use crate::process_tree::process_tree_struct::Operator;

use super::cache::DiscoveryCache;
use super::miner::{
    check_threshold, cut_on_dfg, mine_tree, ConfigError, CutStrategy, DiscoveredModel, MinerConfig,
};

///
/// Configuration of the noise-filtering miner variant
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NoiseConfig {
    /// Directly-follows edges weaker than this fraction of the strongest edge
    /// are ignored during cut detection
    pub noise_threshold: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 0.2,
        }
    }
}

impl NoiseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("noise_threshold", self.noise_threshold)
    }
}

/// Cut search on the noise-filtered graph first, retrying on the full graph
/// when the filtered one yields nothing.
///
/// Splitting always happens on the *unfiltered* log: filtering only shapes
/// which cut is found, never which events survive.
#[derive(Debug)]
struct NoiseFilteredCuts {
    noise_threshold: f64,
}

impl CutStrategy for NoiseFilteredCuts {
    fn find_cut(
        &mut self,
        log: &ActivityLog,
        cache: &mut DiscoveryCache,
    ) -> Option<(Operator, Vec<ActivityLog>)> {
        let filtered = cache.filtered_dfg_for(log, self.noise_threshold);
        if let Some((operator, _, sub_logs)) = cut_on_dfg(&filtered, log) {
            return Some((operator, sub_logs));
        }
        let full = cache.dfg_for(log);
        if *filtered == *full {
            // Filtering removed nothing, so the retry cannot find more.
            return None;
        }
        debug!("no cut on the filtered graph, retrying unfiltered");
        cut_on_dfg(&full, log).map(|(operator, _, sub_logs)| (operator, sub_logs))
    }
}

///
/// The noise-tolerant miner variant: cut detection runs on a directly-follows
/// graph with infrequent edges removed, so rare deviations cannot block a cut
/// the frequent behavior supports.
///
/// With a `noise_threshold` of 0 it behaves exactly like [`super::miner::InductiveMiner`].
///
#[derive(Debug)]
pub struct InfrequentMiner {
    config: MinerConfig,
    noise: NoiseConfig,
    cache: DiscoveryCache,
}

impl InfrequentMiner {
    /// Create a miner, validating both configurations.
    pub fn new(config: MinerConfig, noise: NoiseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        noise.validate()?;
        Ok(Self {
            config,
            noise,
            cache: DiscoveryCache::new(),
        })
    }

    /// Create a miner with the default configurations.
    pub fn with_defaults() -> Self {
        Self {
            config: MinerConfig::default(),
            noise: NoiseConfig::default(),
            cache: DiscoveryCache::new(),
        }
    }

    /// Discover a process tree from `log`, ignoring infrequent
    /// directly-follows edges during cut detection.
    pub fn mine(&mut self, log: &ActivityLog) -> DiscoveredModel {
        info!(
            traces = log.len(),
            noise_threshold = self.noise.noise_threshold,
            "mining process tree with noise filtering"
        );
        let filtered = self.cache.filtered_log_for(
            log,
            self.config.activity_threshold,
            self.config.traces_threshold,
        );
        let mut strategy = NoiseFilteredCuts {
            noise_threshold: self.noise.noise_threshold,
        };
        let tree = mine_tree(
            &mut strategy,
            &filtered,
            &mut self.cache,
            0,
            self.config.max_recursion_depth,
        );
        DiscoveredModel {
            activity_frequencies: filtered.activity_frequencies(),
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::inductive::miner::InductiveMiner;
    use crate::event_log::activity_log::tests::log_of;
    use crate::process_tree::process_tree_struct::ProcessTree;

    fn act(label: &str) -> ProcessTree {
        ProcessTree::activity(label)
    }

    #[test]
    fn zero_noise_threshold_matches_classic_miner() {
        let log = log_of(&[
            (&["A", "B", "C"], 4),
            (&["A", "C", "B"], 3),
            (&["A", "D"], 2),
            (&[], 1),
        ]);
        let config = MinerConfig {
            traces_threshold: 0.0,
            ..MinerConfig::default()
        };
        let classic = InductiveMiner::new(config).unwrap().mine(&log);
        let infrequent = InfrequentMiner::new(
            config,
            NoiseConfig {
                noise_threshold: 0.0,
            },
        )
        .unwrap()
        .mine(&log);
        assert_eq!(classic, infrequent);
    }

    #[test]
    fn noise_filtering_recovers_sequence_from_rare_deviation() {
        // One reversed trace blocks the sequence cut on the full graph; the
        // filtered graph drops the weak back edge and cuts cleanly.
        let log = log_of(&[(&["A", "B", "C"], 20), (&["B", "A", "C"], 1)]);
        let mut miner = InfrequentMiner::new(
            MinerConfig {
                traces_threshold: 0.0,
                ..MinerConfig::default()
            },
            NoiseConfig::default(),
        )
        .unwrap();
        let model = miner.mine(&log);
        let expected = ProcessTree::Sequence(vec![act("A"), act("B"), act("C")]);
        assert!(model.tree.equivalent(&expected), "got {}", model.tree);
    }

    #[test]
    fn rare_disconnected_branch_degenerates_to_skips() {
        // The weak C-D edge falls below the cutoff; C and D become isolated
        // components whose sub-logs end up empty, so their branches are taus.
        let log = log_of(&[(&["A", "B"], 10), (&["C", "D"], 1)]);
        let mut miner = InfrequentMiner::new(
            MinerConfig {
                traces_threshold: 0.0,
                ..MinerConfig::default()
            },
            NoiseConfig {
                noise_threshold: 0.5,
            },
        )
        .unwrap();
        let model = miner.mine(&log);
        let expected = ProcessTree::Exclusive(vec![
            ProcessTree::Sequence(vec![act("A"), act("B")]),
            ProcessTree::Tau,
            ProcessTree::Tau,
        ]);
        assert!(model.tree.equivalent(&expected), "got {}", model.tree);
    }

    #[test]
    fn invalid_noise_threshold_is_rejected() {
        let result = InfrequentMiner::new(
            MinerConfig::default(),
            NoiseConfig {
                noise_threshold: -0.1,
            },
        );
        assert_eq!(
            result.err(),
            Some(ConfigError::ThresholdOutOfRange("noise_threshold", -0.1))
        );
    }
}
