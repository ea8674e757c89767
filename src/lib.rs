#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![doc = include_str!("../README.md")]

///
/// Event logs projected on activity labels
///
pub mod event_log {
    /// [`ActivityLog`] struct: a multiset of traces
    pub mod activity_log;
    /// Relative-frequency filtering of activities and traces
    pub mod filters;

    pub use activity_log::ActivityLog;
}

///
/// Directly-follows graphs
///
pub mod dfg {
    /// [`DirectlyFollowsGraph`] struct
    pub mod dfg_struct;

    #[doc(inline)]
    pub use crate::dfg::dfg_struct::DirectlyFollowsGraph;
}

///
/// Process trees
///
pub mod process_tree {
    /// [`ProcessTree`] struct and its [`Operator`](process_tree_struct::Operator)s
    pub mod process_tree_struct;

    #[doc(inline)]
    pub use crate::process_tree::process_tree_struct::ProcessTree;
}

///
/// Process discovery algorithms
///
pub mod discovery {
    ///
    /// The recursive Inductive Miner family
    ///
    pub mod inductive {
        /// Approximate miner variant (binning, simplification, cut validation)
        pub mod approximate;
        /// Memoization of discovery intermediates
        pub mod cache;
        /// Cut detection on a directly-follows graph
        pub mod cuts;
        /// The recursive mining engine and the classic miner
        pub mod miner;
        /// Noise-tolerant miner variant
        pub mod noise;
        /// Cut-specific log splitting
        pub mod splits;
    }
}

#[doc(inline)]
pub use event_log::activity_log::{Activity, ActivityLog, LogError, LogHash};

#[doc(inline)]
pub use dfg::dfg_struct::DirectlyFollowsGraph;

#[doc(inline)]
pub use process_tree::process_tree_struct::{Operator, ProcessTree};

#[doc(inline)]
pub use discovery::inductive::miner::{ConfigError, DiscoveredModel, InductiveMiner, MinerConfig};

#[doc(inline)]
pub use discovery::inductive::noise::{InfrequentMiner, NoiseConfig};

#[doc(inline)]
pub use discovery::inductive::approximate::{ApproximateMiner, ApproximationConfig};

#[doc(inline)]
pub use discovery::inductive::cache::DiscoveryCache;
