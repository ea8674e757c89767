use std::collections::{HashMap, HashSet, VecDeque};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::event_log::activity_log::{Activity, ActivityLog};

///
/// A directly-follows graph over the activities of an [`ActivityLog`].
///
/// Nodes are all activities occurring in the log (activities of singleton
/// traces included); a weighted edge `(a, b)` states that `a` directly
/// precedes `b` in at least one trace, weighted by accumulated trace
/// frequency. Start and end nodes are the first/last activities of the
/// non-empty traces.
///
/// Invariants: every edge endpoint is a node; start/end nodes are subsets of
/// the node set. Queries about unknown activities return empty results rather
/// than failing, which keeps cut detection total.
///
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectlyFollowsGraph {
    /// Activities
    pub nodes: HashSet<Activity>,
    /// Weighted directly-follows relations
    #[serde_as(as = "Vec<(_, _)>")]
    pub edges: HashMap<(Activity, Activity), u64>,
    /// First activities of non-empty traces
    pub start_nodes: HashSet<Activity>,
    /// Last activities of non-empty traces
    pub end_nodes: HashSet<Activity>,
}

impl DirectlyFollowsGraph {
    /// Create a new, empty [`DirectlyFollowsGraph`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the directly-follows graph of an [`ActivityLog`].
    ///
    /// Traces are processed in parallel and the partial graphs merged.
    pub fn from_log(log: &ActivityLog) -> Self {
        let entries: Vec<(&Vec<Activity>, u64)> = log.iter().collect();
        entries
            .par_iter()
            .map(|(trace, frequency)| {
                let mut partial = Self::new();
                for activity in trace.iter() {
                    partial.add_node(activity.clone());
                }
                if let (Some(first), Some(last)) = (trace.first(), trace.last()) {
                    partial.start_nodes.insert(first.clone());
                    partial.end_nodes.insert(last.clone());
                }
                for pair in trace.windows(2) {
                    partial.add_edge(pair[0].clone(), pair[1].clone(), *frequency);
                }
                partial
            })
            .reduce(Self::new, |mut acc, partial| {
                acc.merge(partial);
                acc
            })
    }

    /// Merge another graph into this one, accumulating edge weights.
    pub fn merge(&mut self, other: Self) {
        self.nodes.extend(other.nodes);
        self.start_nodes.extend(other.start_nodes);
        self.end_nodes.extend(other.end_nodes);
        for (edge, weight) in other.edges {
            *self.edges.entry(edge).or_insert(0) += weight;
        }
    }

    /// Add an activity as a node.
    pub fn add_node(&mut self, activity: Activity) {
        self.nodes.insert(activity);
    }

    /// Add a weighted directly-follows edge, registering both endpoints as
    /// nodes and accumulating the weight if the edge already exists.
    pub fn add_edge(&mut self, source: Activity, target: Activity, weight: u64) {
        self.nodes.insert(source.clone());
        self.nodes.insert(target.clone());
        *self.edges.entry((source, target)).or_insert(0) += weight;
    }

    /// `true` if the activity is a node of the graph.
    pub fn contains_node(&self, activity: &str) -> bool {
        self.nodes.contains(activity)
    }

    /// `true` if a directly-follows edge from `source` to `target` exists.
    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edge_weight(source, target) > 0
    }

    /// Weight of the edge from `source` to `target` (0 if absent).
    pub fn edge_weight(&self, source: &str, target: &str) -> u64 {
        self.edges
            .get(&(source.to_string(), target.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Direct successors of an activity (empty for unknown activities).
    pub fn successors(&self, activity: &str) -> HashSet<&str> {
        self.edges
            .keys()
            .filter(|(source, _)| source == activity)
            .map(|(_, target)| target.as_str())
            .collect()
    }

    /// Direct predecessors of an activity (empty for unknown activities).
    pub fn predecessors(&self, activity: &str) -> HashSet<&str> {
        self.edges
            .keys()
            .filter(|(_, target)| target == activity)
            .map(|(source, _)| source.as_str())
            .collect()
    }

    /// Forward adjacency of the whole graph, built in one pass.
    pub fn successor_map(&self) -> HashMap<&str, HashSet<&str>> {
        let mut map: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (source, target) in self.edges.keys() {
            map.entry(source.as_str())
                .or_default()
                .insert(target.as_str());
        }
        map
    }

    /// All activities reachable from `source` via a path of one or more edges.
    ///
    /// `source` itself is only included if it lies on a cycle.
    pub fn reachable_from(&self, source: &str) -> HashSet<&str> {
        let successors = self.successor_map();
        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = successors
            .get(source)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        while let Some(current) = queue.pop_front() {
            if reached.insert(current) {
                if let Some(next) = successors.get(current) {
                    queue.extend(next.iter().copied());
                }
            }
        }
        reached
    }

    /// `true` if `target` is reachable from `source` via one or more edges
    /// (forward BFS). Unknown activities are never reachable.
    pub fn is_reachable(&self, source: &str, target: &str) -> bool {
        self.reachable_from(source).contains(target)
    }

    /// Connected components of the graph, ignoring edge direction.
    ///
    /// Components are returned sorted by their smallest member, so the result
    /// is deterministic across runs.
    pub fn connected_components(&self) -> Vec<HashSet<Activity>> {
        let mut undirected: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (source, target) in self.edges.keys() {
            undirected
                .entry(source.as_str())
                .or_default()
                .insert(target.as_str());
            undirected
                .entry(target.as_str())
                .or_default()
                .insert(source.as_str());
        }

        let mut seeds: Vec<&str> = self.nodes.iter().map(|n| n.as_str()).collect();
        seeds.sort_unstable();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut components: Vec<HashSet<Activity>> = Vec::new();
        for seed in seeds {
            if visited.contains(seed) {
                continue;
            }
            let mut component: HashSet<Activity> = HashSet::new();
            let mut queue: VecDeque<&str> = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                if !visited.insert(current) {
                    continue;
                }
                component.insert(current.to_string());
                if let Some(neighbors) = undirected.get(current) {
                    queue.extend(neighbors.iter().copied());
                }
            }
            components.push(component);
        }
        components
    }

    /// Largest edge weight in the graph, if any edge exists.
    pub fn max_edge_weight(&self) -> Option<u64> {
        self.edges.values().copied().max()
    }

    /// Copy of the graph keeping only edges with weight at least `min_weight`.
    ///
    /// Nodes and start/end sets are preserved. If the cutoff would remove
    /// every edge of a graph that has edges, the single strongest edge is kept
    /// instead (ties broken by edge label), so cut detection still sees a
    /// connected structure.
    pub fn filtered_by_edge_weight(&self, min_weight: u64) -> Self {
        let mut filtered = Self {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .filter(|(_, weight)| **weight >= min_weight)
                .map(|(edge, weight)| (edge.clone(), *weight))
                .collect(),
            start_nodes: self.start_nodes.clone(),
            end_nodes: self.end_nodes.clone(),
        };
        if filtered.edges.is_empty() {
            if let Some((edge, weight)) = self.edges.iter().max_by(|(edge_a, weight_a), (edge_b, weight_b)| {
                weight_a.cmp(weight_b).then_with(|| edge_b.cmp(edge_a))
            }) {
                filtered.edges.insert(edge.clone(), *weight);
            }
        }
        filtered
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
