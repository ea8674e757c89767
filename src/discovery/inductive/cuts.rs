use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;
use petgraph::unionfind::UnionFind;

use crate::dfg::dfg_struct::DirectlyFollowsGraph;
use crate::event_log::activity_log::Activity;

/// Ordered list of disjoint, non-empty activity subsets produced by a cut.
pub type Partitions = Vec<HashSet<Activity>>;

/// Exclusive-choice cut: the undirected connected components of the graph.
///
/// A cut exists iff the graph splits into at least two components.
pub fn exclusive_cut(dfg: &DirectlyFollowsGraph) -> Option<Partitions> {
    let components = dfg.connected_components();
    if components.len() >= 2 {
        Some(components)
    } else {
        None
    }
}

/// Sequence cut: grow ordered partitions along the flow of the graph.
///
/// Nodes are visited in BFS order from the start nodes. A node joins the
/// partition of a node it is mutually reachable with (a strongly connected
/// group must stay together; if several partitions qualify, the spanned range
/// is merged). A node that is mutually *unreachable* with some member of the
/// current partition joins it (unordered alternatives share a slot). Any
/// other node opens the next partition.
pub fn sequence_cut(dfg: &DirectlyFollowsGraph) -> Option<Partitions> {
    if dfg.nodes.len() < 2 {
        return None;
    }
    let reach = reachability_closure(dfg);
    let mutually_reachable =
        |a: &str, b: &str| reach[a].contains(b) && reach[b].contains(a);
    let mutually_unreachable =
        |a: &str, b: &str| !reach[a].contains(b) && !reach[b].contains(a);

    let mut partitions: Vec<HashSet<&str>> = Vec::new();
    for node in traversal_order(dfg) {
        let matching: Vec<usize> = partitions
            .iter()
            .enumerate()
            .filter(|(_, partition)| {
                partition.iter().any(|member| mutually_reachable(node, member))
            })
            .map(|(i, _)| i)
            .collect();
        if let (Some(&first), Some(&last)) = (matching.first(), matching.last()) {
            // Keep strongly connected groups in one partition; everything
            // between the matching partitions is ordered neither before nor
            // after them, so the whole range collapses.
            let mut merged: HashSet<&str> = partitions.drain(first..=last).flatten().collect();
            merged.insert(node);
            partitions.insert(first, merged);
        } else if partitions.last().is_some_and(|partition| {
            partition.iter().any(|member| mutually_unreachable(node, member))
        }) {
            if let Some(partition) = partitions.last_mut() {
                partition.insert(node);
            }
        } else {
            partitions.push(HashSet::from([node]));
        }
    }

    if partitions.len() >= 2 {
        Some(to_owned_partitions(partitions))
    } else {
        None
    }
}

/// Parallel cut: merge every pair of nodes that is not fully interleaved
/// (missing a directly-follows edge in either direction); the surviving
/// groups are candidate branches.
///
/// A valid branch must reach the log boundary on its own: it has to contain
/// at least one start and one end node. Branches failing this are merged into
/// the first branch that satisfies it. A cut exists iff at least two branches
/// remain.
pub fn parallel_cut(dfg: &DirectlyFollowsGraph) -> Option<Partitions> {
    let nodes: Vec<&str> = dfg.nodes.iter().map(|n| n.as_str()).sorted().collect();
    if nodes.len() < 2 {
        return None;
    }

    let mut union_find: UnionFind<usize> = UnionFind::new(nodes.len());
    for (i, j) in (0..nodes.len()).tuple_combinations() {
        let interleaved =
            dfg.contains_edge(nodes[i], nodes[j]) && dfg.contains_edge(nodes[j], nodes[i]);
        if !interleaved {
            union_find.union(i, j);
        }
    }

    let mut groups: HashMap<usize, HashSet<&str>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        groups.entry(union_find.find(i)).or_default().insert(*node);
    }
    if groups.len() < 2 {
        return None;
    }

    // Sorting by smallest member keeps the result deterministic.
    let candidates: Vec<HashSet<&str>> = groups
        .into_values()
        .sorted_by_key(|group| group.iter().min().copied().map(str::to_string))
        .collect();

    let has_boundary = |group: &HashSet<&str>| {
        group.iter().any(|n| dfg.start_nodes.contains(*n))
            && group.iter().any(|n| dfg.end_nodes.contains(*n))
    };
    let (mut valid, invalid): (Vec<HashSet<&str>>, Vec<HashSet<&str>>) =
        candidates.into_iter().partition(has_boundary);
    if valid.is_empty() {
        return None;
    }
    for group in invalid {
        valid[0].extend(group);
    }
    if valid.len() >= 2 {
        Some(to_owned_partitions(valid))
    } else {
        None
    }
}

/// Loop cut: separate a body containing all start and end nodes from redo
/// segments that can only be entered after the body completed.
///
/// The remaining nodes split into undirected components; such a segment is a
/// valid redo part iff every edge entering it originates at a log end-node
/// and every edge leaving it targets a log start-node. Invalid segments merge
/// back into the body (in smallest-member order; validity only depends on the
/// log-level start/end sets, so one pass suffices). The result is the body
/// followed by the redo segments.
pub fn loop_cut(dfg: &DirectlyFollowsGraph) -> Option<Partitions> {
    let mut body: HashSet<&str> = dfg
        .start_nodes
        .iter()
        .chain(dfg.end_nodes.iter())
        .map(|n| n.as_str())
        .collect();
    if body.is_empty() || body.len() == dfg.nodes.len() {
        return None;
    }

    let residual: HashSet<&str> = dfg
        .nodes
        .iter()
        .map(|n| n.as_str())
        .filter(|n| !body.contains(n))
        .collect();

    let mut redo_segments: Vec<HashSet<&str>> = Vec::new();
    for segment in undirected_components(dfg, &residual) {
        let valid = dfg.edges.keys().all(|(source, target)| {
            let enters = !segment.contains(source.as_str()) && segment.contains(target.as_str());
            let leaves = segment.contains(source.as_str()) && !segment.contains(target.as_str());
            (!enters || dfg.end_nodes.contains(source))
                && (!leaves || dfg.start_nodes.contains(target))
        });
        if valid {
            redo_segments.push(segment);
        } else {
            body.extend(segment);
        }
    }

    if redo_segments.is_empty() {
        return None;
    }
    let mut partitions = vec![body];
    partitions.extend(redo_segments);
    Some(to_owned_partitions(partitions))
}

/// Transitive reachability (via one or more edges) for every node.
fn reachability_closure(dfg: &DirectlyFollowsGraph) -> HashMap<&str, HashSet<&str>> {
    dfg.nodes
        .iter()
        .map(|node| (node.as_str(), dfg.reachable_from(node)))
        .collect()
}

/// Deterministic node visiting order for the sequence cut: BFS from the
/// sorted start nodes with sorted frontier expansion, unreached nodes
/// appended sorted.
fn traversal_order(dfg: &DirectlyFollowsGraph) -> Vec<&str> {
    let successors = dfg.successor_map();
    let mut order: Vec<&str> = Vec::with_capacity(dfg.nodes.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = dfg
        .start_nodes
        .iter()
        .map(|n| n.as_str())
        .sorted()
        .collect();
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        order.push(current);
        if let Some(next) = successors.get(current) {
            queue.extend(next.iter().copied().sorted());
        }
    }
    order.extend(
        dfg.nodes
            .iter()
            .map(|n| n.as_str())
            .filter(|n| !visited.contains(n))
            .sorted(),
    );
    order
}

/// Undirected components of the subgraph induced by `nodes`, sorted by their
/// smallest member.
fn undirected_components<'a>(
    dfg: &'a DirectlyFollowsGraph,
    nodes: &HashSet<&'a str>,
) -> Vec<HashSet<&'a str>> {
    let mut adjacency: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (source, target) in dfg.edges.keys() {
        if nodes.contains(source.as_str()) && nodes.contains(target.as_str()) {
            adjacency
                .entry(source.as_str())
                .or_default()
                .insert(target.as_str());
            adjacency
                .entry(target.as_str())
                .or_default()
                .insert(source.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components: Vec<HashSet<&str>> = Vec::new();
    for seed in nodes.iter().sorted() {
        if visited.contains(seed) {
            continue;
        }
        let mut component: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([*seed]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            component.insert(current);
            if let Some(neighbors) = adjacency.get(current) {
                queue.extend(neighbors.iter().copied());
            }
        }
        components.push(component);
    }
    components
}

fn to_owned_partitions(partitions: Vec<HashSet<&str>>) -> Partitions {
    partitions
        .into_iter()
        .map(|partition| partition.into_iter().map(str::to_string).collect())
        .collect()
}
