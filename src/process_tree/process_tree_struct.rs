use serde::{Deserialize, Serialize};

use crate::event_log::activity_log::Activity;

///
/// Operator of an inner [`ProcessTree`] node
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Sequential composition of the children, in order
    Sequence,
    /// Exclusive choice between the children
    Exclusive,
    /// Interleaved (parallel) execution of the children
    Parallel,
    /// Loop: first child is the body, the remaining children are redo parts
    Loop,
}

impl Operator {
    /// Wrap a child list under this operator.
    pub fn with_children(self, children: Vec<ProcessTree>) -> ProcessTree {
        match self {
            Operator::Sequence => ProcessTree::Sequence(children),
            Operator::Exclusive => ProcessTree::Exclusive(children),
            Operator::Parallel => ProcessTree::Parallel(children),
            Operator::Loop => ProcessTree::Loop(children),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operator::Sequence => "seq",
            Operator::Exclusive => "xor",
            Operator::Parallel => "par",
            Operator::Loop => "loop",
        };
        write!(f, "{}", name)
    }
}

///
/// A process tree: a leaf (activity or silent tau) or an operator node over an
/// ordered list of child trees.
///
/// Invariants: [`ProcessTree::Loop`] nodes have a body child followed by
/// one-or-more redo children (at least two children overall); all other
/// operator nodes have at least one child; leaves have none. Trees are built
/// bottom-up by the miner and immutable once returned.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProcessTree {
    /// Silent activity ("do nothing")
    Tau,
    /// Non-silent activity leaf
    Activity(Activity),
    /// Sequence node
    Sequence(Vec<ProcessTree>),
    /// Exclusive-choice node
    Exclusive(Vec<ProcessTree>),
    /// Parallel node
    Parallel(Vec<ProcessTree>),
    /// Loop node (body first, then redo parts)
    Loop(Vec<ProcessTree>),
}

impl ProcessTree {
    /// Create an activity leaf.
    pub fn activity<S: Into<Activity>>(label: S) -> Self {
        ProcessTree::Activity(label.into())
    }

    /// The operator of this node, or `None` for leaves.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            ProcessTree::Sequence(_) => Some(Operator::Sequence),
            ProcessTree::Exclusive(_) => Some(Operator::Exclusive),
            ProcessTree::Parallel(_) => Some(Operator::Parallel),
            ProcessTree::Loop(_) => Some(Operator::Loop),
            ProcessTree::Tau | ProcessTree::Activity(_) => None,
        }
    }

    /// Children of this node (empty slice for leaves).
    pub fn children(&self) -> &[ProcessTree] {
        match self {
            ProcessTree::Sequence(children)
            | ProcessTree::Exclusive(children)
            | ProcessTree::Parallel(children)
            | ProcessTree::Loop(children) => children,
            ProcessTree::Tau | ProcessTree::Activity(_) => &[],
        }
    }

    /// `true` for tau and activity leaves.
    pub fn is_leaf(&self) -> bool {
        self.operator().is_none()
    }

    /// Check that every loop node has a body plus at least one redo child and
    /// every other operator node has at least one child, recursively.
    pub fn is_valid(&self) -> bool {
        match self {
            ProcessTree::Tau | ProcessTree::Activity(_) => true,
            ProcessTree::Loop(children) => {
                children.len() >= 2 && children.iter().all(ProcessTree::is_valid)
            }
            ProcessTree::Sequence(children)
            | ProcessTree::Exclusive(children)
            | ProcessTree::Parallel(children) => {
                !children.is_empty() && children.iter().all(ProcessTree::is_valid)
            }
        }
    }

    /// All activity labels occurring in the tree, in depth-first order.
    pub fn activities(&self) -> Vec<&str> {
        let mut labels = Vec::new();
        self.collect_activities(&mut labels);
        labels
    }

    fn collect_activities<'a>(&'a self, labels: &mut Vec<&'a str>) {
        match self {
            ProcessTree::Tau => {}
            ProcessTree::Activity(label) => labels.push(label.as_str()),
            _ => {
                for child in self.children() {
                    child.collect_activities(labels);
                }
            }
        }
    }

    /// Structural equivalence that ignores child order under exclusive and
    /// parallel nodes (and among the redo children of a loop), where the
    /// operator semantics impose none.
    pub fn equivalent(&self, other: &ProcessTree) -> bool {
        match (self, other) {
            (ProcessTree::Tau, ProcessTree::Tau) => true,
            (ProcessTree::Activity(a), ProcessTree::Activity(b)) => a == b,
            (ProcessTree::Sequence(a), ProcessTree::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (ProcessTree::Exclusive(a), ProcessTree::Exclusive(b))
            | (ProcessTree::Parallel(a), ProcessTree::Parallel(b)) => unordered_equivalent(a, b),
            (ProcessTree::Loop(a), ProcessTree::Loop(b)) => {
                a.len() == b.len()
                    && !a.is_empty()
                    && a[0].equivalent(&b[0])
                    && unordered_equivalent(&a[1..], &b[1..])
            }
            _ => false,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// Multiset equivalence of two child lists under [`ProcessTree::equivalent`].
fn unordered_equivalent(a: &[ProcessTree], b: &[ProcessTree]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for child in a {
        let matched = b
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used[*i] && child.equivalent(candidate));
        match matched {
            Some((i, _)) => used[i] = true,
            None => return false,
        }
    }
    true
}

impl std::fmt::Display for ProcessTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessTree::Tau => write!(f, "tau"),
            ProcessTree::Activity(label) => write!(f, "'{}'", label),
            _ => {
                // Leaves are handled above, so the operator exists.
                write!(f, "{}(", self.operator().unwrap())?;
                for (i, child) in self.children().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
