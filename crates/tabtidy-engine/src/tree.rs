//! Domain tree construction and bottom-up group assignment.
//!
//! Tabs are inserted into a trie keyed by successive reversed host labels,
//! then the trie is resolved bottom-up: the deepest node whose accumulated
//! ungrouped descendants reach the threshold materializes a named group and
//! consumes them; everything still ungrouped at the root stays anonymous.
//! The traversal works over an index-addressed arena with an explicit stack,
//! so pathological label chains cannot exhaust the call stack.

use std::collections::HashMap;

use crate::run::Tab;

/// Arena index of the trie root.
const ROOT: usize = 0;

/// A computed cluster of tabs sharing a domain prefix.
///
/// `tabs` holds indices into the run's tab slice. An empty name denotes the
/// unknown bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LogicalGroup {
    /// Space-joined label path from the trie root.
    pub(crate) name: String,
    /// Member tabs, as indices into the run's tab slice.
    pub(crate) tabs: Vec<usize>,
}

/// Result of group assignment over one window's tabs.
#[derive(Clone, Debug, Default)]
pub(crate) struct Grouping {
    /// Named groups, each at least threshold-sized.
    pub(crate) groups: Vec<LogicalGroup>,
    /// Parsed tabs below threshold at every level; stay ungrouped.
    pub(crate) leftovers: Vec<usize>,
    /// Tabs with unparseable locators; always ungrouped physically.
    pub(crate) unknown: Vec<usize>,
}

/// One trie node.
struct Node {
    /// Space-joined label path from the root ("" for the root).
    name: String,
    /// Child node per next label.
    children: HashMap<String, usize>,
    /// Tabs terminating exactly at this node.
    tabs: Vec<usize>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            children: HashMap::new(),
            tabs: Vec::new(),
        }
    }
}

/// Partition `tabs` into named groups, leftovers, and the unknown bucket.
pub(crate) fn build_groups(tabs: &[Tab], threshold: usize) -> Grouping {
    let threshold = threshold.max(1);
    let mut nodes = vec![Node::new(String::new())];
    let mut grouping = Grouping::default();

    // Insert every parsed tab at the node named by its full label path.
    for (at, tab) in tabs.iter().enumerate() {
        let Some(key) = &tab.key else {
            grouping.unknown.push(at);
            continue;
        };
        let mut node = ROOT;
        for label in &key.labels {
            node = match nodes[node].children.get(label) {
                Some(child) => *child,
                None => {
                    let name = if node == ROOT {
                        label.clone()
                    } else {
                        format!("{} {}", nodes[node].name, label)
                    };
                    let child = nodes.len();
                    nodes.push(Node::new(name));
                    nodes[node].children.insert(label.clone(), child);
                    child
                }
            };
        }
        nodes[node].tabs.push(at);
    }

    // Parents before children; iterating in reverse yields children first.
    let mut visit = Vec::with_capacity(nodes.len());
    let mut stack = vec![ROOT];
    while let Some(node) = stack.pop() {
        visit.push(node);
        stack.extend(nodes[node].children.values().copied());
    }

    // Bottom-up threshold resolution. `pending` carries each node's
    // still-ungrouped tabs upward until an ancestor groups them.
    let mut pending: Vec<Vec<usize>> = (0..nodes.len()).map(|_| Vec::new()).collect();
    for &node in visit.iter().rev() {
        let kids: Vec<usize> = nodes[node].children.values().copied().collect();
        let mut ungrouped = std::mem::take(&mut nodes[node].tabs);
        for kid in kids {
            ungrouped.append(&mut pending[kid]);
        }
        if node != ROOT && ungrouped.len() >= threshold {
            grouping.groups.push(LogicalGroup {
                name: nodes[node].name.clone(),
                tabs: ungrouped,
            });
        } else {
            pending[node] = ungrouped;
        }
    }
    grouping.leftovers = std::mem::take(&mut pending[ROOT]);
    grouping
}
