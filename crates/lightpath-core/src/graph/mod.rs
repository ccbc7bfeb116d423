// ── Facility graph ──
//
// Arena-indexed directed graph of devices and structural nodes. Nodes are
// keyed by name; inserting an existing name or an existing edge is a no-op,
// so per-branch graphs can be merged freely.

pub mod branch;
pub mod facility;
pub mod resolve;
pub mod walk;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::DeviceHandle;

pub use branch::build_branch;
pub use facility::{Facility, UnavailableDevice, assemble};
pub use resolve::{Route, resolve_paths, routes_to_node};
pub use walk::walk;

/// Prefix of synthetic source node names.
pub const SOURCE_PREFIX: &str = "source_";

/// Name of the synthetic source node for a branch.
pub fn source_name(branch: &str) -> String {
    format!("{SOURCE_PREFIX}{branch}")
}

/// Index of a node within its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a graph node stands for.
#[derive(Clone)]
pub enum NodeKind {
    Device(DeviceHandle),
    /// Entry point where beam is produced on `branch`.
    Source { branch: String },
    /// Endpoint named after `branch`.
    Terminal { branch: String },
}

#[derive(Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn device(&self) -> Option<&DeviceHandle> {
        match &self.kind {
            NodeKind::Device(d) => Some(d),
            NodeKind::Source { .. } | NodeKind::Terminal { .. } => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, NodeKind::Source { .. })
    }

    pub fn is_structural(&self) -> bool {
        self.device().is_none()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            NodeKind::Device(_) => "device",
            NodeKind::Source { .. } => "source",
            NodeKind::Terminal { .. } => "terminal",
        };
        write!(f, "{}({kind})", self.name)
    }
}

/// A directed edge, labelled with the branch it represents.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub target: NodeIndex,
    pub branch: String,
    /// Reserved for weighted search; routing ignores it.
    pub weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FacilityGraph {
    nodes: Vec<Node>,
    by_name: IndexMap<String, NodeIndex>,
    successors: Vec<Vec<Edge>>,
    predecessors: Vec<Vec<NodeIndex>>,
}

impl FacilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the existing index if the name is taken.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> NodeIndex {
        if let Some(idx) = self.by_name.get(name) {
            return *idx;
        }
        let idx = NodeIndex(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_owned(),
            kind,
        });
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        self.by_name.insert(name.to_owned(), idx);
        idx
    }

    pub fn add_device(&mut self, device: &DeviceHandle) -> NodeIndex {
        self.add_node(device.name(), NodeKind::Device(Arc::clone(device)))
    }

    /// Insert an edge. Returns `false` if `from -> to` already existed.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, branch: &str, weight: f64) -> bool {
        let Some(out) = self.successors.get_mut(from.0) else {
            return false;
        };
        if out.iter().any(|e| e.target == to) {
            return false;
        }
        out.push(Edge {
            target: to,
            branch: branch.to_owned(),
            weight,
        });
        if let Some(inc) = self.predecessors.get_mut(to.0) {
            inc.push(from);
        }
        true
    }

    /// Merge another graph into this one, by node name.
    pub fn merge(&mut self, other: &FacilityGraph) {
        let mapping: Vec<NodeIndex> = other
            .nodes
            .iter()
            .map(|n| self.add_node(&n.name, n.kind.clone()))
            .collect();
        for (from, edges) in other.successors.iter().enumerate() {
            for edge in edges {
                if let (Some(&f), Some(&t)) = (mapping.get(from), mapping.get(edge.target.0)) {
                    self.add_edge(f, t, &edge.branch, edge.weight);
                }
            }
        }
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.0)
    }

    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    pub fn edges(&self, idx: NodeIndex) -> &[Edge] {
        self.successors.get(idx.0).map_or(&[], Vec::as_slice)
    }

    pub fn successors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.edges(idx).iter().map(|e| e.target)
    }

    pub fn predecessors(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.predecessors.get(idx.0).map_or(&[], Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of all synthetic source nodes.
    pub fn source_names(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter(|n| n.is_source())
            .map(|n| n.name.clone())
            .collect()
    }

    /// Edge set as `(from, to)` name pairs, independent of insertion order.
    pub fn edge_set(&self) -> BTreeSet<(String, String)> {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, edges)| {
                edges.iter().filter_map(move |e| {
                    let f = self.nodes.get(from)?;
                    let t = self.nodes.get(e.target.0)?;
                    Some((f.name.clone(), t.name.clone()))
                })
            })
            .collect()
    }

    pub fn has_path(&self, from: NodeIndex, to: NodeIndex) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if idx == to {
                return true;
            }
            match seen.get_mut(idx.0) {
                Some(s) if !*s => *s = true,
                _ => continue,
            }
            stack.extend(self.successors(idx));
        }
        false
    }

    /// Every simple path (no repeated node) from `from` to `to`.
    pub fn simple_paths(&self, from: NodeIndex, to: NodeIndex) -> Vec<Vec<NodeIndex>> {
        let mut found = Vec::new();
        if from == to {
            return found;
        }
        let mut on_path = vec![false; self.nodes.len()];
        let mut path = vec![from];
        if let Some(s) = on_path.get_mut(from.0) {
            *s = true;
        }
        self.extend_paths(to, &mut path, &mut on_path, &mut found);
        found
    }

    fn extend_paths(
        &self,
        to: NodeIndex,
        path: &mut Vec<NodeIndex>,
        on_path: &mut [bool],
        found: &mut Vec<Vec<NodeIndex>>,
    ) {
        let Some(&last) = path.last() else {
            return;
        };
        for next in self.successors(last) {
            if next == to {
                let mut complete = path.clone();
                complete.push(next);
                found.push(complete);
                continue;
            }
            if on_path.get(next.0).copied().unwrap_or(true) {
                continue;
            }
            on_path[next.0] = true;
            path.push(next);
            self.extend_paths(to, path, on_path, found);
            path.pop();
            on_path[next.0] = false;
        }
    }
}
