// ── Path resolution ──
//
// Enumerates the statically known routes from facility sources to a
// destination's branches. Which of them carries beam right now is a
// runtime question answered by the controller.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use super::{FacilityGraph, NodeIndex};
use crate::config::BranchTarget;
use crate::model::DeviceHandle;

/// An ordered device sequence from a source to a target node.
#[derive(Debug, Clone)]
pub struct Route {
    pub source: String,
    pub target: String,
    pub devices: Vec<DeviceHandle>,
}

impl Route {
    /// Build a route from a raw node path, dropping structural nodes.
    fn from_nodes(graph: &FacilityGraph, nodes: &[NodeIndex]) -> Option<Self> {
        let source = graph.node(*nodes.first()?)?.name.clone();
        let target = graph.node(*nodes.last()?)?.name.clone();
        let devices = nodes
            .iter()
            .filter_map(|idx| graph.node(*idx)?.device().cloned())
            .collect();
        Some(Self {
            source,
            target,
            devices,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name().to_owned()).collect()
    }

    /// Drop every device past `max_z`.
    fn truncate(&mut self, max_z: f64) {
        self.devices.retain(|d| d.z() <= max_z);
    }
}

/// Enumerate all routes from any source to any of a destination's branches.
///
/// Routes with an identical device sequence are reported once. Routes left
/// with no devices after truncation are dropped.
pub fn resolve_paths(
    graph: &FacilityGraph,
    sources: &BTreeSet<String>,
    targets: &[BranchTarget],
) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    for target in targets {
        let Some(target_idx) = graph.find(&target.branch) else {
            debug!(branch = %target.branch, "target branch not present in facility graph");
            continue;
        };
        for source in sources {
            let Some(source_idx) = graph.find(source) else {
                continue;
            };
            if !graph.has_path(source_idx, target_idx) {
                debug!(%source, branch = %target.branch, "no path between source and branch");
                continue;
            }
            for nodes in graph.simple_paths(source_idx, target_idx) {
                let Some(mut route) = Route::from_nodes(graph, &nodes) else {
                    continue;
                };
                if let Some(max_z) = target.max_z {
                    route.truncate(max_z);
                }
                if route.devices.is_empty() || !seen.insert(route.names()) {
                    continue;
                }
                routes.push(route);
            }
        }
    }
    routes
}

/// Every route from any source up to and including `node`.
pub fn routes_to_node(
    graph: &FacilityGraph,
    sources: &BTreeSet<String>,
    node: NodeIndex,
) -> Vec<Route> {
    let mut routes = Vec::new();
    for source in sources {
        let Some(source_idx) = graph.find(source) else {
            continue;
        };
        for nodes in graph.simple_paths(source_idx, node) {
            if let Some(route) = Route::from_nodes(graph, &nodes) {
                routes.push(route);
            }
        }
    }
    routes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::assemble;
    use crate::graph::branch::handles;
    use crate::sim::{SimDevice, SimKind};

    /// L0 source; mirror m1 feeds L1; both L0 and L1 run to their ends.
    fn facility() -> crate::graph::Facility {
        let devices = handles(&[
            Arc::new(SimDevice::new("a", 1.0, &["L0"], &["L0"], SimKind::Valve)),
            Arc::new(SimDevice::new("m1", 3.0, &["L0"], &["L0", "L1"], SimKind::Mirror)),
            Arc::new(SimDevice::new("b", 5.0, &["L0"], &["L0"], SimKind::Valve)),
            Arc::new(SimDevice::new("c", 6.0, &["L1"], &["L1"], SimKind::Valve)),
            Arc::new(SimDevice::new("d", 9.0, &["L1"], &["L1"], SimKind::Valve)),
        ]);
        assemble(&devices, &["L0".into()]).unwrap()
    }

    #[test]
    fn resolves_routes_per_branch() {
        let f = facility();
        let l0 = resolve_paths(&f.graph, &f.sources, &[BranchTarget::new("L0")]);
        assert_eq!(l0.len(), 1);
        assert_eq!(l0[0].names(), vec!["a", "m1", "b"]);

        let l1 = resolve_paths(&f.graph, &f.sources, &[BranchTarget::new("L1")]);
        assert_eq!(l1.len(), 1);
        assert_eq!(l1[0].names(), vec!["a", "m1", "c", "d"]);
        assert_eq!(l1[0].source, "source_L0");
        assert_eq!(l1[0].target, "L1");
    }

    #[test]
    fn multiple_branches_concatenate() {
        let f = facility();
        let routes = resolve_paths(
            &f.graph,
            &f.sources,
            &[BranchTarget::new("L0"), BranchTarget::new("L1")],
        );
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn max_z_truncates_route() {
        let f = facility();
        let routes = resolve_paths(&f.graph, &f.sources, &[BranchTarget::until("L1", 6.0)]);
        assert_eq!(routes[0].names(), vec!["a", "m1", "c"]);
    }

    #[test]
    fn unknown_branch_yields_nothing() {
        let f = facility();
        assert!(resolve_paths(&f.graph, &f.sources, &[BranchTarget::new("K9")]).is_empty());
    }

    #[test]
    fn routes_to_device_node() {
        let f = facility();
        let c = f.graph.find("c").unwrap();
        let routes = routes_to_node(&f.graph, &f.sources, c);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].names(), vec!["a", "m1", "c"]);
    }
}
