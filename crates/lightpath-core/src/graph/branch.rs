// ── Branch graph builder ──
//
// Builds the subgraph for a single branch from the devices that list it as
// an input or output. Devices that carry the branch on both sides form the
// spine; devices that only feed the branch (dangling-left) or only take
// from it (dangling-right) are hung off the spine.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{FacilityGraph, NodeIndex, NodeKind, source_name};
use crate::model::DeviceHandle;

/// Order devices by z, breaking ties by name so that assembly does not
/// depend on catalog enumeration order.
pub(crate) fn sort_by_position(devices: &mut [DeviceHandle]) {
    devices.sort_by(|a, b| a.z().total_cmp(&b.z()).then_with(|| a.name().cmp(b.name())));
}

/// True when `prev` can hand beam on `branch` straight to `next`.
fn hands_off(prev: &DeviceHandle, next: &DeviceHandle, branch: &str) -> bool {
    prev.emits(branch) && next.accepts(branch)
}

/// Build the graph for `branch` from the devices that touch it.
///
/// A synthetic `source_<branch>` node is prepended when `is_source` is set,
/// and a terminal node named after the branch is always appended. A branch
/// with no devices still produces a (source ->) terminal graph.
pub fn build_branch(branch: &str, devices: &[DeviceHandle], is_source: bool) -> FacilityGraph {
    let mut graph = FacilityGraph::new();
    let mut sorted: Vec<DeviceHandle> = devices.to_vec();
    sort_by_position(&mut sorted);

    let mut last_on_branch: Option<(NodeIndex, f64)> = is_source.then(|| {
        let idx = graph.add_node(
            &source_name(branch),
            NodeKind::Source {
                branch: branch.to_owned(),
            },
        );
        (idx, 0.0)
    });

    // Deferred edges for devices that only half-belong to this branch.
    let mut skipped_left: Vec<(NodeIndex, f64)> = Vec::new();
    let mut skipped_right: Vec<(NodeIndex, f64)> = Vec::new();
    let mut previous: Option<(NodeIndex, &DeviceHandle)> = None;

    for device in &sorted {
        let idx = graph.add_device(device);
        let z = device.z();

        // Adjacent pair joined on this branch gets a direct edge. Sharing some
        // other branch is not enough: that beam never enters this subgraph.
        if let Some((prev_idx, prev)) = previous {
            if hands_off(prev, device, branch) {
                graph.add_edge(prev_idx, idx, branch, (z - prev.z()).max(0.0));
            }
        }

        match (device.accepts(branch), device.emits(branch)) {
            (true, true) => {
                for (left, left_z) in skipped_left.drain(..) {
                    graph.add_edge(left, idx, branch, (z - left_z).max(0.0));
                }
                if let Some((last, last_z)) = last_on_branch {
                    for (right, right_z) in skipped_right.drain(..) {
                        graph.add_edge(last, right, branch, (right_z - last_z).max(0.0));
                    }
                    graph.add_edge(last, idx, branch, (z - last_z).max(0.0));
                }
                skipped_right.clear();
                last_on_branch = Some((idx, z));
            }
            (false, true) => {
                trace!(branch, device = device.name(), "dangling-left device");
                skipped_left.push((idx, z));
            }
            (true, false) => {
                trace!(branch, device = device.name(), "dangling-right device");
                skipped_right.push((idx, z));
            }
            (false, false) => {
                debug!(branch, device = device.name(), "device does not touch branch");
            }
        }
        previous = Some((idx, device));
    }

    let terminal = graph.add_node(
        branch,
        NodeKind::Terminal {
            branch: branch.to_owned(),
        },
    );
    if let Some((last, last_z)) = last_on_branch {
        for (right, right_z) in skipped_right.drain(..) {
            graph.add_edge(last, right, branch, (right_z - last_z).max(0.0));
        }
        graph.add_edge(last, terminal, branch, 0.0);
    }
    for (left, _) in skipped_left.drain(..) {
        graph.add_edge(left, terminal, branch, 0.0);
    }

    debug!(
        branch,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built branch graph"
    );
    graph
}

/// Convenience for tests and callers holding concrete device types.
pub fn handles<T: crate::model::LightpathDevice + 'static>(devices: &[Arc<T>]) -> Vec<DeviceHandle> {
    devices
        .iter()
        .map(|d| Arc::clone(d) as DeviceHandle)
        .collect()
}
