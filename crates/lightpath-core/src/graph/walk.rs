// ── Facility walker ──
//
// Follows the live beam from each source, one unambiguous hop at a time,
// using what every device currently reports as its active outputs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{FacilityGraph, NodeIndex, NodeKind};
use crate::error::PathError;

/// Branches beam leaves `idx` on right now.
fn active_outputs(graph: &FacilityGraph, idx: NodeIndex) -> BTreeSet<String> {
    let Some(node) = graph.node(idx) else {
        return BTreeSet::new();
    };
    match &node.kind {
        NodeKind::Source { branch } => BTreeSet::from([branch.clone()]),
        NodeKind::Terminal { .. } => BTreeSet::new(),
        NodeKind::Device(device) => match device.lightpath_state() {
            Ok(state) => state.active_outputs().map(str::to_owned).collect(),
            Err(e) => {
                warn!(device = device.name(), error = %e, "unable to read outputs while walking");
                BTreeSet::new()
            }
        },
    }
}

/// Walk the actual instantaneous beam route from every source.
///
/// Returns source name -> device names in beam order. More than one
/// simultaneously valid next hop is a `PathError`.
pub fn walk(
    graph: &FacilityGraph,
    sources: &BTreeSet<String>,
) -> Result<BTreeMap<String, Vec<String>>, PathError> {
    let mut routes = BTreeMap::new();
    for source in sources {
        let Some(start) = graph.find(source) else {
            continue;
        };
        routes.insert(source.clone(), walk_from(graph, start)?);
    }
    Ok(routes)
}

fn walk_from(graph: &FacilityGraph, start: NodeIndex) -> Result<Vec<String>, PathError> {
    let mut visited = BTreeSet::from([start]);
    let mut current = start;
    let mut route = Vec::new();

    loop {
        let outputs = active_outputs(graph, current);
        let candidates: Vec<NodeIndex> = graph
            .successors(current)
            .filter(|next| {
                graph
                    .node(*next)
                    .and_then(|n| n.device())
                    .is_some_and(|d| d.input_branches().iter().any(|b| outputs.contains(b)))
            })
            .collect();

        let next = match candidates.as_slice() {
            [] => break,
            [only] => *only,
            many => {
                let name = |idx: &NodeIndex| {
                    graph
                        .node(*idx)
                        .map(|n| n.name.clone())
                        .unwrap_or_default()
                };
                return Err(PathError::AmbiguousSuccessor {
                    node: name(&current),
                    candidates: many.iter().map(name).collect(),
                });
            }
        };
        if !visited.insert(next) {
            debug!("walk revisited a node, stopping");
            break;
        }
        if let Some(node) = graph.node(next) {
            route.push(node.name.clone());
        }
        current = next;
    }
    Ok(route)
}
