// ── Facility graph assembly ──
//
// Groups devices by every branch they touch, builds one branch graph per
// branch and merges them into a single facility-wide graph.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{FacilityGraph, build_branch};
use crate::error::CoreError;
use crate::model::{DeviceCatalog, DeviceHandle, DeviceMetadata, RangeQuery};

/// A catalog record whose live device could not be created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnavailableDevice {
    pub name: String,
    pub z: f64,
    pub reason: String,
}

/// The assembled facility: merged graph plus its source nodes.
///
/// Read-only once assembled; queries never mutate it.
#[derive(Debug, Clone, Default)]
pub struct Facility {
    pub graph: FacilityGraph,
    pub sources: BTreeSet<String>,
    pub unavailable: Vec<UnavailableDevice>,
}

impl Facility {
    /// Query the catalog, instantiate every record and assemble the graph.
    ///
    /// Records that fail to instantiate are logged and skipped. A catalog
    /// with no lightpath devices at all is a configuration error.
    pub fn load(catalog: &dyn DeviceCatalog, source_branches: &[String]) -> Result<Self, CoreError> {
        let records = catalog.search_range(&RangeQuery::facility())?;
        if records.is_empty() {
            return Err(CoreError::NoDevices);
        }
        info!(count = records.len(), "loading facility devices");

        let mut devices = Vec::with_capacity(records.len());
        let mut unavailable = Vec::new();
        for record in &records {
            record.validate()?;
            match catalog.instantiate(record) {
                Ok(device) => devices.push(device),
                Err(e) => {
                    warn!(device = %record.name, error = %e, "unable to instantiate device");
                    unavailable.push(unavailable_from(record, &e.to_string()));
                }
            }
        }

        let mut facility = assemble(&devices, source_branches)?;
        facility.unavailable = unavailable;
        Ok(facility)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceHandle> {
        self.graph
            .find(name)
            .and_then(|idx| self.graph.node(idx))
            .and_then(|n| n.device())
    }

    /// Every device node in the graph.
    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.graph
            .nodes()
            .filter_map(|(_, n)| n.device().cloned())
            .collect()
    }
}

fn unavailable_from(record: &DeviceMetadata, reason: &str) -> UnavailableDevice {
    UnavailableDevice {
        name: record.name.clone(),
        z: record.z,
        reason: reason.to_owned(),
    }
}

/// Assemble the facility graph from live devices.
pub fn assemble(devices: &[DeviceHandle], source_branches: &[String]) -> Result<Facility, CoreError> {
    if devices.is_empty() {
        return Err(CoreError::NoDevices);
    }

    let mut by_branch: BTreeMap<&str, Vec<DeviceHandle>> = BTreeMap::new();
    for device in devices {
        if device.input_branches().is_empty() || device.output_branches().is_empty() {
            return Err(CoreError::MissingBranches {
                device: device.name().to_owned(),
                missing: if device.input_branches().is_empty() {
                    "input".into()
                } else {
                    "output".into()
                },
            });
        }
        let touched: BTreeSet<&str> = device
            .input_branches()
            .iter()
            .chain(device.output_branches())
            .map(String::as_str)
            .collect();
        for branch in touched {
            by_branch
                .entry(branch)
                .or_default()
                .push(Arc::clone(device));
        }
    }

    let mut graph = FacilityGraph::new();
    for (branch, members) in &by_branch {
        let is_source = source_branches.iter().any(|s| s == branch);
        let subgraph = build_branch(branch, members, is_source);
        graph.merge(&subgraph);
    }

    let sources = graph.source_names();
    debug!(
        branches = by_branch.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        ?sources,
        "assembled facility graph"
    );
    Ok(Facility {
        graph,
        sources,
        unavailable: Vec::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::branch::handles;
    use crate::sim::{SimCatalog, SimDevice, SimKind};

    fn two_branch_devices() -> Vec<DeviceHandle> {
        handles(&[
            Arc::new(SimDevice::new("a", 1.0, &["L0"], &["L0"], SimKind::Valve)),
            Arc::new(SimDevice::new(
                "m",
                3.0,
                &["L0"],
                &["L0", "L1"],
                SimKind::Mirror,
            )),
            Arc::new(SimDevice::new("b", 5.0, &["L0"], &["L0"], SimKind::Valve)),
            Arc::new(SimDevice::new("c", 6.0, &["L1"], &["L1"], SimKind::Valve)),
        ])
    }

    #[test]
    fn assembly_is_independent_of_input_order() {
        let sources = vec!["L0".to_string()];
        let devices = two_branch_devices();
        let reversed: Vec<_> = devices.iter().rev().cloned().collect();

        let forward = assemble(&devices, &sources).unwrap();
        let backward = assemble(&reversed, &sources).unwrap();
        assert_eq!(forward.graph.edge_set(), backward.graph.edge_set());
        assert_eq!(forward.sources, BTreeSet::from(["source_L0".to_string()]));
    }

    #[test]
    fn branching_device_joins_both_branches() {
        let facility = assemble(&two_branch_devices(), &["L0".into()]).unwrap();
        let edges = facility.graph.edge_set();
        assert!(edges.contains(&("m".into(), "b".into())));
        assert!(edges.contains(&("m".into(), "c".into())));
        assert!(edges.contains(&("c".into(), "L1".into())));
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let catalog = SimCatalog::new();
        assert!(matches!(
            Facility::load(&catalog, &[]),
            Err(CoreError::NoDevices)
        ));
    }

    #[test]
    fn missing_branch_metadata_is_fatal() {
        let mut catalog = SimCatalog::new();
        catalog.add_unavailable(DeviceMetadata::new("bare", 1.0, &[], &["L0"]));
        assert!(matches!(
            Facility::load(&catalog, &[]),
            Err(CoreError::MissingBranches { .. })
        ));
    }

    #[test]
    fn uninstantiable_devices_are_reported() {
        let mut catalog = SimCatalog::new();
        catalog.add(SimDevice::new("a", 1.0, &["L0"], &["L0"], SimKind::Valve));
        catalog.add_unavailable(DeviceMetadata::new("ghost", 2.0, &["L0"], &["L0"]));

        let facility = Facility::load(&catalog, &["L0".into()]).unwrap();
        assert_eq!(facility.unavailable.len(), 1);
        assert_eq!(facility.unavailable[0].name, "ghost");
        assert!(facility.device("ghost").is_none());
        assert!(facility.device("a").is_some());
    }
}
