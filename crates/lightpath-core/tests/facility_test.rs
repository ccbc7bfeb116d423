#![allow(clippy::unwrap_used)]
// End-to-end tests over a small two-line facility built from a simulated
// catalog: assembly, routing, path state and the controller together.

use std::collections::BTreeSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use lightpath_core::graph::assemble;
use lightpath_core::{
    BeamPath, BeamlineConfig, ClearOptions, Controller, DeviceHandle, LightpathDevice, SimCatalog,
    SimDevice, SimKind, SimStatus, SplitAt,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Hard x-ray line L0 with an offset mirror at z=20 feeding L2, and a soft
/// line K0 ending in its own hutch.
fn catalog() -> SimCatalog {
    let mut catalog = SimCatalog::new();
    for (name, z, ins, outs, kind) in [
        ("k_valve", 4.0, &["K0"][..], &["K0"][..], SimKind::Valve),
        ("k_stopper", 12.0, &["K0"][..], &["K0"][..], SimKind::Stopper),
        ("l_valve", 5.0, &["L0"][..], &["L0"][..], SimKind::Valve),
        ("l_yag", 10.0, &["L0"][..], &["L0"][..], SimKind::Passive),
        ("l_mirror", 20.0, &["L0"][..], &["L0", "L2"][..], SimKind::Mirror),
        ("l0_stopper", 30.0, &["L0"][..], &["L0"][..], SimKind::Stopper),
        ("l2_valve", 32.0, &["L2"][..], &["L2"][..], SimKind::Valve),
        ("l2_yag", 40.0, &["L2"][..], &["L2"][..], SimKind::Passive),
    ] {
        catalog.add(SimDevice::new(name, z, ins, outs, kind));
    }
    catalog
}

fn config() -> BeamlineConfig {
    BeamlineConfig::new(&["K0", "L0"])
        .with_destination("CXI", &["L0"])
        .with_destination("XPP", &["L2"])
        .with_destination("TMO", &["K0"])
}

fn set(catalog: &SimCatalog, name: &str, status: SimStatus) {
    catalog.device(name).unwrap().set_status(status);
}

fn names(devices: &[DeviceHandle]) -> Vec<String> {
    devices.iter().map(|d| d.name().to_owned()).collect()
}

// ── Scenario ────────────────────────────────────────────────────────

#[test]
fn test_seven_device_branch() {
    let devices: Vec<Arc<SimDevice>> = [0.0, 2.0, 9.0, 15.0, 16.0, 24.0, 30.0]
        .into_iter()
        .map(|z| {
            let kind = if z == 24.0 {
                SimKind::Passive
            } else {
                SimKind::Valve
            };
            Arc::new(SimDevice::new(format!("z{z}"), z, &["TST"], &["TST"], kind))
        })
        .collect();
    let handles: Vec<DeviceHandle> = devices
        .iter()
        .map(|d| Arc::clone(d) as DeviceHandle)
        .collect();
    let path = BeamPath::new(handles).unwrap();
    assert!(path.cleared().unwrap());

    devices[1].insert(None).unwrap();
    devices[3].insert(None).unwrap();
    assert_eq!(path.impediment().unwrap().unwrap().z(), 2.0);
    assert_eq!(path.blocking_devices().unwrap().len(), 2);

    devices[1].remove(None).unwrap();
    devices[3].remove(None).unwrap();
    devices[5].insert(None).unwrap();
    assert!(path.cleared().unwrap());
    let incident = path.incident_devices().unwrap();
    assert_eq!(incident.len(), 1);
    assert_eq!(incident[0].z(), 24.0);
}

// ── Assembly ────────────────────────────────────────────────────────

#[test]
fn test_assembly_ignores_catalog_order() {
    let catalog = catalog();
    let devices: Vec<DeviceHandle> = catalog
        .devices()
        .map(|d| Arc::clone(d) as DeviceHandle)
        .collect();
    let sources = vec!["K0".to_owned(), "L0".to_owned()];
    let expected = assemble(&devices, &sources).unwrap().graph.edge_set();

    let mut rotated = devices.clone();
    for _ in 0..devices.len() {
        rotated.rotate_left(1);
        assert_eq!(assemble(&rotated, &sources).unwrap().graph.edge_set(), expected);
    }
    let reversed: Vec<DeviceHandle> = devices.into_iter().rev().collect();
    assert_eq!(assemble(&reversed, &sources).unwrap().graph.edge_set(), expected);
}

// ── Controller ──────────────────────────────────────────────────────

#[test]
fn test_destination_routes() {
    let catalog = catalog();
    let controller = Controller::new(&catalog, config(), None).unwrap();

    assert_eq!(controller.destination_names(), vec!["CXI", "TMO", "XPP"]);
    assert_eq!(
        controller.active_path("CXI").unwrap().names(),
        vec!["l_valve", "l_yag", "l_mirror", "l0_stopper"]
    );
    assert_eq!(
        controller.active_path("XPP").unwrap().names(),
        vec!["l_valve", "l_yag", "l_mirror", "l2_valve", "l2_yag"]
    );
    assert_eq!(
        controller.active_path("TMO").unwrap().names(),
        vec!["k_valve", "k_stopper"]
    );
}

#[test]
fn test_beam_follows_mirror() {
    let catalog = catalog();
    let controller = Controller::new(&catalog, config(), None).unwrap();

    // Mirror out: beam runs down L0 to CXI; XPP is blocked at the mirror.
    assert!(controller.active_path("CXI").unwrap().cleared().unwrap());
    let xpp = controller.active_path("XPP").unwrap();
    assert_eq!(xpp.impediment().unwrap().unwrap().name(), "l_mirror");

    set(&catalog, "l_mirror", SimStatus::Inserted);
    assert!(controller.active_path("XPP").unwrap().cleared().unwrap());
    assert_eq!(
        controller.walk().unwrap()["source_L0"],
        vec!["l_valve", "l_yag", "l_mirror", "l2_valve", "l2_yag"]
    );
}

#[test]
fn test_facility_destinations() {
    let catalog = catalog();
    let controller = Controller::new(&catalog, config(), None).unwrap();
    assert!(controller.destinations().is_empty());

    set(&catalog, "k_stopper", SimStatus::Inserted);
    set(&catalog, "l0_stopper", SimStatus::Inserted);
    let found: BTreeSet<String> = names(&controller.destinations()).into_iter().collect();
    assert_eq!(
        found,
        BTreeSet::from(["k_stopper".to_owned(), "l0_stopper".to_owned()])
    );
}

#[test]
fn test_disconnected_device_blocks_without_failing() {
    let catalog = catalog();
    let controller = Controller::new(&catalog, config(), None).unwrap();

    set(&catalog, "l_yag", SimStatus::Disconnected);
    let cxi = controller.active_path("CXI").unwrap();
    assert_eq!(cxi.impediment().unwrap().unwrap().name(), "l_yag");
    assert!(controller.walk().unwrap()["source_L0"].ends_with(&["l_yag".to_owned()]));
}

#[test]
fn test_clear_and_split_active_path() {
    let catalog = catalog();
    let controller = Controller::new(&catalog, config(), None).unwrap();
    set(&catalog, "l_valve", SimStatus::Inserted);
    set(&catalog, "l_yag", SimStatus::Inserted);

    let cxi = controller.active_path("CXI").unwrap();
    let pending = cxi.clear(&ClearOptions::default()).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(cxi.cleared().unwrap());
    assert_eq!(names(&cxi.incident_devices().unwrap()), vec!["l_yag"]);

    let (upstream, downstream) = cxi.split(&SplitAt::Device("l_mirror".into())).unwrap();
    assert_eq!(downstream.names(), vec!["l0_stopper"]);
    assert_eq!(upstream.join(&[&downstream]).unwrap(), cxi);
}

#[test]
fn test_unavailable_devices_are_reported() {
    let mut catalog = catalog();
    catalog.add_unavailable(lightpath_core::DeviceMetadata::new(
        "ghost",
        25.0,
        &["L0"],
        &["L0"],
    ));
    let controller = Controller::new(&catalog, config(), None).unwrap();
    assert_eq!(controller.unavailable().len(), 1);
    assert_eq!(controller.unavailable()[0].name, "ghost");
    assert!(!names(&controller.devices()).contains(&"ghost".to_owned()));
}
