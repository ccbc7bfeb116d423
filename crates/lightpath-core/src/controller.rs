// ── Controller ──
//
// Composition root: loads the facility once, materializes the candidate
// beam paths for each configured destination and answers facility-wide
// questions about them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::BeamlineConfig;
use crate::error::{CoreError, PathError};
use crate::graph::branch::sort_by_position;
use crate::graph::{Facility, UnavailableDevice, resolve_paths, routes_to_node, walk};
use crate::model::{DeviceCatalog, DeviceHandle, LightpathDevice};
use crate::path::BeamPath;

/// Facility-wide view over every loaded destination.
///
/// Paths are built eagerly at construction; device state is always read
/// live when a query runs.
#[derive(Debug, Clone)]
pub struct Controller {
    config: BeamlineConfig,
    facility: Facility,
    beamlines: BTreeMap<String, Vec<BeamPath>>,
}

impl Controller {
    /// Load the facility from a device catalog.
    ///
    /// `destinations` restricts which configured destinations get paths;
    /// `None` loads all of them. Names missing from the configuration are
    /// logged and skipped.
    pub fn new(
        catalog: &dyn DeviceCatalog,
        config: BeamlineConfig,
        destinations: Option<&[String]>,
    ) -> Result<Self, CoreError> {
        let facility = Facility::load(catalog, &config.sources)?;
        Self::from_facility(facility, config, destinations)
    }

    /// Build from an already assembled facility.
    pub fn from_facility(
        facility: Facility,
        config: BeamlineConfig,
        destinations: Option<&[String]>,
    ) -> Result<Self, CoreError> {
        let requested: Vec<String> = match destinations {
            Some(names) => names.to_vec(),
            None => config.destinations.keys().cloned().collect(),
        };

        let mut beamlines = BTreeMap::new();
        for name in requested {
            let Some(targets) = config.targets(&name) else {
                warn!(destination = %name, "destination not found in configuration, skipping");
                continue;
            };
            let routes = resolve_paths(&facility.graph, &facility.sources, targets);
            if routes.is_empty() {
                warn!(destination = %name, "no routes found to destination");
            }
            let paths = routes
                .into_iter()
                .map(|route| {
                    BeamPath::with_options(route.devices, config.minimum_transmission, Some(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!(destination = %name, candidates = paths.len(), "loaded destination");
            beamlines.insert(name, paths);
        }
        info!(
            destinations = beamlines.len(),
            devices = facility.graph.node_count(),
            "facility loaded"
        );

        Ok(Self {
            config,
            facility,
            beamlines,
        })
    }

    pub fn config(&self) -> &BeamlineConfig {
        &self.config
    }

    pub fn facility(&self) -> &Facility {
        &self.facility
    }

    /// Candidate paths per loaded destination.
    pub fn beamlines(&self) -> &BTreeMap<String, Vec<BeamPath>> {
        &self.beamlines
    }

    pub fn destination_names(&self) -> Vec<&str> {
        self.beamlines.keys().map(String::as_str).collect()
    }

    pub fn candidates(&self, destination: &str) -> Result<&[BeamPath], CoreError> {
        self.beamlines
            .get(destination)
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::UnknownDestination {
                name: destination.to_owned(),
            })
    }

    /// The candidate path currently carrying beam farthest.
    pub fn active_path(&self, destination: &str) -> Result<BeamPath, CoreError> {
        Ok(select_active(self.candidates(destination)?, destination)?)
    }

    /// The path that currently brings beam closest to `device`.
    pub fn path_to(&self, device: &str) -> Result<BeamPath, CoreError> {
        let node = self
            .facility
            .graph
            .find(device)
            .filter(|idx| {
                self.facility
                    .graph
                    .node(*idx)
                    .is_some_and(|n| n.device().is_some())
            })
            .ok_or_else(|| CoreError::DeviceNotFound {
                name: device.to_owned(),
            })?;

        let paths = routes_to_node(&self.facility.graph, &self.facility.sources, node)
            .into_iter()
            .filter(|route| !route.devices.is_empty())
            .map(|route| {
                BeamPath::with_options(
                    route.devices,
                    self.config.minimum_transmission,
                    Some(device.to_owned()),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        if paths.is_empty() {
            return Err(PathError::NoRoute {
                target: device.to_owned(),
            }
            .into());
        }
        Ok(select_active(&paths, device)?)
    }

    /// Where beam currently ends up: the impediment of every destination's
    /// active path, excluding branching devices.
    pub fn destinations(&self) -> Vec<DeviceHandle> {
        let mut seen = BTreeSet::new();
        let mut found = Vec::new();
        for name in self.beamlines.keys() {
            let impediment = match self.active_path(name).map(|p| p.impediment()) {
                Ok(Ok(impediment)) => impediment,
                Ok(Err(e)) => {
                    warn!(destination = %name, error = %e, "unable to evaluate destination");
                    continue;
                }
                Err(e) => {
                    debug!(destination = %name, error = %e, "no active path");
                    continue;
                }
            };
            if let Some(device) = impediment.filter(|d| !d.is_branching()) {
                if seen.insert(device.name().to_owned()) {
                    found.push(device);
                }
            }
        }
        sort_by_position(&mut found);
        found
    }

    /// Devices the beam is incident on across every candidate path.
    pub fn incident_devices(&self) -> Vec<DeviceHandle> {
        let mut seen = BTreeSet::new();
        let mut incident = Vec::new();
        for (name, paths) in &self.beamlines {
            for path in paths {
                match path.incident_devices() {
                    Ok(devices) => incident.extend(
                        devices
                            .into_iter()
                            .filter(|d| seen.insert(d.name().to_owned())),
                    ),
                    Err(e) => warn!(destination = %name, error = %e, "unable to evaluate path"),
                }
            }
        }
        sort_by_position(&mut incident);
        incident
    }

    /// Every device that belongs to a loaded destination path.
    pub fn devices(&self) -> Vec<DeviceHandle> {
        let mut seen = BTreeSet::new();
        let mut devices: Vec<DeviceHandle> = self
            .beamlines
            .values()
            .flatten()
            .flat_map(|p| p.devices().iter())
            .filter(|d| seen.insert(d.name().to_owned()))
            .cloned()
            .collect();
        sort_by_position(&mut devices);
        devices
    }

    /// Catalog records whose devices could not be created.
    pub fn unavailable(&self) -> &[UnavailableDevice] {
        &self.facility.unavailable
    }

    /// The live beam route from every source.
    pub fn walk(&self) -> Result<BTreeMap<String, Vec<String>>, PathError> {
        walk(&self.facility.graph, &self.facility.sources)
    }
}

/// Pick the path whose impediment lies farthest downstream. An unobstructed
/// path wins outright; ties go to the first candidate.
///
/// Candidates that fail to evaluate are skipped; if all of them fail the
/// first error is returned.
fn select_active(paths: &[BeamPath], destination: &str) -> Result<BeamPath, PathError> {
    let mut best: Option<(f64, &BeamPath)> = None;
    let mut first_error = None;

    for path in paths {
        match path.impediment() {
            Ok(impediment) => {
                let z = impediment.map_or(f64::INFINITY, |d| d.z());
                if best.is_none_or(|(best_z, _)| z > best_z) {
                    best = Some((z, path));
                }
            }
            Err(e) => {
                warn!(%destination, error = %e, "skipping candidate path");
                first_error.get_or_insert(e);
            }
        }
    }

    match (best, first_error) {
        (Some((_, path)), _) => Ok(path.clone()),
        (None, Some(e)) => Err(e),
        (None, None) => Err(PathError::NoCandidates {
            destination: destination.to_owned(),
        }),
    }
}
