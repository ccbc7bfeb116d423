// ── Beam path engine ──
//
// A `BeamPath` is an immutable, z-ordered set of devices along one route.
// Every query re-reads live device state and recomputes the whole path;
// nothing about device state is cached between calls.

mod events;
mod ops;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::config::DEFAULT_MINIMUM_TRANSMISSION;
use crate::error::{CoordinateError, CoreError, PathError};
use crate::graph::branch::sort_by_position;
use crate::model::{
    DeviceHandle, DeviceState, LightpathDevice, LightpathState, SubscriptionId, classify,
};

pub use events::PathEvent;
pub use ops::{ClearOptions, PendingRemoval, SplitAt};

const EVENT_CHANNEL_SIZE: usize = 64;

/// One row of a path's device summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub z: f64,
    pub input_branches: Vec<String>,
    pub output_branches: Vec<String>,
    pub state: DeviceState,
    pub blocking: bool,
}

/// An ordered route of devices whose combined state decides whether beam
/// gets through.
///
/// Cloning is cheap and clones share change subscriptions.
#[derive(Clone)]
pub struct BeamPath {
    inner: Arc<PathInner>,
}

struct PathInner {
    name: Option<String>,
    /// Sorted by z; fixed after construction.
    devices: Vec<DeviceHandle>,
    /// Every input branch any member accepts.
    branch_list: BTreeSet<String>,
    minimum_transmission: f64,
    events: broadcast::Sender<PathEvent>,
    /// Per-device callbacks registered on first subscribe.
    subscriptions: Mutex<Vec<(DeviceHandle, SubscriptionId)>>,
}

impl BeamPath {
    /// Build a path with the default minimum transmission.
    pub fn new(devices: Vec<DeviceHandle>) -> Result<Self, CoreError> {
        Self::with_options(devices, DEFAULT_MINIMUM_TRANSMISSION, None)
    }

    /// Build a path, validating every member's position.
    ///
    /// Fails with [`CoreError::EmptyPath`] for an empty device list and with
    /// a [`CoordinateError`] for a non-finite or negative z.
    pub fn with_options(
        mut devices: Vec<DeviceHandle>,
        minimum_transmission: f64,
        name: Option<String>,
    ) -> Result<Self, CoreError> {
        if devices.is_empty() {
            return Err(CoreError::EmptyPath);
        }
        if let Some(bad) = devices.iter().find(|d| !d.z().is_finite() || d.z() < 0.0) {
            return Err(CoordinateError {
                device: bad.name().to_owned(),
                z: bad.z(),
            }
            .into());
        }
        sort_by_position(&mut devices);

        let branch_list = devices
            .iter()
            .flat_map(|d| d.input_branches().iter().cloned())
            .collect();
        debug!(path = ?name, devices = devices.len(), "configuring beam path");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Ok(Self {
            inner: Arc::new(PathInner {
                name,
                devices,
                branch_list,
                minimum_transmission,
                events,
                subscriptions: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Member devices in beam order.
    pub fn devices(&self) -> &[DeviceHandle] {
        &self.inner.devices
    }

    pub fn device(&self, name: &str) -> Option<&DeviceHandle> {
        self.inner.devices.iter().find(|d| d.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        crate::model::device::names(&self.inner.devices)
    }

    pub fn minimum_transmission(&self) -> f64 {
        self.inner.minimum_transmission
    }

    pub fn branch_list(&self) -> &BTreeSet<String> {
        &self.inner.branch_list
    }

    /// First and last member position.
    pub fn range(&self) -> (f64, f64) {
        let first = self.inner.devices.first().map_or(0.0, |d| d.z());
        let last = self.inner.devices.last().map_or(0.0, |d| d.z());
        (first, last)
    }

    /// Members that can send beam onto more than one branch.
    pub fn branching_devices(&self) -> Vec<DeviceHandle> {
        self.inner
            .devices
            .iter()
            .filter(|d| d.is_branching())
            .cloned()
            .collect()
    }

    // ── State evaluation ─────────────────────────────────────────────

    /// The single output of `device` that feeds this route.
    ///
    /// Reads the device's live state. `Ok(None)` means the device currently
    /// sends no beam along this route.
    pub fn device_output(&self, device: &str) -> Result<Option<(String, f64)>, CoreError> {
        let position = self
            .inner
            .devices
            .iter()
            .position(|d| d.name() == device)
            .ok_or_else(|| CoreError::DeviceNotFound {
                name: device.to_owned(),
            })?;
        let report = self.inner.devices[position].lightpath_state()?;
        Ok(self.inner.matched_output(position, &report)?)
    }

    /// Devices currently stopping or misrouting the beam, upstream first.
    ///
    /// Includes devices downstream of the first impediment.
    pub fn blocking_devices(&self) -> Result<Vec<DeviceHandle>, PathError> {
        self.inner.blocking_devices()
    }

    /// The first blocking device, if any.
    pub fn impediment(&self) -> Result<Option<DeviceHandle>, PathError> {
        self.inner.impediment()
    }

    pub fn cleared(&self) -> Result<bool, PathError> {
        Ok(self.blocking_devices()?.is_empty())
    }

    /// Inserted devices the beam currently reaches: everything inserted at
    /// or upstream of the impediment.
    pub fn incident_devices(&self) -> Result<Vec<DeviceHandle>, PathError> {
        let limit = self.impediment()?.map_or(f64::INFINITY, |d| d.z());
        Ok(self
            .inner
            .devices
            .iter()
            .filter(|d| d.z() <= limit && classify(d.as_ref()).state == DeviceState::Inserted)
            .cloned()
            .collect())
    }

    /// One row per member with its current state.
    pub fn summary(&self) -> Result<Vec<DeviceSummary>, PathError> {
        let blocking: BTreeSet<String> = crate::model::device::names(&self.blocking_devices()?)
            .into_iter()
            .collect();
        Ok(self
            .inner
            .devices
            .iter()
            .map(|d| DeviceSummary {
                name: d.name().to_owned(),
                z: d.z(),
                input_branches: d.input_branches().to_vec(),
                output_branches: d.output_branches().to_vec(),
                state: classify(d.as_ref()).state,
                blocking: blocking.contains(d.name()),
            })
            .collect())
    }

    // ── Machine protection ───────────────────────────────────────────

    /// Members whose insertion protects everything downstream.
    pub fn veto_devices(&self) -> Vec<DeviceHandle> {
        self.inner
            .devices
            .iter()
            .filter(|d| d.mps().is_some_and(|m| m.veto_capable()))
            .cloned()
            .collect()
    }

    /// Members currently reporting an MPS fault.
    ///
    /// A device whose fault status cannot be read counts as faulted.
    pub fn faulted_devices(&self) -> Vec<DeviceHandle> {
        self.inner
            .devices
            .iter()
            .filter(|d| {
                let Some(mps) = d.mps() else {
                    return false;
                };
                match mps.faulted() {
                    Ok(faulted) => faulted,
                    Err(e) => {
                        warn!(device = d.name(), error = %e, "unable to read MPS fault state");
                        true
                    }
                }
            })
            .cloned()
            .collect()
    }

    /// Faulted members with no inserted veto device strictly upstream.
    pub fn tripped_devices(&self) -> Vec<DeviceHandle> {
        let vetoes: Vec<f64> = self
            .veto_devices()
            .iter()
            .filter(|d| classify(d.as_ref()).state == DeviceState::Inserted)
            .map(|d| d.z())
            .collect();
        self.faulted_devices()
            .into_iter()
            .filter(|d| !vetoes.iter().any(|z| *z < d.z()))
            .collect()
    }
}

impl PathInner {
    /// Match a device's reported outputs against the next member's inputs,
    /// or the whole route's branches for the last member.
    fn matched_output(
        &self,
        position: usize,
        report: &LightpathState,
    ) -> Result<Option<(String, f64)>, PathError> {
        let matches: Vec<(&String, &f64)> = match self.devices.get(position + 1) {
            Some(next) => report
                .output
                .iter()
                .filter(|(branch, _)| next.accepts(branch))
                .collect(),
            None => report
                .output
                .iter()
                .filter(|(branch, _)| self.branch_list.contains(*branch))
                .collect(),
        };

        match matches.as_slice() {
            [] => Ok(None),
            [(branch, transmission)] => Ok(Some(((*branch).clone(), **transmission))),
            many => Err(PathError::MultipleOutputs {
                device: self
                    .devices
                    .get(position)
                    .map(|d| d.name().to_owned())
                    .unwrap_or_default(),
                branches: many.iter().map(|(b, _)| (*b).clone()).collect(),
            }),
        }
    }

    fn blocking_devices(&self) -> Result<Vec<DeviceHandle>, PathError> {
        let mut block: Vec<DeviceHandle> = Vec::new();
        let mut previous: Option<(&DeviceHandle, Option<String>)> = None;
        let mut transmission = 1.0_f64;

        for (position, device) in self.devices.iter().enumerate() {
            let classified = classify(device.as_ref());
            let (false, Some(report)) = (classified.state.is_indeterminate(), classified.report)
            else {
                block.push(Arc::clone(device));
                continue;
            };

            let output = self.matched_output(position, &report)?;
            match &output {
                None => block.push(Arc::clone(device)),
                Some(_)
                    if previous.as_ref().is_some_and(|(_, branch)| {
                        branch.as_ref().is_none_or(|b| !device.accepts(b))
                    }) =>
                {
                    // Previous device points somewhere else.
                    if let Some((prev, _)) = previous
                        .as_ref()
                        .filter(|(p, _)| !block.iter().any(|b| b.name() == p.name()))
                    {
                        block.push(Arc::clone(prev));
                    }
                }
                Some((_, device_transmission)) => match classified.state {
                    DeviceState::Inserted => {
                        if *device_transmission > 1.0 {
                            error!(
                                device = device.name(),
                                transmission = device_transmission,
                                "device reports transmission above 1"
                            );
                        }
                        transmission *= device_transmission.min(1.0);
                        if transmission < self.minimum_transmission {
                            block.push(Arc::clone(device));
                        }
                    }
                    DeviceState::Removed => {}
                    _ => block.push(Arc::clone(device)),
                },
            }

            previous = Some((device, output.map(|(branch, _)| branch)));
        }
        Ok(block)
    }

    fn impediment(&self) -> Result<Option<DeviceHandle>, PathError> {
        Ok(self.blocking_devices()?.into_iter().next())
    }

    fn detach(&self) {
        let subs = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (device, id) in subs {
            device.unsubscribe(id);
        }
    }
}

impl Drop for PathInner {
    fn drop(&mut self) {
        self.detach();
    }
}

impl PartialEq for BeamPath {
    fn eq(&self, other: &Self) -> bool {
        self.inner.devices.len() == other.inner.devices.len()
            && self
                .inner
                .devices
                .iter()
                .zip(&other.inner.devices)
                .all(|(a, b)| a.name() == b.name())
    }
}

impl fmt::Debug for BeamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeamPath")
            .field("name", &self.inner.name)
            .field("range", &self.range())
            .field("devices", &self.inner.devices.len())
            .finish()
    }
}
