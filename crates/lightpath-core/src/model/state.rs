// ── Device state taxonomy ──
//
// Classification of a single device's beam-relevant status. Pure function
// over whatever the device reports; failures become state values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use super::device::LightpathDevice;
use crate::error::DeviceError;

/// The lightpath-relevant state a device reports on each query.
///
/// `inserted` and `removed` may both be true (inconsistent) or both false
/// (unknown); the type does not forbid it, [`classify`] sorts it out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightpathState {
    pub inserted: bool,
    pub removed: bool,
    /// Output branch name -> transmission fraction.
    pub output: BTreeMap<String, f64>,
}

impl LightpathState {
    pub fn new(inserted: bool, removed: bool) -> Self {
        Self {
            inserted,
            removed,
            output: BTreeMap::new(),
        }
    }

    /// Builder-style helper for adding an output branch.
    pub fn with_output(mut self, branch: impl Into<String>, transmission: f64) -> Self {
        self.output.insert(branch.into(), transmission);
        self
    }

    /// Output branches currently receiving any beam.
    pub fn active_outputs(&self) -> impl Iterator<Item = &str> {
        self.output
            .iter()
            .filter(|(_, t)| **t > 0.0)
            .map(|(b, _)| b.as_str())
    }
}

/// Derived device state. Never cached beyond a single evaluation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DeviceState {
    /// Removed from the beamline.
    Removed,
    /// Inserted; may or may not stop the beam.
    Inserted,
    /// Reporting neither inserted nor removed.
    Unknown,
    /// Reporting both inserted and removed.
    Inconsistent,
    /// Relevant signals unreachable.
    Disconnected,
    /// The device raised an error while reporting.
    Error,
}

impl DeviceState {
    /// States that stop the beam regardless of reported transmission.
    pub fn is_indeterminate(self) -> bool {
        matches!(self, Self::Unknown | Self::Disconnected | Self::Error)
    }

    fn from_flags(inserted: bool, removed: bool) -> Self {
        match (inserted, removed) {
            (true, false) => Self::Inserted,
            (false, true) => Self::Removed,
            (true, true) => Self::Inconsistent,
            (false, false) => Self::Unknown,
        }
    }
}

/// Result of a single classification: the state plus the raw report, when
/// one could be read.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub state: DeviceState,
    pub report: Option<LightpathState>,
}

/// Classify a device's current state.
///
/// Connectivity is checked first; a disconnected device is not queried
/// further. Any error from the state fetch maps to `Error` (or
/// `Disconnected` if the device says so). Nothing propagates to the caller.
pub fn classify(device: &dyn LightpathDevice) -> Classified {
    if !device.is_connected() {
        debug!(device = device.name(), "unable to connect to device");
        return Classified {
            state: DeviceState::Disconnected,
            report: None,
        };
    }

    match device.lightpath_state() {
        Ok(report) => {
            debug!(
                device = device.name(),
                inserted = report.inserted,
                removed = report.removed,
                "device reporting"
            );
            Classified {
                state: DeviceState::from_flags(report.inserted, report.removed),
                report: Some(report),
            }
        }
        Err(DeviceError::Disconnected { .. } | DeviceError::Timeout { .. }) => {
            warn!(device = device.name(), "connection lost while reading state");
            Classified {
                state: DeviceState::Disconnected,
                report: None,
            }
        }
        Err(e) => {
            warn!(device = device.name(), error = %e, "unable to determine device state");
            Classified {
                state: DeviceState::Error,
                report: None,
            }
        }
    }
}

/// Shorthand for [`classify`] when only the state matters.
pub fn device_state(device: &dyn LightpathDevice) -> DeviceState {
    classify(device).state
}
