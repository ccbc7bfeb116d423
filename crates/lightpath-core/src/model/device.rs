// ── Device collaborator interfaces ──
//
// The core never talks to control hardware directly. Anything that can
// report a lightpath state implements `LightpathDevice`; optional
// capabilities are separate traits reached through explicit queries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::state::LightpathState;
use crate::error::DeviceError;

/// Shared handle to a live device.
pub type DeviceHandle = Arc<dyn LightpathDevice>;

/// Identifies one registered change callback on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionId(pub u64);

/// A device's aggregate lightpath state changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEvent {
    pub device: String,
    pub z: f64,
}

/// Callback registered with a device for change notification.
pub type DeviceCallback = Arc<dyn Fn(&DeviceEvent) + Send + Sync>;

/// A pending insert/remove motion.
pub trait OperationHandle: Send + fmt::Debug {
    /// Block until the operation finishes or `timeout` elapses.
    fn wait_until_done(&self, timeout: Option<Duration>) -> Result<(), DeviceError>;

    /// Whether the operation has already finished.
    fn done(&self) -> bool;
}

/// Machine protection system reporting, available on some devices.
pub trait MpsCapable: Send + Sync {
    /// Whether the device is currently faulted. A bypassed device never is.
    fn faulted(&self) -> Result<bool, DeviceError>;

    fn bypassed(&self) -> bool;

    /// Whether an inserted device of this kind protects everything downstream.
    fn veto_capable(&self) -> bool;
}

/// The contract every beamline device adapter implements.
pub trait LightpathDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Position along the facility.
    fn z(&self) -> f64;

    fn input_branches(&self) -> &[String];

    fn output_branches(&self) -> &[String];

    /// Whether the signals needed for `lightpath_state` are reachable.
    fn is_connected(&self) -> bool;

    fn lightpath_state(&self) -> Result<LightpathState, DeviceError>;

    fn subscribe(&self, callback: DeviceCallback) -> Result<SubscriptionId, DeviceError>;

    fn unsubscribe(&self, id: SubscriptionId);

    fn insert(&self, timeout: Option<Duration>) -> Result<Box<dyn OperationHandle>, DeviceError>;

    fn remove(&self, timeout: Option<Duration>) -> Result<Box<dyn OperationHandle>, DeviceError>;

    /// Optional MPS capability.
    fn mps(&self) -> Option<&dyn MpsCapable> {
        None
    }

    /// Devices that can send beam onto more than one branch.
    fn is_branching(&self) -> bool {
        self.output_branches().len() > 1
    }

    fn accepts(&self, branch: &str) -> bool {
        self.input_branches().iter().any(|b| b == branch)
    }

    fn emits(&self, branch: &str) -> bool {
        self.output_branches().iter().any(|b| b == branch)
    }
}

impl fmt::Debug for dyn LightpathDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightpathDevice")
            .field("name", &self.name())
            .field("z", &self.z())
            .finish_non_exhaustive()
    }
}

/// An operation that finished before it was returned.
#[derive(Debug, Default)]
pub struct CompletedOperation;

impl OperationHandle for CompletedOperation {
    fn wait_until_done(&self, _timeout: Option<Duration>) -> Result<(), DeviceError> {
        Ok(())
    }

    fn done(&self) -> bool {
        true
    }
}

/// Whether two handles refer to the same device. Devices are keyed by name.
pub fn same_device(a: &dyn LightpathDevice, b: &dyn LightpathDevice) -> bool {
    a.name() == b.name()
}

/// Device names, in order, for logging and comparisons.
pub fn names(devices: &[DeviceHandle]) -> Vec<String> {
    devices.iter().map(|d| d.name().to_owned()).collect()
}
