// ── Core error types ──
//
// Construction-time structural problems (configuration, coordinates) are
// fatal and surface immediately. Per-device read failures never reach this
// module: the state model absorbs them into `DeviceState` values.

use std::time::Duration;

use thiserror::Error;

/// Routing errors raised at query time.
///
/// Callers are expected to catch these and degrade gracefully; they point at
/// either a physical misconfiguration or an ambiguity an operator must resolve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("device {device} reports multiple outputs along this path: {branches:?}")]
    MultipleOutputs {
        device: String,
        branches: Vec<String>,
    },

    #[error("node {node} has multiple valid successors: {candidates:?}")]
    AmbiguousSuccessor {
        node: String,
        candidates: Vec<String>,
    },

    #[error("no route found to {target}")]
    NoRoute { target: String },

    #[error("no candidate paths for destination {destination}")]
    NoCandidates { destination: String },
}

/// A member device reported a non-physical beamline position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("device {device} is reporting a non-existent beamline position ({z})")]
pub struct CoordinateError {
    pub device: String,
    pub z: f64,
}

/// Failures reported by a live device collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device {device} is disconnected")]
    Disconnected { device: String },

    #[error("device {device} timed out after {timeout:?}")]
    Timeout { device: String, timeout: Duration },

    #[error("device {device} failed: {message}")]
    Failed { device: String, message: String },

    #[error("device {device} could not be instantiated: {message}")]
    Instantiation { device: String, message: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors (fatal at assembly) ─────────────────────
    #[error("no lightpath devices found in the device catalog")]
    NoDevices,

    #[error("device {device} is missing {missing} branch metadata")]
    MissingBranches { device: String, missing: String },

    #[error("device catalog query failed: {message}")]
    Catalog { message: String },

    // ── Beam path construction ───────────────────────────────────────
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    #[error("a beam path must contain at least one device")]
    EmptyPath,

    #[error("split position {z} is not usable within path range ({start}, {end})")]
    InvalidSplit { z: f64, start: f64, end: f64 },

    // ── Query errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("destination {name} is not loaded")]
    UnknownDestination { name: String },

    // ── Operations ───────────────────────────────────────────────────
    #[error("timed out after {timeout:?} waiting for {device} to complete its motion")]
    OperationTimeout {
        device: String,
        timeout: Option<Duration>,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl CoreError {
    /// Whether the error indicates a routing problem rather than a fault.
    pub fn is_routing(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}
