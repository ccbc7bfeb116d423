//! Beam path modeling for branching photon beamline facilities.
//!
//! This crate turns a catalog of positioned devices into a routing model and
//! answers "where does the beam go right now" from live device state:
//!
//! - **Device model** ([`model`]): The [`LightpathDevice`] contract every
//!   hardware adapter implements, the optional [`MpsCapable`] capability,
//!   and [`classify`], which folds whatever a device reports (including
//!   read failures) into a [`DeviceState`].
//!
//! - **Facility graph** ([`graph`]): Per-branch graphs built from z-ordered
//!   devices and merged into one [`Facility`]. [`resolve_paths`] enumerates
//!   the static routes to a destination; [`walk`] follows the live beam.
//!
//! - **[`BeamPath`]**: An immutable, ordered route. Every query recomputes
//!   blocking devices, the impediment and incident devices from scratch.
//!   Paths can be cleared, split and joined, and publish change events on a
//!   `tokio::sync::broadcast` channel.
//!
//! - **[`Controller`]**: Composition root that loads the facility for a
//!   [`BeamlineConfig`] and picks the active path per destination.
//!
//! - **Simulation** ([`sim`]): In-memory devices and catalog for tests and
//!   offline use.

pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod model;
pub mod path;
pub mod sim;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BeamlineConfig, BranchTarget, DEFAULT_MINIMUM_TRANSMISSION};
pub use controller::Controller;
pub use error::{CoordinateError, CoreError, DeviceError, PathError};
pub use graph::{Facility, FacilityGraph, Route, UnavailableDevice, resolve_paths, walk};
pub use model::{
    DeviceCatalog, DeviceEvent, DeviceHandle, DeviceMetadata, DeviceState, LightpathDevice,
    LightpathState, MpsCapable, OperationHandle, RangeQuery, classify, device_state,
};
pub use path::{BeamPath, ClearOptions, DeviceSummary, PathEvent, SplitAt};
pub use sim::{SimCatalog, SimDevice, SimKind, SimStatus};
