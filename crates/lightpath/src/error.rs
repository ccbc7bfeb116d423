//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use lightpath_config::ConfigError;
use lightpath_core::{CoreError, DeviceError, PathError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFIG: i32 = 5;
    pub const ROUTING: i32 = 6;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Facility ─────────────────────────────────────────────────────

    #[error("No facility description configured")]
    #[diagnostic(
        code(lightpath::no_facility),
        help(
            "Pass one with --facility <FILE>, or set `facility` in {path}\n\
             (LIGHTPATH_FACILITY also works)."
        )
    )]
    NoFacility { path: String },

    #[error("Facility could not be loaded: {message}")]
    #[diagnostic(
        code(lightpath::facility),
        help("Check the device positions and branch metadata in the facility file.")
    )]
    Facility { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(lightpath::not_found),
        help("Run: lightpath {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Routing ──────────────────────────────────────────────────────

    #[error("Routing error: {0}")]
    #[diagnostic(
        code(lightpath::routing),
        help(
            "The beam route is ambiguous or missing. Check the branching devices\n\
             along the path: run lightpath walk -v for details."
        )
    )]
    Routing(#[from] PathError),

    // ── Devices ──────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(lightpath::device))]
    Device(DeviceError),

    #[error("Timed out waiting for {device}")]
    #[diagnostic(
        code(lightpath::timeout),
        help("Increase `defaults.timeout` in the config file.")
    )]
    Timeout { device: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lightpath::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(lightpath::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON output: {0}")]
    #[diagnostic(code(lightpath::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML output: {0}")]
    #[diagnostic(code(lightpath::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::NoFacility { .. } | Self::Facility { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Routing(_) => exit_code::ROUTING,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Device(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<DeviceError> for CliError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Timeout { device, .. } => CliError::Timeout { device },
            other => CliError::Device(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Path(err) => CliError::Routing(err),

            CoreError::DeviceNotFound { name } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: name,
                list_command: "devices".into(),
            },

            CoreError::UnknownDestination { name } => CliError::NotFound {
                resource_type: "destination".into(),
                identifier: name,
                list_command: "paths".into(),
            },

            CoreError::OperationTimeout { device, .. } => CliError::Timeout { device },

            CoreError::Device(err) => err.into(),

            err @ (CoreError::EmptyPath | CoreError::InvalidSplit { .. }) => {
                CliError::Validation {
                    field: "path".into(),
                    reason: err.to_string(),
                }
            }

            err @ (CoreError::NoDevices
            | CoreError::MissingBranches { .. }
            | CoreError::Catalog { .. }
            | CoreError::Coordinate(_)) => CliError::Facility {
                message: err.to_string(),
            },
        }
    }
}
