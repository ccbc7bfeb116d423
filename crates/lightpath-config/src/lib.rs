//! Shared configuration for lightpath tools.
//!
//! TOML configuration (defaults + file + `LIGHTPATH_*` environment),
//! translation into the core's immutable [`BeamlineConfig`], and facility
//! description files that populate a simulated device catalog.

mod facility;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use lightpath_core::{BeamlineConfig, BranchTarget, DEFAULT_MINIMUM_TRANSMISSION};

pub use facility::{DeviceEntry, FacilityFile, MpsEntry, load_facility};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Facility description used when none is given on the command line.
    pub facility: Option<PathBuf>,

    /// Branches where beam enters the facility.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default = "default_minimum_transmission")]
    pub minimum_transmission: f64,

    /// Destination name -> the branches that reach it.
    #[serde(default)]
    pub destinations: BTreeMap<String, DestinationSpec>,

    /// Global CLI defaults.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            facility: None,
            sources: vec!["K0".into(), "L0".into()],
            minimum_transmission: DEFAULT_MINIMUM_TRANSMISSION,
            destinations: lcls_destinations(),
            defaults: Defaults::default(),
        }
    }
}

/// Branches for one destination: either a plain list, or a table of
/// branch -> maximum z at which the destination's route ends.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DestinationSpec {
    Branches(Vec<String>),
    Cutoffs(BTreeMap<String, Option<f64>>),
}

impl DestinationSpec {
    pub fn targets(&self) -> Vec<BranchTarget> {
        match self {
            Self::Branches(branches) => branches.iter().map(BranchTarget::new).collect(),
            Self::Cutoffs(cutoffs) => cutoffs
                .iter()
                .map(|(branch, max_z)| BranchTarget {
                    branch: branch.clone(),
                    max_z: *max_z,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for device motions.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_minimum_transmission() -> f64 {
    DEFAULT_MINIMUM_TRANSMISSION
}

/// The LCLS hutch layout.
fn lcls_destinations() -> BTreeMap<String, DestinationSpec> {
    [
        ("XPP", &["L0", "L2"][..]),
        ("XCS", &["L3"][..]),
        ("MFX", &["L5"][..]),
        ("CXI", &["L0"][..]),
        ("MEC", &["L4"][..]),
        ("TMO", &["K4"][..]),
        ("CRIX", &["K1"][..]),
        ("qRIX", &["K2"][..]),
        ("TXI", &["K3", "L1"][..]),
    ]
    .into_iter()
    .map(|(name, branches)| {
        (
            name.to_owned(),
            DestinationSpec::Branches(branches.iter().map(|b| (*b).to_owned()).collect()),
        )
    })
    .collect()
}

impl Config {
    /// Validate and convert into the core's runtime configuration.
    pub fn to_beamline_config(&self) -> Result<BeamlineConfig, ConfigError> {
        if !(0.0..=1.0).contains(&self.minimum_transmission) {
            return Err(ConfigError::Validation {
                field: "minimum_transmission".into(),
                reason: format!("expected a value in [0, 1], got {}", self.minimum_transmission),
            });
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Validation {
                field: "sources".into(),
                reason: "at least one source branch is required".into(),
            });
        }
        Ok(BeamlineConfig {
            sources: self.sources.clone(),
            minimum_transmission: self.minimum_transmission,
            destinations: self
                .destinations
                .iter()
                .map(|(name, spec)| (name.clone(), spec.targets()))
                .collect(),
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "pcdshub", "lightpath").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lightpath");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: defaults, then the TOML file, then the environment.
///
/// Nested keys use a double underscore, e.g. `LIGHTPATH_DEFAULTS__OUTPUT`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIGHTPATH_").split("__"))
}

/// Load the config from `path`, or the platform config path if `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading configuration");
    Ok(figment(&path).extract()?)
}
