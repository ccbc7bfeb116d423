//! CLI configuration -- thin wrapper around `lightpath_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--facility,
//! --output, --color).

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use lightpath_core::SimCatalog;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use lightpath_config::{Config, config_path, load_config, load_facility};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Settings after merging flags over the config file.
#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub timeout: Duration,
}

/// Load the config file named by `--config`, or the platform default.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config(global.config.as_deref())?)
}

/// Flag > config file > built-in default.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let output = match global.output {
        Some(format) => format,
        None => parse_enum("defaults.output", &config.defaults.output)?,
    };
    let color = match global.color {
        Some(mode) => mode,
        None => parse_enum::<ColorMode>("defaults.color", &config.defaults.color)?,
    };
    Ok(Resolved {
        output,
        color: crate::output::should_color(color),
        quiet: global.quiet,
        timeout: Duration::from_secs(config.defaults.timeout),
    })
}

/// The facility file to load: `--facility` wins over the config file.
pub fn facility_path(global: &GlobalOpts, config: &Config) -> Result<PathBuf, CliError> {
    global
        .facility
        .clone()
        .or_else(|| config.facility.clone())
        .ok_or_else(|| CliError::NoFacility {
            path: global
                .config
                .clone()
                .unwrap_or_else(config_path)
                .display()
                .to_string(),
        })
}

/// Load the facility description into a simulated catalog.
pub fn load_catalog(global: &GlobalOpts, config: &Config) -> Result<SimCatalog, CliError> {
    let path = facility_path(global, config)?;
    Ok(load_facility(&path)?)
}

fn parse_enum<T: ValueEnum>(field: &str, value: &str) -> Result<T, CliError> {
    T::from_str(value, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}
