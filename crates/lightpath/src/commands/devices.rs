//! Device command handlers.

use serde::Serialize;
use tabled::Tabled;

use lightpath_core::{
    Controller, DeviceHandle, DeviceState, LightpathDevice, UnavailableDevice, device_state,
};

use crate::cli::DevicesArgs;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DeviceInfo {
    name: String,
    z: f64,
    input_branches: Vec<String>,
    output_branches: Vec<String>,
    state: DeviceState,
    veto: bool,
}

impl From<&DeviceHandle> for DeviceInfo {
    fn from(d: &DeviceHandle) -> Self {
        Self {
            name: d.name().to_owned(),
            z: d.z(),
            input_branches: d.input_branches().to_vec(),
            output_branches: d.output_branches().to_vec(),
            state: device_state(d.as_ref()),
            veto: d.mps().is_some_and(|m| m.veto_capable()),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Z")]
    z: String,
    #[tabled(rename = "Inputs")]
    inputs: String,
    #[tabled(rename = "Outputs")]
    outputs: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Veto")]
    veto: String,
}

impl From<&DeviceInfo> for DeviceRow {
    fn from(d: &DeviceInfo) -> Self {
        Self {
            name: d.name.clone(),
            z: format!("{:.3}", d.z),
            inputs: util::branches(&d.input_branches),
            outputs: util::branches(&d.output_branches),
            state: d.state.to_string(),
            veto: if d.veto { "yes".into() } else { String::new() },
        }
    }
}

#[derive(Tabled)]
struct UnavailableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Z")]
    z: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&UnavailableDevice> for UnavailableRow {
    fn from(d: &UnavailableDevice) -> Self {
        Self {
            name: d.name.clone(),
            z: format!("{:.3}", d.z),
            reason: d.reason.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: &DevicesArgs,
    settings: &Resolved,
) -> Result<(), CliError> {
    let out = if args.unavailable {
        output::render_list(
            settings.output,
            controller.unavailable(),
            |d| UnavailableRow::from(d),
            |d| d.name.clone(),
        )?
    } else {
        let devices: Vec<DeviceInfo> = controller.devices().iter().map(DeviceInfo::from).collect();
        output::render_list(
            settings.output,
            &devices,
            |d| DeviceRow::from(d),
            |d| d.name.clone(),
        )?
    };
    output::print_output(&out, settings.quiet);
    Ok(())
}
