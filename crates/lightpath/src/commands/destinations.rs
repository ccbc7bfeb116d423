//! Facility-wide views: where beam stops, and the live walk from each source.

use std::collections::BTreeMap;

use serde::Serialize;
use tabled::Tabled;

use lightpath_core::{Controller, DeviceState, LightpathDevice, device_state};

use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Stop {
    name: String,
    z: f64,
    state: DeviceState,
}

#[derive(Tabled)]
struct StopRow {
    #[tabled(rename = "Device")]
    name: String,
    #[tabled(rename = "Z")]
    z: String,
    #[tabled(rename = "State")]
    state: String,
}

pub fn handle(controller: &Controller, settings: &Resolved) -> Result<(), CliError> {
    let stops: Vec<Stop> = controller
        .destinations()
        .iter()
        .map(|d| Stop {
            name: d.name().to_owned(),
            z: d.z(),
            state: device_state(d.as_ref()),
        })
        .collect();
    let out = output::render_list(
        settings.output,
        &stops,
        |s| StopRow {
            name: s.name.clone(),
            z: format!("{:.3}", s.z),
            state: s.state.to_string(),
        },
        |s| s.name.clone(),
    )?;
    output::print_output(&out, settings.quiet);
    Ok(())
}

fn walk_detail(routes: &BTreeMap<String, Vec<String>>) -> String {
    routes
        .iter()
        .map(|(source, devices)| {
            if devices.is_empty() {
                format!("{source}: (no devices)")
            } else {
                format!("{source}: {}", devices.join(" -> "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn walk(controller: &Controller, settings: &Resolved) -> Result<(), CliError> {
    let routes = controller.walk()?;
    let out = output::render_single(settings.output, &routes, walk_detail, walk_detail)?;
    output::print_output(&out, settings.quiet);
    Ok(())
}
