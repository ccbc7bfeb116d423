//! Shared helpers for command handlers.

use lightpath_core::{DeviceHandle, LightpathDevice};

use crate::error::CliError;

pub fn device_not_found(name: &str) -> CliError {
    CliError::NotFound {
        resource_type: "device".into(),
        identifier: name.into(),
        list_command: "devices".into(),
    }
}

/// Comma-separated branch list for table cells.
pub fn branches(list: &[String]) -> String {
    list.join(", ")
}

pub fn names(devices: &[DeviceHandle]) -> Vec<String> {
    devices.iter().map(|d| d.name().to_owned()).collect()
}

/// `-` for empty, otherwise a comma-separated list.
pub fn or_dash(list: &[String]) -> String {
    if list.is_empty() {
        "-".into()
    } else {
        list.join(", ")
    }
}
