//! Command dispatch: bridges CLI args -> controller queries -> output formatting.

pub mod config_cmd;
pub mod destinations;
pub mod devices;
pub mod paths;
pub mod util;

use std::time::Duration;

use tracing::info;

use lightpath_core::{Controller, LightpathDevice, SimCatalog};

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a facility-bound command to the appropriate handler.
pub fn dispatch(cmd: Command, controller: &Controller, settings: &Resolved) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, &args, settings),
        Command::Paths(args) => paths::list(controller, args.destination.as_deref(), settings),
        Command::Status(args) => paths::status(controller, &args.destination, settings),
        Command::PathTo(args) => paths::path_to(controller, &args.device, settings),
        Command::Destinations => destinations::handle(controller, settings),
        Command::Walk => destinations::walk(controller, settings),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Apply `--insert` / `--remove` to the simulated devices, waiting for each
/// motion to finish.
pub fn simulate(
    catalog: &SimCatalog,
    global: &GlobalOpts,
    timeout: Duration,
) -> Result<(), CliError> {
    let moves = global
        .insert
        .iter()
        .map(|name| (name, true))
        .chain(global.remove.iter().map(|name| (name, false)));

    for (name, insert) in moves {
        let device = catalog
            .device(name)
            .ok_or_else(|| util::device_not_found(name))?;
        let operation = if insert {
            device.insert(Some(timeout))?
        } else {
            device.remove(Some(timeout))?
        };
        operation.wait_until_done(Some(timeout))?;
        info!(device = %name, inserted = insert, "simulated motion complete");
    }
    Ok(())
}
