//! Path command handlers: candidate listing, destination status, path-to.

use serde::Serialize;
use tabled::Tabled;

use lightpath_core::{BeamPath, Controller, DeviceSummary, LightpathDevice};

use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Candidate listing ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PathInfo {
    destination: String,
    index: usize,
    active: bool,
    devices: usize,
    start: f64,
    end: f64,
    impediment: Option<String>,
    error: Option<String>,
}

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Devices")]
    devices: usize,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Impediment")]
    impediment: String,
}

impl From<&PathInfo> for PathRow {
    fn from(p: &PathInfo) -> Self {
        let impediment = match (&p.impediment, &p.error) {
            (_, Some(err)) => format!("error: {err}"),
            (Some(name), None) => name.clone(),
            (None, None) => "-".into(),
        };
        Self {
            destination: p.destination.clone(),
            index: p.index,
            active: if p.active { "*".into() } else { String::new() },
            devices: p.devices,
            range: format!("{:.3} - {:.3}", p.start, p.end),
            impediment,
        }
    }
}

fn path_info(destination: &str, index: usize, path: &BeamPath, active: bool) -> PathInfo {
    let (start, end) = path.range();
    let (impediment, error) = match path.impediment() {
        Ok(found) => (found.map(|d| d.name().to_owned()), None),
        Err(e) => (None, Some(e.to_string())),
    };
    PathInfo {
        destination: destination.to_owned(),
        index,
        active,
        devices: path.devices().len(),
        start,
        end,
        impediment,
        error,
    }
}

pub fn list(
    controller: &Controller,
    destination: Option<&str>,
    settings: &Resolved,
) -> Result<(), CliError> {
    let names: Vec<String> = match destination {
        Some(name) => vec![name.to_owned()],
        None => controller
            .destination_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    };

    let mut rows = Vec::new();
    for name in &names {
        let candidates = controller.candidates(name)?;
        let active = controller.active_path(name).ok();
        rows.extend(candidates.iter().enumerate().map(|(index, path)| {
            path_info(name, index, path, active.as_ref() == Some(path))
        }));
    }

    let out = output::render_list(
        settings.output,
        &rows,
        |p| PathRow::from(p),
        |p| format!("{} {}", p.destination, p.index),
    )?;
    output::print_output(&out, settings.quiet);
    Ok(())
}

// ── Path status ─────────────────────────────────────────────────────

/// Everything worth knowing about one path right now.
#[derive(Debug, Serialize)]
struct PathReport {
    name: String,
    cleared: bool,
    impediment: Option<String>,
    blocking: Vec<String>,
    incident: Vec<String>,
    tripped: Vec<String>,
    devices: Vec<DeviceSummary>,
}

impl PathReport {
    fn build(name: &str, path: &BeamPath) -> Result<Self, CliError> {
        let impediment = path.impediment()?;
        Ok(Self {
            name: name.to_owned(),
            cleared: impediment.is_none(),
            impediment: impediment.map(|d| d.name().to_owned()),
            blocking: util::names(&path.blocking_devices()?),
            incident: util::names(&path.incident_devices()?),
            tripped: util::names(&path.tripped_devices()),
            devices: path.summary()?,
        })
    }

    fn detail(&self, color: bool) -> String {
        let verdict = match &self.impediment {
            None => output::verdict("CLEAR", true, color),
            Some(device) => output::verdict(&format!("BLOCKED at {device}"), false, color),
        };
        let rows: Vec<SummaryRow> = self.devices.iter().map(SummaryRow::from).collect();
        let mut lines = vec![
            format!("Path:      {}", self.name),
            format!("Beam:      {verdict}"),
            format!("Blocking:  {}", util::or_dash(&self.blocking)),
            format!("Incident:  {}", util::or_dash(&self.incident)),
        ];
        if !self.tripped.is_empty() {
            lines.push(format!(
                "Tripped:   {}",
                output::verdict(&self.tripped.join(", "), false, color)
            ));
        }
        lines.push(output::render_table(&rows));
        lines.join("\n")
    }
}

#[derive(Tabled)]
struct SummaryRow {
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
    #[tabled(rename = "Blocking")]
    blocking: String,
}

impl From<&DeviceSummary> for SummaryRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            name: d.name.clone(),
            z: format!("{:.3}", d.z),
            inputs: util::branches(&d.input_branches),
            outputs: util::branches(&d.output_branches),
            state: d.state.to_string(),
            blocking: if d.blocking { "yes".into() } else { String::new() },
        }
    }
}

fn print_report(report: &PathReport, settings: &Resolved) -> Result<(), CliError> {
    let out = output::render_single(
        settings.output,
        report,
        |r| r.detail(settings.color),
        |r| r.impediment.clone().unwrap_or_else(|| "clear".into()),
    )?;
    output::print_output(&out, settings.quiet);
    Ok(())
}

pub fn status(
    controller: &Controller,
    destination: &str,
    settings: &Resolved,
) -> Result<(), CliError> {
    let path = controller.active_path(destination)?;
    print_report(&PathReport::build(destination, &path)?, settings)
}

pub fn path_to(controller: &Controller, device: &str, settings: &Resolved) -> Result<(), CliError> {
    let path = controller.path_to(device)?;
    print_report(&PathReport::build(device, &path)?, settings)
}
