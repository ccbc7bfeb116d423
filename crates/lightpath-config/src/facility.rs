// ── Facility description files ──
//
// A TOML list of devices with their positions, branches and initial state.
// Loaded into a simulated catalog so tools can explore a facility layout
// without live hardware.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lightpath_core::{DeviceMetadata, SimCatalog, SimDevice, SimKind, SimStatus};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FacilityFile {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub name: String,
    pub z: f64,
    #[serde(default)]
    pub input_branches: Vec<String>,
    #[serde(default)]
    pub output_branches: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: SimKind,
    /// Overrides the kind's default transmission when inserted.
    pub transmission: Option<f64>,
    #[serde(default = "default_state")]
    pub state: SimStatus,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub lightpath: bool,
    pub mps: Option<MpsEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct MpsEntry {
    #[serde(default)]
    pub veto: bool,
    #[serde(default)]
    pub bypassed: bool,
}

fn default_kind() -> SimKind {
    SimKind::Valve
}
fn default_state() -> SimStatus {
    SimStatus::Removed
}
fn default_true() -> bool {
    true
}

impl DeviceEntry {
    fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            name: self.name.clone(),
            z: self.z,
            input_branches: self.input_branches.clone(),
            output_branches: self.output_branches.clone(),
            active: self.active,
            lightpath: self.lightpath,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.transmission {
            Some(t) if !(0.0..=1.0).contains(&t) => Err(ConfigError::Validation {
                field: format!("devices.{}.transmission", self.name),
                reason: format!("expected a value in [0, 1], got {t}"),
            }),
            _ => Ok(()),
        }
    }

    fn build(&self) -> SimDevice {
        let metadata = self.metadata();
        let mut device = SimDevice::from_metadata(&metadata, self.kind);
        if let Some(mps) = self.mps {
            device = device.with_mps(mps.veto);
            device.set_bypassed(mps.bypassed);
        }
        if let Some(t) = self.transmission {
            device.set_transmission(t);
        }
        device.set_status(self.state);
        device
    }
}

impl FacilityFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a catalog holding one simulated device per entry.
    ///
    /// Device names must be unique.
    pub fn to_catalog(&self) -> Result<SimCatalog, ConfigError> {
        let mut catalog = SimCatalog::new();
        for entry in &self.devices {
            entry.validate()?;
            if catalog.device(&entry.name).is_some() {
                return Err(ConfigError::Validation {
                    field: "devices".into(),
                    reason: format!("duplicate device name '{}'", entry.name),
                });
            }
            debug!(device = %entry.name, kind = %entry.kind, state = %entry.state, "adding device");
            catalog.add_record(entry.metadata(), entry.build());
        }
        Ok(catalog)
    }
}

/// Read a facility file into a simulated catalog.
pub fn load_facility(path: &Path) -> Result<SimCatalog, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let catalog = FacilityFile::parse(&text, path)?.to_catalog()?;
    info!(path = %path.display(), devices = catalog.len(), "loaded facility description");
    Ok(catalog)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use lightpath_core::{DeviceCatalog, LightpathDevice, RangeQuery};

    use super::*;

    const SAMPLE: &str = r#"
        [[devices]]
        name = "valve"
        z = 5.0
        input_branches = ["L0"]
        output_branches = ["L0"]

        [[devices]]
        name = "mirror"
        z = 10.0
        input_branches = ["L0"]
        output_branches = ["L0", "L2"]
        kind = "mirror"
        state = "inserted"

        [[devices]]
        name = "yag"
        z = 12.0
        input_branches = ["L2"]
        output_branches = ["L2"]
        kind = "passive"
        transmission = 0.3
        mps = { veto = false, bypassed = true }

        [[devices]]
        name = "retired"
        z = 15.0
        input_branches = ["L2"]
        output_branches = ["L2"]
        active = false
    "#;

    fn sample() -> SimCatalog {
        FacilityFile::parse(SAMPLE, Path::new("sample.toml"))
            .unwrap()
            .to_catalog()
            .unwrap()
    }

    #[test]
    fn entries_become_simulated_devices() {
        let catalog = sample();
        assert_eq!(catalog.len(), 4);

        let mirror = catalog.device("mirror").unwrap();
        assert_eq!(mirror.kind(), SimKind::Mirror);
        assert_eq!(mirror.status(), SimStatus::Inserted);
        assert_eq!(mirror.lightpath_state().unwrap().output.get("L2"), Some(&1.0));

        let yag = catalog.device("yag").unwrap();
        assert!(yag.mps().unwrap().bypassed());
        yag.insert(None).unwrap();
        assert_eq!(yag.lightpath_state().unwrap().output.get("L2"), Some(&0.3));
    }

    #[test]
    fn inactive_entries_are_filtered_by_queries() {
        let records = sample().search_range(&RangeQuery::facility()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["valve", "mirror", "yag"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let file = FacilityFile {
            devices: vec![
                FacilityFile::parse(SAMPLE, Path::new("x")).unwrap().devices[0].clone(),
                FacilityFile::parse(SAMPLE, Path::new("x")).unwrap().devices[0].clone(),
            ],
        };
        assert!(matches!(
            file.to_catalog(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = FacilityFile::parse("[[devices]]\nname = 3", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
