// ── Device catalog interface ──
//
// The catalog is a happi-like database of device metadata. The core only
// asks it for records in a z range and for live handles to those records.

use serde::{Deserialize, Serialize};

use super::device::DeviceHandle;
use crate::error::{CoreError, DeviceError};

/// Metadata a catalog holds for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub name: String,
    pub z: f64,
    #[serde(default)]
    pub input_branches: Vec<String>,
    #[serde(default)]
    pub output_branches: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub lightpath: bool,
}

fn default_true() -> bool {
    true
}

impl DeviceMetadata {
    pub fn new(
        name: impl Into<String>,
        z: f64,
        input_branches: &[&str],
        output_branches: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            z,
            input_branches: input_branches.iter().map(|s| (*s).to_owned()).collect(),
            output_branches: output_branches.iter().map(|s| (*s).to_owned()).collect(),
            active: true,
            lightpath: true,
        }
    }

    /// A record without branch metadata is a configuration error.
    pub fn validate(&self) -> Result<(), CoreError> {
        let missing = match (
            self.input_branches.is_empty(),
            self.output_branches.is_empty(),
        ) {
            (true, true) => "input and output",
            (true, false) => "input",
            (false, true) => "output",
            (false, false) => return Ok(()),
        };
        Err(CoreError::MissingBranches {
            device: self.name.clone(),
            missing: missing.into(),
        })
    }

    /// Every branch the device touches, inputs first.
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.input_branches
            .iter()
            .chain(self.output_branches.iter())
            .map(String::as_str)
    }
}

/// Query parameters for a catalog range search.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub start: f64,
    pub end: f64,
    pub active_only: bool,
    pub lightpath_only: bool,
}

impl RangeQuery {
    /// Every active lightpath device in the facility.
    pub fn facility() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
            active_only: true,
            lightpath_only: true,
        }
    }

    pub fn matches(&self, md: &DeviceMetadata) -> bool {
        md.z >= self.start
            && md.z <= self.end
            && (!self.active_only || md.active)
            && (!self.lightpath_only || md.lightpath)
    }
}

/// Source of device records and live device handles.
pub trait DeviceCatalog {
    fn search_range(&self, query: &RangeQuery) -> Result<Vec<DeviceMetadata>, CoreError>;

    fn instantiate(&self, record: &DeviceMetadata) -> Result<DeviceHandle, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_missing_side() {
        let mut md = DeviceMetadata::new("m1", 1.0, &["L0"], &[]);
        let err = md.validate().map_err(|e| e.to_string());
        assert_eq!(
            err,
            Err("device m1 is missing output branch metadata".to_string())
        );
        md.output_branches.push("L1".into());
        assert!(md.validate().is_ok());
    }

    #[test]
    fn facility_query_filters_inactive() {
        let q = RangeQuery::facility();
        let mut md = DeviceMetadata::new("d", 3.0, &["L0"], &["L0"]);
        assert!(q.matches(&md));
        md.active = false;
        assert!(!q.matches(&md));
    }
}
