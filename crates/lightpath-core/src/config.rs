// ── Runtime beamline configuration ──
//
// Immutable description of where beam enters the facility and which
// branches make up each destination. Built by the config crate (or by
// hand) and handed to the controller; never read from disk here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default minimum transmission for a path to count as clear.
pub const DEFAULT_MINIMUM_TRANSMISSION: f64 = 0.1;

/// A branch a destination is reached through, optionally cut at `max_z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchTarget {
    pub branch: String,
    /// Routes are truncated after this position, letting one branch serve
    /// two destinations at different depths.
    pub max_z: Option<f64>,
}

impl BranchTarget {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            max_z: None,
        }
    }

    pub fn until(branch: impl Into<String>, max_z: f64) -> Self {
        Self {
            branch: branch.into(),
            max_z: Some(max_z),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamlineConfig {
    /// Branches where beam is produced.
    pub sources: Vec<String>,
    pub minimum_transmission: f64,
    /// Destination name -> branches that reach it.
    pub destinations: BTreeMap<String, Vec<BranchTarget>>,
}

impl Default for BeamlineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            minimum_transmission: DEFAULT_MINIMUM_TRANSMISSION,
            destinations: BTreeMap::new(),
        }
    }
}

impl BeamlineConfig {
    pub fn new(sources: &[&str]) -> Self {
        Self {
            sources: sources.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }

    /// Add a destination reached through the given branches, no cutoffs.
    pub fn with_destination(mut self, name: &str, branches: &[&str]) -> Self {
        self.destinations.insert(
            name.to_owned(),
            branches.iter().map(|b| BranchTarget::new(*b)).collect(),
        );
        self
    }

    pub fn with_targets(mut self, name: &str, targets: Vec<BranchTarget>) -> Self {
        self.destinations.insert(name.to_owned(), targets);
        self
    }

    pub fn with_minimum_transmission(mut self, minimum: f64) -> Self {
        self.minimum_transmission = minimum;
        self
    }

    pub fn targets(&self, destination: &str) -> Option<&[BranchTarget]> {
        self.destinations.get(destination).map(Vec::as_slice)
    }
}
