// ── Path operations ──
//
// Commands that act on member devices (clear) and constructors that derive
// new paths from existing ones (split, join).

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::BeamPath;
use crate::error::{CoreError, DeviceError};
use crate::model::{DeviceHandle, DeviceState, OperationHandle, classify};

/// Options for [`BeamPath::clear`].
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    /// Also remove inserted devices that still pass enough beam.
    pub passive: bool,
    /// Device names to leave alone.
    pub ignore: Vec<String>,
    /// Block until every removal completes.
    pub wait: bool,
    pub timeout: Option<Duration>,
}

/// A removal that was requested from a device.
pub struct PendingRemoval {
    pub device: String,
    pub operation: Box<dyn OperationHandle>,
}

impl fmt::Debug for PendingRemoval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRemoval")
            .field("device", &self.device)
            .field("done", &self.operation.done())
            .finish()
    }
}

/// Where to cut a path in two.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitAt {
    Z(f64),
    /// Cut just after the named member.
    Device(String),
}

impl BeamPath {
    /// Remove everything obstructing the beam.
    ///
    /// Only devices that are inserted or in an unknown state are commanded.
    /// With `wait`, a motion that does not finish within the timeout is
    /// returned as [`CoreError::OperationTimeout`].
    pub fn clear(&self, options: &ClearOptions) -> Result<Vec<PendingRemoval>, CoreError> {
        info!(path = ?self.name(), "clearing beam path");
        let targets = self.clear_targets(options)?;

        let mut pending = Vec::new();
        for device in targets {
            let state = classify(device.as_ref()).state;
            if !matches!(state, DeviceState::Inserted | DeviceState::Unknown) {
                continue;
            }
            debug!(device = device.name(), %state, "removing device");
            let operation = device.remove(options.timeout)?;
            pending.push(PendingRemoval {
                device: device.name().to_owned(),
                operation,
            });
        }

        if options.wait {
            info!(path = ?self.name(), count = pending.len(), "waiting for devices to be removed");
            for removal in &pending {
                match removal.operation.wait_until_done(options.timeout) {
                    Ok(()) => debug!(device = %removal.device, "removal completed"),
                    Err(DeviceError::Timeout { .. }) => {
                        warn!(device = %removal.device, timeout = ?options.timeout, "timed out waiting for removal");
                        return Err(CoreError::OperationTimeout {
                            device: removal.device.clone(),
                            timeout: options.timeout,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(pending)
    }

    /// Members `clear` would act on: everything not ignored and, unless
    /// `passive` is set, not already passing enough beam.
    fn clear_targets(&self, options: &ClearOptions) -> Result<Vec<DeviceHandle>, CoreError> {
        let mut ignored: BTreeSet<&str> = options.ignore.iter().map(String::as_str).collect();
        if !options.passive {
            for (position, device) in self.devices().iter().enumerate() {
                let Ok(report) = device.lightpath_state() else {
                    continue;
                };
                let passing = self
                    .inner
                    .matched_output(position, &report)?
                    .is_some_and(|(_, t)| t > self.minimum_transmission());
                if passing {
                    ignored.insert(device.name());
                }
            }
        }
        debug!(ignored = ?ignored, "assembled clear targets");
        Ok(self
            .devices()
            .iter()
            .filter(|d| !ignored.contains(d.name()))
            .cloned()
            .collect())
    }

    /// Cut the path in two: members at or before the cut, and after it.
    ///
    /// Both halves keep this path's name and threshold. A cut outside the
    /// path range, or one that would leave a half empty, is rejected.
    pub fn split(&self, at: &SplitAt) -> Result<(Self, Self), CoreError> {
        let z = match at {
            SplitAt::Z(z) => *z,
            SplitAt::Device(name) => self
                .device(name)
                .map(|d| d.z())
                .ok_or_else(|| CoreError::DeviceNotFound { name: name.clone() })?,
        };
        let (start, end) = self.range();
        let invalid = || CoreError::InvalidSplit { z, start, end };
        if z.is_nan() || z < start || z > end {
            return Err(invalid());
        }

        let (upstream, downstream): (Vec<DeviceHandle>, Vec<DeviceHandle>) =
            self.devices().iter().cloned().partition(|d| d.z() <= z);
        if upstream.is_empty() || downstream.is_empty() {
            return Err(invalid());
        }
        let name = self.name().map(str::to_owned);
        Ok((
            Self::with_options(upstream, self.minimum_transmission(), name.clone())?,
            Self::with_options(downstream, self.minimum_transmission(), name)?,
        ))
    }

    /// Combine this path with others, keeping this path's name.
    pub fn join(&self, others: &[&Self]) -> Result<Self, CoreError> {
        let mut all = vec![self];
        all.extend_from_slice(others);
        Self::from_join(&all, self.name().map(str::to_owned))
    }

    /// One path containing every distinct member of `paths`.
    pub fn from_join(paths: &[&Self], name: Option<String>) -> Result<Self, CoreError> {
        let mut seen = BTreeSet::new();
        let devices: Vec<DeviceHandle> = paths
            .iter()
            .flat_map(|p| p.devices().iter())
            .filter(|d| seen.insert(d.name().to_owned()))
            .cloned()
            .collect();
        let minimum = paths
            .first()
            .map_or(crate::config::DEFAULT_MINIMUM_TRANSMISSION, |p| {
                p.minimum_transmission()
            });
        Self::with_options(devices, minimum, name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::branch::handles;
    use crate::model::LightpathDevice;
    use crate::sim::{SimDevice, SimKind, SimStatus};

    fn devices() -> Vec<Arc<SimDevice>> {
        [
            ("v0", 0.0, SimKind::Valve),
            ("v1", 2.0, SimKind::Valve),
            ("yag", 9.0, SimKind::Passive),
            ("v2", 15.0, SimKind::Valve),
        ]
        .into_iter()
        .map(|(n, z, k)| Arc::new(SimDevice::new(n, z, &["TST"], &["TST"], k)))
        .collect()
    }

    fn path(devices: &[Arc<SimDevice>]) -> BeamPath {
        BeamPath::with_options(handles(devices), 0.1, Some("TST".into())).unwrap()
    }

    fn name_set(path: &BeamPath) -> BTreeSet<String> {
        path.names().into_iter().collect()
    }

    #[test]
    fn clear_removes_blocking_devices_and_skips_passive() {
        let devs = devices();
        let p = path(&devs);
        for d in &devs {
            d.insert(None).unwrap();
        }

        let pending = p.clear(&ClearOptions::default()).unwrap();
        let removed: Vec<_> = pending.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(removed, vec!["v0", "v1", "v2"]);
        assert_eq!(devs[2].status(), SimStatus::Inserted);
        assert!(p.cleared().unwrap());
    }

    #[test]
    fn clear_passive_and_ignore() {
        let devs = devices();
        let p = path(&devs);
        for d in &devs {
            d.insert(None).unwrap();
        }

        let options = ClearOptions {
            passive: true,
            ignore: vec!["v2".into()],
            ..ClearOptions::default()
        };
        p.clear(&options).unwrap();
        assert_eq!(devs[2].status(), SimStatus::Removed);
        assert_eq!(devs[3].status(), SimStatus::Inserted);
    }

    #[test]
    fn clear_commands_unknown_devices() {
        let devs = devices();
        devs[1].set_status(SimStatus::Unknown);
        devs[3].set_status(SimStatus::Error);
        let options = ClearOptions {
            passive: true,
            ..ClearOptions::default()
        };
        let pending = path(&devs).clear(&options).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].device, "v1");
    }

    #[test]
    fn clear_wait_reports_timeout() {
        let devs = devices();
        devs[1].insert(None).unwrap();
        devs[1].set_stalled(true);

        let options = ClearOptions {
            wait: true,
            timeout: Some(Duration::from_millis(10)),
            ..ClearOptions::default()
        };
        let err = path(&devs).clear(&options).unwrap_err();
        assert!(matches!(err, CoreError::OperationTimeout { ref device, .. } if device == "v1"));
    }

    #[test]
    fn split_then_join_restores_members() {
        let devs = devices();
        let p = path(&devs);
        let (up, down) = p.split(&SplitAt::Z(5.0)).unwrap();
        assert_eq!(up.names(), vec!["v0", "v1"]);
        assert_eq!(down.names(), vec!["yag", "v2"]);

        let joined = up.join(&[&down]).unwrap();
        assert_eq!(name_set(&joined), name_set(&p));
        assert_eq!(joined.name(), Some("TST"));
    }

    #[test]
    fn split_at_device_keeps_it_upstream() {
        let devs = devices();
        let (up, down) = path(&devs).split(&SplitAt::Device("yag".into())).unwrap();
        assert_eq!(up.names(), vec!["v0", "v1", "yag"]);
        assert_eq!(down.names(), vec!["v2"]);
    }

    #[test]
    fn split_outside_range_is_rejected() {
        let p = path(&devices());
        assert!(matches!(p.split(&SplitAt::Z(40.0)), Err(CoreError::InvalidSplit { .. })));
        assert!(matches!(p.split(&SplitAt::Z(15.0)), Err(CoreError::InvalidSplit { .. })));
        assert!(matches!(
            p.split(&SplitAt::Device("nope".into())),
            Err(CoreError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn join_deduplicates_overlap() {
        let devs = devices();
        let a = path(&devs[..3]);
        let b = path(&devs[1..]);
        let joined = BeamPath::from_join(&[&a, &b], None).unwrap();
        assert_eq!(joined.devices().len(), 4);
        assert!(joined.devices().windows(2).all(|w| w[0].z() <= w[1].z()));
    }
}
