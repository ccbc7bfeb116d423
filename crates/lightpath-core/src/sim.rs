// ── Simulated devices ──
//
// In-memory stand-ins for live beamline hardware. Motions complete
// immediately and fire change callbacks synchronously, which makes them
// suitable for tests and for offline facility exploration from the CLI.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{CoreError, DeviceError};
use crate::model::{
    CompletedOperation, DeviceCallback, DeviceCatalog, DeviceEvent, DeviceHandle, DeviceMetadata,
    LightpathDevice, LightpathState, MpsCapable, OperationHandle, RangeQuery, SubscriptionId,
};

/// Behavioural flavour of a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SimKind {
    /// Opaque when inserted.
    Valve,
    /// Inserted but still transmitting (imagers, diagnostics).
    Passive,
    /// Opaque when inserted and veto-capable for MPS.
    Stopper,
    /// Redirects beam onto its inserted branch.
    Crystal,
    /// Like a crystal, with full reflectivity.
    Mirror,
    /// Sends beam onto every output branch at once when inserted.
    Splitter,
}

impl SimKind {
    pub fn default_transmission(self) -> f64 {
        match self {
            Self::Valve | Self::Stopper => 0.0,
            Self::Passive => 0.6,
            Self::Crystal => 0.8,
            Self::Mirror => 1.0,
            Self::Splitter => 0.5,
        }
    }
}

/// Raw status a simulated device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SimStatus {
    Inserted,
    Removed,
    Unknown,
    Inconsistent,
    Disconnected,
    Error,
}

struct SimInner {
    status: SimStatus,
    transmission: f64,
    inserted_branch: usize,
    stalled: bool,
    mps: Option<SimMps>,
    callbacks: Vec<(SubscriptionId, DeviceCallback)>,
    next_subscription: u64,
}

#[derive(Debug, Clone, Copy)]
struct SimMps {
    veto: bool,
    bypassed: bool,
}

/// A simulated beamline device.
pub struct SimDevice {
    name: String,
    z: f64,
    input_branches: Vec<String>,
    output_branches: Vec<String>,
    kind: SimKind,
    inner: Mutex<SimInner>,
}

impl SimDevice {
    pub fn new(
        name: impl Into<String>,
        z: f64,
        input_branches: &[&str],
        output_branches: &[&str],
        kind: SimKind,
    ) -> Self {
        Self::from_metadata(
            &DeviceMetadata::new(name, z, input_branches, output_branches),
            kind,
        )
    }

    pub fn from_metadata(md: &DeviceMetadata, kind: SimKind) -> Self {
        Self {
            name: md.name.clone(),
            z: md.z,
            input_branches: md.input_branches.clone(),
            output_branches: md.output_branches.clone(),
            kind,
            inner: Mutex::new(SimInner {
                status: SimStatus::Removed,
                transmission: kind.default_transmission(),
                // Branching optics send beam to their second branch when inserted.
                inserted_branch: usize::from(md.output_branches.len() > 1),
                stalled: false,
                mps: match kind {
                    SimKind::Valve | SimKind::Passive | SimKind::Stopper => Some(SimMps {
                        veto: kind == SimKind::Stopper,
                        bypassed: false,
                    }),
                    _ => None,
                },
                callbacks: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    pub fn kind(&self) -> SimKind {
        self.kind
    }

    pub fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            name: self.name.clone(),
            z: self.z,
            input_branches: self.input_branches.clone(),
            output_branches: self.output_branches.clone(),
            active: true,
            lightpath: true,
        }
    }

    pub fn status(&self) -> SimStatus {
        self.lock().status
    }

    /// Change the reported status and notify subscribers.
    pub fn set_status(&self, status: SimStatus) {
        self.lock().status = status;
        self.notify();
    }

    pub fn set_transmission(&self, transmission: f64) {
        self.lock().transmission = transmission;
        self.notify();
    }

    /// Choose which output branch an inserted branching device feeds.
    pub fn set_inserted_branch(&self, index: usize) {
        self.lock().inserted_branch = index;
        self.notify();
    }

    /// Make subsequent motions hang until their wait times out.
    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Attach MPS reporting to this device.
    pub fn with_mps(self, veto: bool) -> Self {
        self.lock().mps = Some(SimMps {
            veto,
            bypassed: false,
        });
        self
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        if let Some(mps) = self.lock().mps.as_mut() {
            mps.bypassed = bypassed;
        }
        self.notify();
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().callbacks.len()
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run callbacks outside the lock; they usually read our state back.
    fn notify(&self) {
        let callbacks: Vec<DeviceCallback> = self
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        let event = DeviceEvent {
            device: self.name.clone(),
            z: self.z,
        };
        for cb in callbacks {
            cb(&event);
        }
    }

    fn move_to(
        &self,
        status: SimStatus,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn OperationHandle>, DeviceError> {
        if self.status() == SimStatus::Disconnected {
            return Err(DeviceError::Disconnected {
                device: self.name.clone(),
            });
        }
        if self.lock().stalled {
            debug!(device = %self.name, "simulated motion stalled");
            return Ok(Box::new(StalledOperation {
                device: self.name.clone(),
                timeout,
            }));
        }
        self.set_status(status);
        Ok(Box::new(CompletedOperation))
    }

    fn output(&self, inner: &SimInner) -> BTreeMap<String, f64> {
        let mut output = BTreeMap::new();
        let Some(first) = self.output_branches.first() else {
            return output;
        };
        match inner.status {
            SimStatus::Inserted | SimStatus::Inconsistent => match self.kind {
                SimKind::Splitter => {
                    for branch in &self.output_branches {
                        output.insert(branch.clone(), inner.transmission);
                    }
                }
                SimKind::Crystal | SimKind::Mirror => {
                    let branch = self
                        .output_branches
                        .get(inner.inserted_branch)
                        .unwrap_or(first);
                    output.insert(branch.clone(), inner.transmission);
                }
                SimKind::Valve | SimKind::Passive | SimKind::Stopper => {
                    output.insert(first.clone(), inner.transmission);
                }
            },
            _ => {
                output.insert(first.clone(), 1.0);
            }
        }
        output
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.name)
            .field("z", &self.z)
            .field("kind", &self.kind)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl LightpathDevice for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn z(&self) -> f64 {
        self.z
    }

    fn input_branches(&self) -> &[String] {
        &self.input_branches
    }

    fn output_branches(&self) -> &[String] {
        &self.output_branches
    }

    fn is_connected(&self) -> bool {
        self.status() != SimStatus::Disconnected
    }

    fn lightpath_state(&self) -> Result<LightpathState, DeviceError> {
        let inner = self.lock();
        let (inserted, removed) = match inner.status {
            SimStatus::Inserted => (true, false),
            SimStatus::Removed => (false, true),
            SimStatus::Unknown => (false, false),
            SimStatus::Inconsistent => (true, true),
            SimStatus::Disconnected => {
                return Err(DeviceError::Disconnected {
                    device: self.name.clone(),
                });
            }
            SimStatus::Error => {
                return Err(DeviceError::Failed {
                    device: self.name.clone(),
                    message: "simulated failure".into(),
                });
            }
        };
        Ok(LightpathState {
            inserted,
            removed,
            output: self.output(&inner),
        })
    }

    fn subscribe(&self, callback: DeviceCallback) -> Result<SubscriptionId, DeviceError> {
        let mut inner = self.lock();
        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);
        inner.callbacks.push((id, callback));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().callbacks.retain(|(sid, _)| *sid != id);
    }

    fn insert(&self, timeout: Option<Duration>) -> Result<Box<dyn OperationHandle>, DeviceError> {
        self.move_to(SimStatus::Inserted, timeout)
    }

    fn remove(&self, timeout: Option<Duration>) -> Result<Box<dyn OperationHandle>, DeviceError> {
        self.move_to(SimStatus::Removed, timeout)
    }

    fn mps(&self) -> Option<&dyn MpsCapable> {
        self.lock().mps.is_some().then_some(self as &dyn MpsCapable)
    }
}

impl MpsCapable for SimDevice {
    fn faulted(&self) -> Result<bool, DeviceError> {
        let inner = self.lock();
        let Some(mps) = inner.mps else {
            return Ok(false);
        };
        match inner.status {
            SimStatus::Disconnected => Err(DeviceError::Disconnected {
                device: self.name.clone(),
            }),
            SimStatus::Inserted => Ok(!mps.bypassed && !mps.veto),
            _ => Ok(false),
        }
    }

    fn bypassed(&self) -> bool {
        self.lock().mps.is_some_and(|m| m.bypassed)
    }

    fn veto_capable(&self) -> bool {
        self.lock().mps.is_some_and(|m| m.veto)
    }
}

/// A motion that never completes.
#[derive(Debug)]
struct StalledOperation {
    device: String,
    timeout: Option<Duration>,
}

impl OperationHandle for StalledOperation {
    fn wait_until_done(&self, timeout: Option<Duration>) -> Result<(), DeviceError> {
        Err(DeviceError::Timeout {
            device: self.device.clone(),
            timeout: timeout.or(self.timeout).unwrap_or_default(),
        })
    }

    fn done(&self) -> bool {
        false
    }
}

// ── Catalog ──────────────────────────────────────────────────────────

/// An in-memory device catalog holding simulated devices.
#[derive(Debug, Default)]
pub struct SimCatalog {
    records: Vec<DeviceMetadata>,
    devices: BTreeMap<String, Arc<SimDevice>>,
}

impl SimCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: SimDevice) -> Arc<SimDevice> {
        let device = Arc::new(device);
        self.records.push(device.metadata());
        self.devices
            .insert(device.name().to_owned(), Arc::clone(&device));
        device
    }

    /// Register a record with no backing device. Instantiation will fail.
    pub fn add_unavailable(&mut self, record: DeviceMetadata) {
        self.records.push(record);
    }

    /// Register a record whose metadata differs from the simulated device,
    /// e.g. to mark it inactive.
    pub fn add_record(&mut self, record: DeviceMetadata, device: SimDevice) -> Arc<SimDevice> {
        let device = Arc::new(device);
        self.devices
            .insert(record.name.clone(), Arc::clone(&device));
        self.records.push(record);
        device
    }

    pub fn device(&self, name: &str) -> Option<Arc<SimDevice>> {
        self.devices.get(name).cloned()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<SimDevice>> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DeviceCatalog for SimCatalog {
    fn search_range(&self, query: &RangeQuery) -> Result<Vec<DeviceMetadata>, CoreError> {
        Ok(self
            .records
            .iter()
            .filter(|md| query.matches(md))
            .cloned()
            .collect())
    }

    fn instantiate(&self, record: &DeviceMetadata) -> Result<DeviceHandle, DeviceError> {
        self.devices
            .get(&record.name)
            .map(|d| Arc::clone(d) as DeviceHandle)
            .ok_or_else(|| DeviceError::Instantiation {
                device: record.name.clone(),
                message: "no simulated device registered".into(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn crystal_reports_inserted_branch() {
        let xtal = SimDevice::new("xtal", 5.0, &["L0"], &["L0", "L1"], SimKind::Crystal);
        let removed = xtal.lightpath_state().unwrap();
        assert_eq!(removed.output.get("L0"), Some(&1.0));

        xtal.insert(None).unwrap();
        let inserted = xtal.lightpath_state().unwrap();
        assert_eq!(inserted.output.get("L1"), Some(&0.8));
        assert!(!inserted.output.contains_key("L0"));
    }

    #[test]
    fn splitter_reports_every_branch() {
        let split = SimDevice::new("bs", 5.0, &["L0"], &["L0", "L1"], SimKind::Splitter);
        split.set_status(SimStatus::Inserted);
        let state = split.lightpath_state().unwrap();
        assert_eq!(state.output.len(), 2);
    }

    #[test]
    fn callbacks_fire_on_motion_and_stop_after_unsubscribe() {
        let dev = SimDevice::new("v", 1.0, &["L0"], &["L0"], SimKind::Valve);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = dev
            .subscribe(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        dev.insert(None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        dev.unsubscribe(id);
        dev.remove(None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stalled_motion_times_out() {
        let dev = SimDevice::new("v", 1.0, &["L0"], &["L0"], SimKind::Valve);
        dev.set_stalled(true);
        let op = dev.remove(Some(Duration::from_millis(5))).unwrap();
        assert!(!op.done());
        assert!(matches!(
            op.wait_until_done(None),
            Err(DeviceError::Timeout { .. })
        ));
    }

    #[test]
    fn stopper_is_veto_and_never_faults() {
        let stop = SimDevice::new("st", 9.0, &["L0"], &["L0"], SimKind::Stopper);
        stop.insert(None).unwrap();
        let mps = stop.mps().unwrap();
        assert!(mps.veto_capable());
        assert!(!mps.faulted().unwrap());
    }

    #[test]
    fn catalog_instantiate_fails_for_unregistered() {
        let mut cat = SimCatalog::new();
        cat.add_unavailable(DeviceMetadata::new("ghost", 1.0, &["L0"], &["L0"]));
        let records = cat.search_range(&RangeQuery::facility()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(cat.instantiate(&records[0]).is_err());
    }
}
