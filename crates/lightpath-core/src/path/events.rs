// ── Path change notification ──
//
// Member devices call back synchronously on whatever thread they move on.
// The path filters those callbacks and republishes the relevant ones on a
// broadcast channel, so subscribers receive typed events instead of
// registering closures of their own.

use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, trace};

use super::{BeamPath, PathInner};
use crate::model::{DeviceCallback, DeviceEvent};

/// A member device moved in a way that can change this path's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEvent {
    pub path: Option<String>,
    pub device: String,
    pub z: f64,
}

impl BeamPath {
    /// Receive path change events.
    ///
    /// The first subscriber attaches a callback to every member device.
    pub fn subscribe(&self) -> broadcast::Receiver<PathEvent> {
        self.attach_devices();
        self.inner.events.subscribe()
    }

    /// Path change events as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<PathEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Whether member devices currently carry callbacks for this path.
    pub fn is_subscribed(&self) -> bool {
        !self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Remove the per-device callbacks. Existing receivers stay open but
    /// see no further events until the next `subscribe`.
    pub fn clear_device_subs(&self) {
        self.inner.detach();
    }

    fn attach_devices(&self) {
        let mut subs = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !subs.is_empty() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let callback: DeviceCallback = Arc::new(move |event: &DeviceEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.device_moved(event);
            }
        });
        for device in &self.inner.devices {
            match device.subscribe(Arc::clone(&callback)) {
                Ok(id) => subs.push((Arc::clone(device), id)),
                Err(e) => {
                    error!(device = device.name(), error = %e, "beam path unable to subscribe to device");
                }
            }
        }
        debug!(path = ?self.inner.name, devices = subs.len(), "subscribed to member devices");
    }
}

impl PathInner {
    /// Forward a device change if it happened at or upstream of the current
    /// impediment. Anything further downstream cannot change what the beam
    /// reaches.
    fn device_moved(&self, event: &DeviceEvent) {
        let limit = match self.impediment() {
            Ok(block) => block.map_or(f64::INFINITY, |d| d.z()),
            Err(e) => {
                debug!(error = %e, "path state ambiguous, forwarding change");
                f64::INFINITY
            }
        };
        if event.z > limit {
            trace!(device = %event.device, limit, "ignoring change downstream of impediment");
            return;
        }
        let _ = self.events.send(PathEvent {
            path: self.name.clone(),
            device: event.device.clone(),
            z: event.z,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::graph::branch::handles;
    use crate::model::LightpathDevice;
    use crate::sim::{SimDevice, SimKind};

    fn fixture() -> (BeamPath, Arc<SimDevice>, Arc<SimDevice>) {
        let a = Arc::new(SimDevice::new("a", 1.0, &["TST"], &["TST"], SimKind::Valve));
        let b = Arc::new(SimDevice::new("b", 5.0, &["TST"], &["TST"], SimKind::Valve));
        let path = BeamPath::with_options(
            handles(&[Arc::clone(&a), Arc::clone(&b)]),
            0.1,
            Some("TST".into()),
        )
        .unwrap();
        (path, a, b)
    }

    #[test]
    fn subscribes_to_devices_once() {
        let (path, a, b) = fixture();
        assert!(!path.is_subscribed());

        let _rx1 = path.subscribe();
        let _rx2 = path.subscribe();
        assert!(path.is_subscribed());
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);

        path.clear_device_subs();
        assert_eq!(a.subscriber_count(), 0);
        assert!(!path.is_subscribed());
    }

    #[test]
    fn forwards_only_changes_at_or_upstream_of_impediment() {
        let (path, a, b) = fixture();
        let mut rx = path.subscribe();

        a.insert(None).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.device, "a");
        assert_eq!(event.path.as_deref(), Some("TST"));

        // b sits behind the closed valve at z=1
        b.insert(None).unwrap();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        a.remove(None).unwrap();
        assert_eq!(rx.try_recv().unwrap().device, "a");
    }

    #[test]
    fn dropping_path_releases_device_callbacks() {
        let (path, a, _b) = fixture();
        let _rx = path.subscribe();
        let clone = path.clone();
        drop(path);
        assert_eq!(a.subscriber_count(), 1);

        drop(clone);
        assert_eq!(a.subscriber_count(), 0);
        a.insert(None).unwrap();
    }

    #[tokio::test]
    async fn stream_yields_events() {
        let (path, a, _b) = fixture();
        let mut stream = path.stream();
        a.insert(None).unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.z, 1.0);
    }
}
