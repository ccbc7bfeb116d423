// ── Domain model ──
//
// Device interfaces, catalog records and the per-device state taxonomy.

pub mod catalog;
pub mod device;
pub mod state;

pub use catalog::{DeviceCatalog, DeviceMetadata, RangeQuery};
pub use device::{
    CompletedOperation, DeviceCallback, DeviceEvent, DeviceHandle, LightpathDevice, MpsCapable,
    OperationHandle, SubscriptionId,
};
pub use state::{Classified, DeviceState, LightpathState, classify, device_state};
