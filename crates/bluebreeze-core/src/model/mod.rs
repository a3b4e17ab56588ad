// ── Entity model ──
//
// Devices, services and characteristics, each owning the channels the
// tracker wires, plus the plain export values relayed across the boundary.

mod device;
mod ids;
mod radio;
mod service;

pub use device::{Device, DeviceMap, DeviceSnapshot, snapshot_devices};
pub use ids::{BleUuid, DeviceId, TrackingKey};
pub use radio::{Authorization, ConnectionStatus, RadioState, ScanResult};
pub use service::{
    Characteristic, CharacteristicDescriptor, CharacteristicProperty, CharacteristicSnapshot,
    Service, ServiceDescriptor, ServiceMap, ServiceSnapshot, snapshot_services,
};
