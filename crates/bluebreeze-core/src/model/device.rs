// ── Device entity ──

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ids::DeviceId;
use super::radio::ConnectionStatus;
use super::service::ServiceMap;
use crate::channel::StateChannel;

/// A peripheral seen by the host, constructed once per id.
///
/// Its channels are the per-device data sources the tracker wires: link
/// state, negotiated MTU, and the latest services snapshot.
#[derive(Debug)]
pub struct Device {
    pub id: DeviceId,
    pub name: Option<String>,
    pub connection_status: StateChannel<ConnectionStatus>,
    pub mtu: StateChannel<u16>,
    pub services: StateChannel<ServiceMap>,
}

impl Device {
    /// A disconnected device with no services and the given starting MTU.
    pub fn new(id: DeviceId, name: Option<String>, mtu: u16) -> Self {
        Self {
            id,
            name,
            connection_status: StateChannel::with_value(ConnectionStatus::Disconnected),
            mtu: StateChannel::with_value(mtu),
            services: StateChannel::with_value(ServiceMap::new()),
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Every known device keyed by id, in first-seen order.
pub type DeviceMap = IndexMap<DeviceId, Arc<Device>>;

/// Plain export values for a devices snapshot.
pub fn snapshot_devices(devices: &DeviceMap) -> Vec<DeviceSnapshot> {
    devices.values().map(|d| d.snapshot()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub id: DeviceId,
    pub name: Option<String>,
}
