// ── Tracker bookkeeping ──

use std::collections::HashMap;

use crate::channel::Subscription;
use crate::model::{BleUuid, DeviceId, TrackingKey};

/// The forwarders created for one tracked entity.
///
/// An entry is inserted with no handles before its channels are subscribed
/// and filled in afterwards, but only while `token` still identifies it. A
/// token mismatch means the entry was pruned, replaced or torn down while
/// the subscriptions were being made.
pub(super) struct Wiring {
    pub(super) token: u64,
    pub(super) handles: Vec<Subscription>,
}

impl Wiring {
    pub(super) fn pending(token: u64) -> Self {
        Self {
            token,
            handles: Vec::new(),
        }
    }

    /// Whether the first forwarder was made on the channel `check` accepts.
    /// A pending entry counts as wired.
    pub(super) fn wired_to(&self, check: impl FnOnce(&Subscription) -> bool) -> bool {
        self.handles.first().is_none_or(check)
    }
}

/// Which devices, services and characteristics currently have forwarders.
#[derive(Default)]
pub(super) struct TrackerState {
    /// Device-level wiring: connection status, MTU, services.
    pub(super) devices: HashMap<DeviceId, Wiring>,
    /// Service ids in each device's newest services snapshot.
    pub(super) services: HashMap<DeviceId, Vec<BleUuid>>,
    /// Characteristic-level wiring (data, notify state), grouped by device.
    pub(super) characteristics: HashMap<DeviceId, HashMap<TrackingKey, Wiring>>,
    /// New wiring is only recorded while set. Teardown clears it.
    pub(super) active: bool,
    /// Bumped by every activation and teardown.
    pub(super) generation: u64,
}

impl TrackerState {
    /// Whether a snapshot may change wiring. `generation` pins the
    /// activation the delivering subscription was made under.
    pub(super) fn accepts(&self, generation: Option<u64>) -> bool {
        self.active && generation.is_none_or(|g| g == self.generation)
    }

    /// Drop every trace of `id`, returning the wiring to cancel.
    pub(super) fn forget_device(&mut self, id: &DeviceId) -> Vec<Wiring> {
        let mut retired: Vec<Wiring> = self.devices.remove(id).into_iter().collect();
        self.services.remove(id);
        if let Some(characteristics) = self.characteristics.remove(id) {
            retired.extend(characteristics.into_values());
        }
        retired
    }

    pub(super) fn stats(&self) -> TrackerStats {
        let device_forwarders: usize = self.devices.values().map(|w| w.handles.len()).sum();
        let characteristic_forwarders: usize = self
            .characteristics
            .values()
            .flat_map(HashMap::values)
            .map(|w| w.handles.len())
            .sum();
        TrackerStats {
            devices: self.devices.len(),
            services: self.services.values().map(Vec::len).sum(),
            characteristics: self.characteristics.values().map(HashMap::len).sum(),
            forwarders: device_forwarders + characteristic_forwarders,
        }
    }
}

/// Point-in-time counts of what the tracker is wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Devices with device-level wiring.
    pub devices: usize,
    /// Service ids across all tracked services snapshots.
    pub services: usize,
    /// Characteristics with characteristic-level wiring.
    pub characteristics: usize,
    /// Live forwarding subscriptions.
    pub forwarders: usize,
}
