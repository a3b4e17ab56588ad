// ── Subscription tracker ──
//
// Turns repeatedly re-reported entity trees into at most one forwarding
// wire per device and per characteristic, pruning wiring for whatever the
// newest snapshot no longer contains.
//
// The state lock is never held while subscribing: a state channel replays
// its cached value synchronously, and the services replay calls straight
// back into the tracker. Wiring is only recorded while the tracker is
// active, so a delivery that races `teardown_all` leaves nothing behind.

mod state;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, trace};

pub use state::TrackerStats;
use state::{TrackerState, Wiring};

use crate::model::{
    Characteristic, ConnectionStatus, Device, DeviceId, DeviceMap, ServiceMap, TrackingKey,
    snapshot_devices, snapshot_services,
};
use crate::sink::{BridgeEvent, EventSink, Outbound};

pub struct SubscriptionTracker {
    outbound: Arc<Outbound>,
    state: Mutex<TrackerState>,
    next_token: AtomicU64,
}

impl SubscriptionTracker {
    /// An active tracker relaying to `sink`.
    pub fn new(sink: Box<dyn EventSink>) -> Arc<Self> {
        let outbound = Outbound::new();
        outbound.install(sink);
        let tracker = Self::with_outbound(Arc::new(outbound));
        tracker.activate();
        tracker
    }

    /// Accept snapshots again after a teardown. Returns the new generation;
    /// snapshots delivered for an older generation are ignored.
    pub fn activate(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.active = true;
        state.generation
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub(crate) fn with_outbound(outbound: Arc<Outbound>) -> Arc<Self> {
        Arc::new(Self {
            outbound,
            state: Mutex::new(TrackerState::default()),
            next_token: AtomicU64::new(1),
        })
    }

    /// Relay a full devices snapshot and reconcile device-level wiring.
    ///
    /// New devices get forwarders on connection status, MTU and services.
    /// Tracked devices are left alone unless the snapshot carries a new
    /// `Device` instance under the same id, which is rewired. Devices absent
    /// from the snapshot lose all their wiring.
    ///
    /// Ignored while the tracker is inactive.
    pub fn on_devices_snapshot(self: &Arc<Self>, devices: &DeviceMap) {
        self.apply_devices(devices, None);
    }

    /// [`on_devices_snapshot`](Self::on_devices_snapshot) for a delivery
    /// made under activation `generation`.
    pub(crate) fn on_devices_snapshot_for(
        self: &Arc<Self>,
        generation: u64,
        devices: &DeviceMap,
    ) {
        self.apply_devices(devices, Some(generation));
    }

    /// Relay a device's services snapshot and reconcile characteristic-level
    /// wiring for it. Ignored while the tracker is inactive.
    pub fn on_services_snapshot(self: &Arc<Self>, device_id: &DeviceId, services: &ServiceMap) {
        self.reconcile_services(device_id, services, None);
    }

    /// Cancel every forwarder, forget everything tracked and stop accepting
    /// snapshots until the next [`activate`](Self::activate). Returns the
    /// number of forwarders cancelled.
    pub fn teardown_all(&self) -> usize {
        let retired = {
            let mut state = self.lock();
            let generation = state.generation + 1;
            let retired = std::mem::take(&mut *state);
            state.generation = generation;
            retired
        };
        let cancelled = retired.stats().forwarders;
        drop(retired);
        debug!(forwarders = cancelled, "tracker torn down");
        cancelled
    }

    pub fn stats(&self) -> TrackerStats {
        self.lock().stats()
    }

    pub fn is_tracking_device(&self, id: &DeviceId) -> bool {
        self.lock().devices.contains_key(id)
    }

    pub fn is_tracking_characteristic(&self, key: &TrackingKey) -> bool {
        self.lock()
            .characteristics
            .get(&key.device_id)
            .is_some_and(|wired| wired.contains_key(key))
    }

    // ── Wiring ───────────────────────────────────────────────────────

    fn apply_devices(self: &Arc<Self>, devices: &DeviceMap, generation: Option<u64>) {
        if !self.lock().accepts(generation) {
            trace!("tracker inactive; devices snapshot ignored");
            return;
        }
        self.outbound
            .send(BridgeEvent::DevicesChanged(snapshot_devices(devices)));

        let mut retired = Vec::new();
        let mut pending = Vec::new();
        {
            let mut state = self.lock();
            // Re-checked: a teardown may have run while the sink had the snapshot.
            if !state.accepts(generation) {
                trace!("tracker torn down during relay; devices snapshot ignored");
                return;
            }

            let absent: Vec<DeviceId> = state
                .devices
                .keys()
                .filter(|id| !devices.contains_key(*id))
                .cloned()
                .collect();
            for id in absent {
                debug!(device_id = %id, "device absent from snapshot; pruning");
                retired.extend(state.forget_device(&id));
            }

            for (id, device) in devices {
                if let Some(wiring) = state.devices.get(id) {
                    if wiring.wired_to(|h| device.connection_status.is_source_of(h)) {
                        continue;
                    }
                    debug!(device_id = %id, "device instance replaced; rewiring");
                    retired.extend(state.devices.remove(id));
                }
                let token = self.token();
                state.devices.insert(id.clone(), Wiring::pending(token));
                pending.push((Arc::clone(device), token));
            }
        }
        drop(retired);

        for (device, token) in pending {
            self.wire_device(&device, token);
        }
    }

    fn wire_device(self: &Arc<Self>, device: &Device, token: u64) {
        let id = device.id.clone();

        let connection = {
            let outbound = Arc::clone(&self.outbound);
            let device_id = id.clone();
            device
                .connection_status
                .subscribe(move |status: &ConnectionStatus| {
                    outbound.send(BridgeEvent::ConnectionStatusChanged {
                        device_id: device_id.clone(),
                        status: *status,
                    });
                })
        };
        let mtu = {
            let outbound = Arc::clone(&self.outbound);
            let device_id = id.clone();
            device.mtu.subscribe(move |mtu: &u16| {
                outbound.send(BridgeEvent::MtuChanged {
                    device_id: device_id.clone(),
                    mtu: *mtu,
                });
            })
        };
        let services = {
            let tracker = Arc::downgrade(self);
            let device_id = id.clone();
            device.services.subscribe(move |services: &ServiceMap| {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.reconcile_services(&device_id, services, Some(token));
                }
            })
        };

        let handles = vec![connection, mtu, services];
        let stale = {
            let mut state = self.lock();
            match state.devices.get_mut(&id) {
                Some(wiring) if wiring.token == token => {
                    wiring.handles = handles;
                    debug!(device_id = %id, "device wired");
                    None
                }
                _ => Some(handles),
            }
        };
        if stale.is_some() {
            trace!(device_id = %id, "device wiring superseded; cancelling");
        }
    }

    /// `expected` is the device wiring token of the forwarder delivering the
    /// snapshot; a delivery from superseded wiring is ignored.
    fn reconcile_services(
        self: &Arc<Self>,
        device_id: &DeviceId,
        services: &ServiceMap,
        expected: Option<u64>,
    ) {
        let mut retired = Vec::new();
        let mut pending = Vec::new();
        {
            let mut state = self.lock();
            if !state.active {
                trace!(device_id = %device_id, "tracker inactive; services snapshot ignored");
                return;
            }
            if let Some(token) = expected {
                if state.devices.get(device_id).is_none_or(|w| w.token != token) {
                    trace!(device_id = %device_id, "services from superseded wiring; ignoring");
                    return;
                }
            }

            state
                .services
                .insert(device_id.clone(), services.keys().copied().collect());

            let present: HashSet<TrackingKey> = services
                .values()
                .flat_map(|service| {
                    service.characteristics.iter().map(|c| {
                        TrackingKey::new(device_id.clone(), service.id, c.id)
                    })
                })
                .collect();

            let wired = state.characteristics.entry(device_id.clone()).or_default();

            let absent: Vec<TrackingKey> = wired
                .keys()
                .filter(|key| !present.contains(*key))
                .cloned()
                .collect();
            for key in absent {
                debug!(key = %key, "characteristic absent from snapshot; pruning");
                retired.extend(wired.remove(&key));
            }

            for service in services.values() {
                for characteristic in &service.characteristics {
                    let key =
                        TrackingKey::new(device_id.clone(), service.id, characteristic.id);
                    if let Some(wiring) = wired.get(&key) {
                        if wiring.wired_to(|h| characteristic.data.is_source_of(h)) {
                            continue;
                        }
                        debug!(key = %key, "characteristic instance replaced; rewiring");
                        retired.extend(wired.remove(&key));
                    }
                    let token = self.token();
                    wired.insert(key.clone(), Wiring::pending(token));
                    pending.push((key, Arc::clone(characteristic), token));
                }
            }
        }

        self.outbound.send(BridgeEvent::ServicesChanged {
            device_id: device_id.clone(),
            services: snapshot_services(services),
        });
        drop(retired);

        for (key, characteristic, token) in pending {
            self.wire_characteristic(key, &characteristic, token);
        }
    }

    fn wire_characteristic(&self, key: TrackingKey, characteristic: &Characteristic, token: u64) {
        let data = {
            let outbound = Arc::clone(&self.outbound);
            let key = key.clone();
            characteristic.data.subscribe(move |value: &Bytes| {
                outbound.send(BridgeEvent::CharacteristicDataChanged {
                    device_id: key.device_id.clone(),
                    service_id: key.service_id,
                    characteristic_id: key.characteristic_id,
                    value: value.clone(),
                });
            })
        };
        let notifying = {
            let outbound = Arc::clone(&self.outbound);
            let key = key.clone();
            characteristic.is_notifying.subscribe(move |enabled: &bool| {
                outbound.send(BridgeEvent::NotifyEnabledChanged {
                    device_id: key.device_id.clone(),
                    service_id: key.service_id,
                    characteristic_id: key.characteristic_id,
                    enabled: *enabled,
                });
            })
        };

        let handles = vec![data, notifying];
        let stale = {
            let mut state = self.lock();
            match state
                .characteristics
                .get_mut(&key.device_id)
                .and_then(|wired| wired.get_mut(&key))
            {
                Some(wiring) if wiring.token == token => {
                    wiring.handles = handles;
                    debug!(key = %key, "characteristic wired");
                    None
                }
                _ => Some(handles),
            }
        };
        if stale.is_some() {
            trace!(key = %key, "characteristic wiring superseded; cancelling");
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
