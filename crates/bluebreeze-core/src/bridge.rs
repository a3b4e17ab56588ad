// ── Bridge ──
//
// The boundary-facing object: forwards every store channel to one event
// sink through a subscription tracker, answers current-value queries, and
// owns the teardown lifecycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::channel::Subscription;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{
    Authorization, BleUuid, Characteristic, ConnectionStatus, Device, DeviceId, DeviceMap,
    DeviceSnapshot, RadioState, ScanResult, Service, ServiceSnapshot, snapshot_devices,
    snapshot_services,
};
use crate::sink::{BridgeEvent, EventSink, Outbound};
use crate::store::BleStore;
use crate::tracker::{SubscriptionTracker, TrackerStats};

/// Forwards a [`BleStore`] to an [`EventSink`].
///
/// Queries read channels directly and work whether or not a sink is
/// attached. Dropping the bridge detaches it.
///
/// `attach` and `detach` are serialized against each other. A sink must not
/// call either of them.
pub struct Bridge {
    store: Arc<BleStore>,
    config: BridgeConfig,
    outbound: Arc<Outbound>,
    tracker: Arc<SubscriptionTracker>,
    roots: Mutex<Vec<Subscription>>,
    lifecycle: Mutex<()>,
}

impl Bridge {
    pub fn new(store: Arc<BleStore>, config: BridgeConfig) -> Self {
        let outbound = Arc::new(Outbound::new());
        let tracker = SubscriptionTracker::with_outbound(Arc::clone(&outbound));
        Self {
            store,
            config,
            outbound,
            tracker,
            roots: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<BleStore> {
        &self.store
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start forwarding to `sink`.
    ///
    /// Every top-level channel replays its current value into the sink
    /// before this returns, followed by the devices snapshot and the
    /// current values of every known device and characteristic. Attaching
    /// an attached bridge detaches the previous sink first.
    pub fn attach(&self, sink: impl EventSink + 'static) {
        let _lifecycle = self.lock_lifecycle();
        if self.is_attached() {
            debug!("bridge re-attached; dropping previous sink");
            self.release();
        }
        self.outbound.install(Box::new(sink));
        let generation = self.tracker.activate();

        let store = &self.store;
        let mut roots = Vec::with_capacity(5);

        roots.push({
            let outbound = Arc::clone(&self.outbound);
            store.state().subscribe(move |state: &RadioState| {
                outbound.send(BridgeEvent::StateChanged(*state));
            })
        });
        roots.push({
            let outbound = Arc::clone(&self.outbound);
            store
                .authorization()
                .subscribe(move |authorization: &Authorization| {
                    outbound.send(BridgeEvent::AuthorizationChanged(*authorization));
                })
        });
        roots.push({
            let outbound = Arc::clone(&self.outbound);
            store.scan_enabled().subscribe(move |enabled: &bool| {
                outbound.send(BridgeEvent::ScanEnabledChanged(*enabled));
            })
        });
        roots.push({
            let outbound = Arc::clone(&self.outbound);
            let config = self.config;
            store.scan_results().subscribe(move |result: &ScanResult| {
                if config.admits_rssi(result.rssi) {
                    outbound.send(BridgeEvent::ScanResult(result.clone()));
                } else {
                    trace!(device_id = %result.id, rssi = result.rssi, "weak sighting filtered");
                }
            })
        });
        roots.push({
            let tracker = Arc::downgrade(&self.tracker);
            store.devices().subscribe(move |devices: &DeviceMap| {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.on_devices_snapshot_for(generation, devices);
                }
            })
        });

        self.lock_roots().extend(roots);
        debug!(
            devices = self.store.device_count(),
            forwarders = self.tracker.stats().forwarders,
            "bridge attached"
        );
    }

    /// Stop forwarding: drop the sink, release the top-level subscriptions
    /// and tear the tracker down. A no-op on a detached bridge.
    pub fn detach(&self) {
        let _lifecycle = self.lock_lifecycle();
        self.release();
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.is_installed()
    }

    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_state(&self) -> RadioState {
        self.store.state().get().unwrap_or_default()
    }

    pub fn current_authorization(&self) -> Authorization {
        self.store.authorization().get().unwrap_or_default()
    }

    pub fn current_scan_enabled(&self) -> bool {
        self.store.scan_enabled().get().unwrap_or_default()
    }

    pub fn current_devices(&self) -> Vec<DeviceSnapshot> {
        self.store
            .devices()
            .get()
            .map(|devices| snapshot_devices(&devices))
            .unwrap_or_default()
    }

    /// Empty when the device is unknown or has no services yet.
    pub fn current_services(&self, device_id: &DeviceId) -> Vec<ServiceSnapshot> {
        self.store
            .device(device_id)
            .and_then(|device| device.services.get())
            .map(|services| snapshot_services(&services))
            .unwrap_or_default()
    }

    pub fn current_connection_status(&self, device_id: &DeviceId) -> Option<ConnectionStatus> {
        self.store
            .device(device_id)
            .and_then(|device| device.connection_status.get())
    }

    pub fn current_mtu(&self, device_id: &DeviceId) -> Option<u16> {
        self.store.device(device_id).and_then(|device| device.mtu.get())
    }

    /// Empty when the characteristic is unknown or has never been read.
    pub fn current_characteristic_data(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
    ) -> Bytes {
        self.store
            .find_characteristic(device_id, service_id, characteristic_id)
            .ok()
            .and_then(|c| c.data.get())
            .unwrap_or_default()
    }

    /// False when the characteristic is unknown.
    pub fn current_notify_enabled(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
    ) -> bool {
        self.store
            .find_characteristic(device_id, service_id, characteristic_id)
            .ok()
            .and_then(|c| c.is_notifying.get())
            .unwrap_or_default()
    }

    // ── Command-target resolution ────────────────────────────────────

    pub fn resolve_device(&self, device_id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.store.find_device(device_id)
    }

    pub fn resolve_service(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
    ) -> Result<Arc<Service>, CoreError> {
        self.store.find_service(device_id, service_id)
    }

    pub fn resolve_characteristic(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
    ) -> Result<Arc<Characteristic>, CoreError> {
        self.store
            .find_characteristic(device_id, service_id, characteristic_id)
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Detach with the lifecycle lock already held.
    fn release(&self) {
        self.outbound.clear();
        let roots = std::mem::take(&mut *self.lock_roots());
        let released = roots.len();
        drop(roots);
        let cancelled = self.tracker.teardown_all();
        if released > 0 || cancelled > 0 {
            debug!(roots = released, forwarders = cancelled, "bridge detached");
        }
    }

    fn lock_roots(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.roots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.detach();
    }
}
