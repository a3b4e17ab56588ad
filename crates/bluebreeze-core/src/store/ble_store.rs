// ── Producer-side entity store ──
//
// Owns the top-level channels and constructs each device once per id.
// A BLE backend pushes radio updates in through the producer methods; the
// bridge reads the same channels to forward them.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::registry::ChannelRegistry;
use crate::channel::{EventChannel, StateChannel};
use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::model::{
    Authorization, BleUuid, Characteristic, ConnectionStatus, Device, DeviceId, DeviceMap,
    RadioState, ScanResult, Service, ServiceDescriptor, ServiceMap, TrackingKey,
};

/// Every channel the bridge can forward, plus the producer entry points.
///
/// Devices are never removed once seen; the root `devices` channel always
/// carries every known device in first-seen order.
///
/// Producer methods publish synchronously and may be called from inside any
/// observer or sink, including one reacting to the root `devices` channel.
/// Roster changes are computed and published under the `devices` channel's
/// own lock, so snapshots never arrive out of order.
pub struct BleStore {
    config: StoreConfig,
    state: StateChannel<RadioState>,
    authorization: StateChannel<Authorization>,
    scan_enabled: StateChannel<bool>,
    scan_results: EventChannel<ScanResult>,
    devices: StateChannel<DeviceMap>,
    by_id: DashMap<DeviceId, Arc<Device>>,
    characteristics: ChannelRegistry,
}

impl BleStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: StateChannel::with_value(RadioState::default()),
            authorization: StateChannel::with_value(Authorization::default()),
            scan_enabled: StateChannel::with_value(false),
            scan_results: EventChannel::new(),
            devices: StateChannel::with_value(DeviceMap::new()),
            by_id: DashMap::new(),
            characteristics: ChannelRegistry::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ── Channel accessors ────────────────────────────────────────────

    pub fn state(&self) -> &StateChannel<RadioState> {
        &self.state
    }

    pub fn authorization(&self) -> &StateChannel<Authorization> {
        &self.authorization
    }

    pub fn scan_enabled(&self) -> &StateChannel<bool> {
        &self.scan_enabled
    }

    pub fn scan_results(&self) -> &EventChannel<ScanResult> {
        &self.scan_results
    }

    pub fn devices(&self) -> &StateChannel<DeviceMap> {
        &self.devices
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn device_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of distinct characteristics ever reported across all devices.
    pub fn characteristic_channel_count(&self) -> usize {
        self.characteristics.len()
    }

    pub fn find_device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.device(id)
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.clone() })
    }

    /// Look a service up in the device's current services snapshot.
    pub fn find_service(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
    ) -> Result<Arc<Service>, CoreError> {
        let device = self.find_device(device_id)?;
        device
            .services
            .get()
            .and_then(|services| services.get(service_id).cloned())
            .ok_or_else(|| CoreError::ServiceNotFound {
                device_id: device_id.clone(),
                service_id: *service_id,
            })
    }

    pub fn find_characteristic(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
    ) -> Result<Arc<Characteristic>, CoreError> {
        let service = self.find_service(device_id, service_id)?;
        service
            .characteristic(characteristic_id)
            .cloned()
            .ok_or_else(|| CoreError::CharacteristicNotFound {
                key: TrackingKey::new(device_id.clone(), *service_id, *characteristic_id),
            })
    }

    // ── Radio-level updates ──────────────────────────────────────────

    pub fn set_state(&self, state: RadioState) {
        self.state.set(state);
    }

    pub fn set_authorization(&self, authorization: Authorization) {
        self.authorization.set(authorization);
    }

    pub fn set_scan_enabled(&self, enabled: bool) {
        self.scan_enabled.set(enabled);
    }

    /// Record a sighting: the device is created on first sight, then the
    /// sighting itself is emitted.
    pub fn report_scan_result(&self, result: ScanResult) {
        self.upsert_device(result.id.clone(), result.name.clone());
        self.scan_results.emit(result);
    }

    /// Return the device for `id`, creating and publishing it if unseen.
    /// An existing device is returned unchanged.
    pub fn upsert_device(&self, id: DeviceId, name: Option<String>) -> Arc<Device> {
        if let Some(existing) = self.device(&id) {
            return existing;
        }

        let default_mtu = self.config.default_mtu;
        self.devices.update(|current| {
            if let Some(existing) = current.and_then(|roster| roster.get(&id)) {
                return (None, Arc::clone(existing));
            }
            let device = Arc::new(Device::new(id.clone(), name, default_mtu));
            let mut roster = current.cloned().unwrap_or_default();
            roster.insert(id.clone(), Arc::clone(&device));
            self.by_id.insert(id.clone(), Arc::clone(&device));
            debug!(device_id = %id, devices = roster.len(), "new device");
            (Some(roster), device)
        })
    }

    // ── Device-level updates ─────────────────────────────────────────

    pub fn set_connection_status(
        &self,
        device_id: &DeviceId,
        status: ConnectionStatus,
    ) -> Result<(), CoreError> {
        let device = self.producer_target(device_id)?;
        device.connection_status.set(status);
        Ok(())
    }

    pub fn set_mtu(&self, device_id: &DeviceId, mtu: u16) -> Result<(), CoreError> {
        let device = self.producer_target(device_id)?;
        device.mtu.set(mtu);
        Ok(())
    }

    /// Publish the outcome of a discovery pass as a new services snapshot.
    ///
    /// Every call builds fresh `Service` values. Characteristics keep their
    /// `data` and `is_notifying` channels from earlier passes.
    pub fn publish_services(
        &self,
        device_id: &DeviceId,
        discovered: Vec<ServiceDescriptor>,
    ) -> Result<(), CoreError> {
        let device = self.producer_target(device_id)?;

        let mut services = ServiceMap::with_capacity(discovered.len());
        for descriptor in discovered {
            let characteristics = descriptor
                .characteristics
                .into_iter()
                .map(|c| {
                    let key = TrackingKey::new(device_id.clone(), descriptor.id, c.id);
                    let channels = self.characteristics.channels_for(key);
                    Arc::new(Characteristic::with_channels(
                        c,
                        channels.data,
                        channels.is_notifying,
                    ))
                })
                .collect();
            let service = Service::new(descriptor.id, descriptor.name, characteristics);
            services.insert(service.id, Arc::new(service));
        }

        debug!(device_id = %device_id, services = services.len(), "services discovered");
        device.services.set(services);
        Ok(())
    }

    // ── Characteristic-level updates ─────────────────────────────────

    /// Store a read result or notification payload.
    pub fn set_characteristic_data(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
        value: Bytes,
    ) -> Result<(), CoreError> {
        let characteristic = self
            .find_characteristic(device_id, service_id, characteristic_id)
            .inspect_err(|e| warn!(error = %e, "characteristic data rejected"))?;
        characteristic.data.set(value);
        Ok(())
    }

    pub fn set_notifying(
        &self,
        device_id: &DeviceId,
        service_id: &BleUuid,
        characteristic_id: &BleUuid,
        enabled: bool,
    ) -> Result<(), CoreError> {
        let characteristic = self
            .find_characteristic(device_id, service_id, characteristic_id)
            .inspect_err(|e| warn!(error = %e, "notify state rejected"))?;
        characteristic.is_notifying.set(enabled);
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn producer_target(&self, device_id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.find_device(device_id)
            .inspect_err(|e| warn!(error = %e, "device update rejected"))
    }
}

impl Default for BleStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
