//! Scripted BLE producer.
//!
//! Plays the part of a native BLE stack: powers the radio on, scans,
//! connects every peripheral, discovers services and then streams
//! heart-rate and battery readings. Halfway through, the first peripheral
//! is rediscovered without its battery service so the bridge prunes it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use bluebreeze_core::BleStore;
use bluebreeze_core::model::{
    Authorization, BleUuid, CharacteristicDescriptor, CharacteristicProperty, ConnectionStatus,
    DeviceId, RadioState, ScanResult, ServiceDescriptor,
};

const HEART_RATE: u32 = 0x180d;
const HEART_RATE_MEASUREMENT: u32 = 0x2a37;
const BODY_SENSOR_LOCATION: u32 = 0x2a38;
const BATTERY: u32 = 0x180f;
const BATTERY_LEVEL: u32 = 0x2a19;
const DEVICE_INFORMATION: u32 = 0x180a;
const MANUFACTURER_NAME: u32 = 0x2a29;

const NEGOTIATED_MTU: u16 = 247;
const MANUFACTURER_ID: u16 = 0xffff;

#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub devices: usize,
    pub ticks: u32,
    pub interval: Duration,
}

pub async fn run(store: Arc<BleStore>, script: Script, cancel: CancellationToken) -> Result<()> {
    let ids: Vec<DeviceId> = (0..script.devices).map(device_id).collect();

    store.set_authorization(Authorization::Authorized);
    store.set_state(RadioState::PoweredOn);

    // ── Scan ──
    store.set_scan_enabled(true);
    for (index, id) in ids.iter().enumerate() {
        store.report_scan_result(sighting(id, index));
    }
    store.set_scan_enabled(false);
    info!(devices = ids.len(), "scan complete");

    // ── Connect and discover ──
    for id in &ids {
        store.set_connection_status(id, ConnectionStatus::Connected)?;
        store.set_mtu(id, NEGOTIATED_MTU)?;
        store.publish_services(id, full_profile())?;
        store.set_characteristic_data(
            id,
            &uuid(DEVICE_INFORMATION),
            &uuid(MANUFACTURER_NAME),
            Bytes::from_static(b"BlueBreeze"),
        )?;
        store.set_notifying(id, &uuid(HEART_RATE), &uuid(HEART_RATE_MEASUREMENT), true)?;
    }

    // ── Stream readings ──
    let rediscover_at = script.ticks / 2;
    for tick in 0..script.ticks {
        if tick > 0 {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(tick, "simulation cancelled");
                    break;
                }
                () = tokio::time::sleep(script.interval) => {}
            }
        }

        if tick == rediscover_at {
            if let Some(first) = ids.first() {
                debug!(device_id = %first, "rediscovering without battery service");
                store.publish_services(first, reduced_profile())?;
            }
        }

        for (index, id) in ids.iter().enumerate() {
            store.set_characteristic_data(
                id,
                &uuid(HEART_RATE),
                &uuid(HEART_RATE_MEASUREMENT),
                heart_rate_reading(tick, index),
            )?;
            if store
                .find_characteristic(id, &uuid(BATTERY), &uuid(BATTERY_LEVEL))
                .is_ok()
            {
                store.set_characteristic_data(
                    id,
                    &uuid(BATTERY),
                    &uuid(BATTERY_LEVEL),
                    battery_reading(tick),
                )?;
            }
        }
    }

    // ── Disconnect ──
    for id in &ids {
        store.set_notifying(id, &uuid(HEART_RATE), &uuid(HEART_RATE_MEASUREMENT), false)?;
        store.set_connection_status(id, ConnectionStatus::Disconnected)?;
    }
    Ok(())
}

fn device_id(index: usize) -> DeviceId {
    DeviceId::new(format!("C0:FF:EE:00:{:02X}:{:02X}", (index >> 8) & 0xff, index & 0xff))
}

fn uuid(short: u32) -> BleUuid {
    BleUuid::from_short(short)
}

fn sighting(id: &DeviceId, index: usize) -> ScanResult {
    let rssi = i16::try_from(index.min(5))
        .map(|step| -40 - 12 * step)
        .unwrap_or(-100);
    ScanResult::new(id.clone(), rssi)
        .with_name(format!("HRM-{}", index + 1))
        .with_services([uuid(HEART_RATE)])
        .with_manufacturer(
            MANUFACTURER_ID,
            Some("BlueBreeze".into()),
            Bytes::from(vec![0x42, u8::try_from(index & 0xff).unwrap_or(0)]),
        )
}

fn heart_rate_service() -> ServiceDescriptor {
    ServiceDescriptor::new(
        uuid(HEART_RATE),
        vec![
            CharacteristicDescriptor::new(
                uuid(HEART_RATE_MEASUREMENT),
                [CharacteristicProperty::Notify],
            ),
            CharacteristicDescriptor::new(
                uuid(BODY_SENSOR_LOCATION),
                [CharacteristicProperty::Read],
            ),
        ],
    )
}

fn full_profile() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new(
            uuid(DEVICE_INFORMATION),
            vec![CharacteristicDescriptor::new(
                uuid(MANUFACTURER_NAME),
                [CharacteristicProperty::Read],
            )],
        ),
        heart_rate_service(),
        ServiceDescriptor::new(
            uuid(BATTERY),
            vec![CharacteristicDescriptor::new(
                uuid(BATTERY_LEVEL),
                [CharacteristicProperty::Read, CharacteristicProperty::Notify],
            )],
        ),
    ]
}

fn reduced_profile() -> Vec<ServiceDescriptor> {
    let mut services = full_profile();
    services.retain(|s| s.id != uuid(BATTERY));
    services
}

/// Heart Rate Measurement: flags byte (8-bit value) then beats per minute.
fn heart_rate_reading(tick: u32, index: usize) -> Bytes {
    let offset = (u64::from(tick) * 7 + u64::try_from(index).unwrap_or(0) * 3) % 40;
    let bpm = 60 + u8::try_from(offset).unwrap_or(0);
    Bytes::from(vec![0x00, bpm])
}

fn battery_reading(tick: u32) -> Bytes {
    let level = 100u32.saturating_sub(tick).max(1);
    Bytes::from(vec![u8::try_from(level).unwrap_or(100)])
}
