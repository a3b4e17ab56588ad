// ── Radio-level state and scan sightings ──

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::ids::{BleUuid, DeviceId};

/// Host Bluetooth adapter state.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RadioState {
    #[default]
    Unknown,
    PoweredOff,
    PoweredOn,
    Unauthorized,
    Unsupported,
    Resetting,
}

impl RadioState {
    pub fn is_powered_on(self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

/// Bluetooth permission status for this application.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Authorization {
    #[default]
    Unknown,
    ShowRationale,
    Authorized,
    Denied,
}

/// Link state of a single device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// One advertisement sighting. Transient: relayed once, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: DeviceId,
    pub name: Option<String>,
    pub rssi: i16,
    pub connectable: bool,
    #[serde(default)]
    pub advertised_services: Vec<BleUuid>,
    pub manufacturer_id: Option<u16>,
    pub manufacturer_name: Option<String>,
    pub manufacturer_data: Option<Bytes>,
    pub seen_at: DateTime<Utc>,
}

impl ScanResult {
    /// A bare sighting stamped with the current time.
    pub fn new(id: impl Into<DeviceId>, rssi: i16) -> Self {
        Self {
            id: id.into(),
            name: None,
            rssi,
            connectable: true,
            advertised_services: Vec::new(),
            manufacturer_id: None,
            manufacturer_name: None,
            manufacturer_data: None,
            seen_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: impl IntoIterator<Item = BleUuid>) -> Self {
        self.advertised_services = services.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_manufacturer(mut self, id: u16, name: Option<String>, data: Bytes) -> Self {
        self.manufacturer_id = Some(id);
        self.manufacturer_name = name;
        self.manufacturer_data = Some(data);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn enums_render_in_camel_case() {
        assert_eq!(RadioState::PoweredOn.to_string(), "poweredOn");
        assert_eq!(Authorization::ShowRationale.as_ref(), "showRationale");
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
        assert_eq!(
            RadioState::from_str("resetting").unwrap(),
            RadioState::Resetting
        );
    }

    #[test]
    fn defaults_match_an_idle_host() {
        assert_eq!(RadioState::default(), RadioState::Unknown);
        assert_eq!(Authorization::default(), Authorization::Unknown);
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn scan_result_serializes_with_boundary_field_names() {
        let sighting = ScanResult::new("AA:BB", -60)
            .with_name("HRM")
            .with_manufacturer(0x004c, Some("Apple".into()), Bytes::from_static(&[1, 2]));
        let json = serde_json::to_value(&sighting).unwrap();
        assert_eq!(json["id"], "AA:BB");
        assert_eq!(json["rssi"], -60);
        assert_eq!(json["manufacturerId"], 0x004c);
        assert_eq!(json["manufacturerName"], "Apple");
        assert!(json["advertisedServices"].as_array().unwrap().is_empty());
        assert!(json.get("seenAt").is_some());
    }
}
