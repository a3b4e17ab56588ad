// ── Identity types ──
//
// Stable identifiers for devices, services and characteristics, and the
// composite key the tracker deduplicates characteristic wiring on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ── DeviceId ────────────────────────────────────────────────────────

/// Opaque, stable device identifier (a MAC address on some hosts, a
/// platform UUID on others). Compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── BleUuid ─────────────────────────────────────────────────────────

/// Bluetooth base UUID `00000000-0000-1000-8000-00805f9b34fb`.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;
const BASE_MASK: u128 = (1 << 96) - 1;

/// A GATT service or characteristic UUID.
///
/// Parses 16-bit (`"180d"`), 32-bit (`"0000180d"`) and full 128-bit forms;
/// short forms are expanded against the Bluetooth base UUID. Always
/// rendered as a lowercase hyphenated 128-bit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BleUuid(Uuid);

impl BleUuid {
    /// Expand a 16- or 32-bit assigned number.
    pub fn from_short(short: u32) -> Self {
        Self(Uuid::from_u128((u128::from(short) << 96) | BASE_UUID))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The assigned number, if this UUID lives in the Bluetooth base range.
    pub fn short(&self) -> Option<u32> {
        let raw = self.0.as_u128();
        if raw & BASE_MASK == BASE_UUID {
            u32::try_from(raw >> 96).ok()
        } else {
            None
        }
    }

    /// Human-readable name for well-known SIG services and characteristics.
    pub fn known_name(&self) -> Option<&'static str> {
        let name = match self.short()? {
            // Services
            0x1800 => "Generic Access",
            0x1801 => "Generic Attribute",
            0x180a => "Device Information",
            0x180d => "Heart Rate",
            0x180f => "Battery Service",
            0x1812 => "Human Interface Device",
            0x1816 => "Cycling Speed and Cadence",
            0x1818 => "Cycling Power",
            0x181a => "Environmental Sensing",
            // Characteristics
            0x2a00 => "Device Name",
            0x2a01 => "Appearance",
            0x2a05 => "Service Changed",
            0x2a19 => "Battery Level",
            0x2a24 => "Model Number String",
            0x2a25 => "Serial Number String",
            0x2a26 => "Firmware Revision String",
            0x2a27 => "Hardware Revision String",
            0x2a28 => "Software Revision String",
            0x2a29 => "Manufacturer Name String",
            0x2a37 => "Heart Rate Measurement",
            0x2a38 => "Body Sensor Location",
            0x2a6e => "Temperature",
            0x2a6f => "Humidity",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for BleUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for BleUuid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || CoreError::InvalidUuid {
            value: s.to_owned(),
        };

        match trimmed.len() {
            4 | 8 if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) => Err(invalid()),
            4 | 8 => u32::from_str_radix(trimmed, 16)
                .map(Self::from_short)
                .map_err(|_| invalid()),
            _ => Uuid::parse_str(trimmed).map(Self).map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for BleUuid {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BleUuid> for String {
    fn from(id: BleUuid) -> Self {
        id.to_string()
    }
}

impl From<Uuid> for BleUuid {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

// ── TrackingKey ─────────────────────────────────────────────────────

/// Composite identity of one characteristic within one device's services.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingKey {
    pub device_id: DeviceId,
    pub service_id: BleUuid,
    pub characteristic_id: BleUuid,
}

impl TrackingKey {
    pub fn new(device_id: DeviceId, service_id: BleUuid, characteristic_id: BleUuid) -> Self {
        Self {
            device_id,
            service_id,
            characteristic_id,
        }
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.device_id, self.service_id, self.characteristic_id
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn short_forms_expand_against_base_uuid() {
        let heart_rate: BleUuid = "180D".parse().unwrap();
        assert_eq!(
            heart_rate.to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(heart_rate.short(), Some(0x180d));

        let long: BleUuid = "0000180d".parse().unwrap();
        assert_eq!(long, heart_rate);
    }

    #[test]
    fn full_uuid_round_trips_through_display() {
        let raw = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
        let id: BleUuid = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert_eq!(id.short(), None);
        assert_eq!(id.known_name(), None);
    }

    #[test]
    fn full_form_of_short_uuid_is_recognised() {
        let id: BleUuid = "00002A19-0000-1000-8000-00805F9B34FB".parse().unwrap();
        assert_eq!(id.short(), Some(0x2a19));
        assert_eq!(id.known_name(), Some("Battery Level"));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = "zz".parse::<BleUuid>().unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidUuid {
                value: "zz".into()
            }
        );
        assert!("xyz1".parse::<BleUuid>().is_err());
    }

    #[test]
    fn short_forms_must_be_bare_hex() {
        for input in ["+18d", "-18d", "+0002a19", "0x18"] {
            assert!(input.parse::<BleUuid>().is_err(), "{input} parsed");
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let id = BleUuid::from_short(0x180f);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0000180f-0000-1000-8000-00805f9b34fb\"");
        let back: BleUuid = serde_json::from_str("\"180f\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn tracking_key_display_joins_components() {
        let key = TrackingKey::new(
            DeviceId::from("AA:BB"),
            BleUuid::from_short(0x180d),
            BleUuid::from_short(0x2a37),
        );
        assert_eq!(
            key.to_string(),
            "AA:BB:0000180d-0000-1000-8000-00805f9b34fb:00002a37-0000-1000-8000-00805f9b34fb"
        );
    }
}
