// ── Runtime configuration for the core ──
//
// Built by the embedding application and handed to the store and bridge.
// The core never reads config files itself.

use serde::{Deserialize, Serialize};

/// Default ATT MTU before any negotiation.
pub const DEFAULT_MTU: u16 = 23;

/// Settings for the producer-side [`BleStore`](crate::store::BleStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// MTU a newly seen device starts with.
    pub default_mtu: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_mtu: DEFAULT_MTU,
        }
    }
}

/// Settings for the [`Bridge`](crate::bridge::Bridge).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Scan sightings weaker than this (dBm) are not relayed.
    pub min_scan_rssi: Option<i16>,
}

impl BridgeConfig {
    pub(crate) fn admits_rssi(&self, rssi: i16) -> bool {
        self.min_scan_rssi.is_none_or(|min| rssi >= min)
    }
}
