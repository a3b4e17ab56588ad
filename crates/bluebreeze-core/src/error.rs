// ── Core error types ──
//
// Errors surfaced by producer-side updates and command-target lookups.
// Queries never fail: an unknown id reads as an absent value.

use thiserror::Error;

use crate::model::{BleUuid, DeviceId, TrackingKey};

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: DeviceId },

    #[error("Service not found: {service_id} on device {device_id}")]
    ServiceNotFound {
        device_id: DeviceId,
        service_id: BleUuid,
    },

    #[error("Characteristic not found: {key}")]
    CharacteristicNotFound { key: TrackingKey },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid UUID: {value:?}")]
    InvalidUuid { value: String },
}

impl CoreError {
    /// True for the three lookup failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::ServiceNotFound { .. }
                | Self::CharacteristicNotFound { .. }
        )
    }
}
