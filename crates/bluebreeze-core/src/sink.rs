// ── Outbound events ──
//
// Every value the bridge forwards leaves the core as a `BridgeEvent`
// delivered to the boundary's `EventSink`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use serde::Serialize;
use strum::IntoStaticStr;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::model::{
    Authorization, BleUuid, ConnectionStatus, DeviceId, DeviceSnapshot, RadioState, ScanResult,
    ServiceSnapshot,
};

/// One forwarded notification, tagged by category.
///
/// Serializes as `{"event": "<category>", "payload": ...}` with camelCase
/// names throughout.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
#[strum(serialize_all = "camelCase")]
pub enum BridgeEvent {
    StateChanged(RadioState),
    AuthorizationChanged(Authorization),
    ScanEnabledChanged(bool),
    ScanResult(ScanResult),
    DevicesChanged(Vec<DeviceSnapshot>),
    ConnectionStatusChanged {
        device_id: DeviceId,
        status: ConnectionStatus,
    },
    ServicesChanged {
        device_id: DeviceId,
        services: Vec<ServiceSnapshot>,
    },
    MtuChanged {
        device_id: DeviceId,
        mtu: u16,
    },
    CharacteristicDataChanged {
        device_id: DeviceId,
        service_id: BleUuid,
        characteristic_id: BleUuid,
        value: Bytes,
    },
    NotifyEnabledChanged {
        device_id: DeviceId,
        service_id: BleUuid,
        characteristic_id: BleUuid,
        enabled: bool,
    },
}

impl BridgeEvent {
    /// Category name, as used in the serialized `event` tag.
    pub fn category(&self) -> &'static str {
        self.into()
    }

    /// The device this event concerns, for per-device categories.
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::ConnectionStatusChanged { device_id, .. }
            | Self::ServicesChanged { device_id, .. }
            | Self::MtuChanged { device_id, .. }
            | Self::CharacteristicDataChanged { device_id, .. }
            | Self::NotifyEnabledChanged { device_id, .. } => Some(device_id),
            Self::ScanResult(result) => Some(&result.id),
            Self::StateChanged(_)
            | Self::AuthorizationChanged(_)
            | Self::ScanEnabledChanged(_)
            | Self::DevicesChanged(_) => None,
        }
    }
}

// ── EventSink ────────────────────────────────────────────────────────

/// Receiver of forwarded events, supplied by the boundary layer.
///
/// Called synchronously on whichever thread published the value; a sink
/// that needs a specific thread must hand the event off itself.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: BridgeEvent);
}

impl<F> EventSink for F
where
    F: Fn(BridgeEvent) + Send + Sync,
{
    fn deliver(&self, event: BridgeEvent) {
        self(event);
    }
}

impl EventSink for mpsc::UnboundedSender<BridgeEvent> {
    fn deliver(&self, event: BridgeEvent) {
        if let Err(mpsc::error::SendError(event)) = self.send(event) {
            warn!(event = event.category(), "event receiver closed; dropping");
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

struct SinkSlot(Box<dyn EventSink>);

/// Swappable holder for the current sink. Events sent while no sink is
/// installed are dropped.
pub(crate) struct Outbound {
    sink: ArcSwapOption<SinkSlot>,
}

impl Outbound {
    pub(crate) fn new() -> Self {
        Self {
            sink: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn install(&self, sink: Box<dyn EventSink>) {
        self.sink.store(Some(Arc::new(SinkSlot(sink))));
    }

    pub(crate) fn clear(&self) {
        self.sink.store(None);
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.sink.load().is_some()
    }

    pub(crate) fn send(&self, event: BridgeEvent) {
        let guard = self.sink.load();
        match guard.as_ref() {
            Some(slot) => {
                trace!(event = event.category(), "relay");
                slot.0.deliver(event);
            }
            None => trace!(event = event.category(), "no sink installed; dropping"),
        }
    }
}
