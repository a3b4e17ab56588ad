//! Rendering of forwarded events for stdout.

use std::fmt::Write as _;

use bluebreeze_core::BridgeEvent;
use bluebreeze_core::model::BleUuid;

use crate::cli::EventFormat;

pub fn render(event: &BridgeEvent, format: EventFormat) -> color_eyre::Result<String> {
    match format {
        EventFormat::Json => Ok(serde_json::to_string(event)?),
        EventFormat::Text => Ok(render_text(event)),
    }
}

fn render_text(event: &BridgeEvent) -> String {
    let mut line = format!("{:<26}", event.category());
    let _ = match event {
        BridgeEvent::StateChanged(state) => write!(line, "{state}"),
        BridgeEvent::AuthorizationChanged(authorization) => write!(line, "{authorization}"),
        BridgeEvent::ScanEnabledChanged(enabled) => write!(line, "{enabled}"),
        BridgeEvent::ScanResult(result) => write!(
            line,
            "{} rssi={} name={}",
            result.id,
            result.rssi,
            result.name.as_deref().unwrap_or("-")
        ),
        BridgeEvent::DevicesChanged(devices) => {
            let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
            write!(line, "[{}]", ids.join(", "))
        }
        BridgeEvent::ConnectionStatusChanged { device_id, status } => {
            write!(line, "{device_id} {status}")
        }
        BridgeEvent::ServicesChanged {
            device_id,
            services,
        } => {
            let names: Vec<_> = services
                .iter()
                .map(|s| s.name.clone().unwrap_or_else(|| label(&s.id)))
                .collect();
            write!(line, "{device_id} [{}]", names.join(", "))
        }
        BridgeEvent::MtuChanged { device_id, mtu } => write!(line, "{device_id} mtu={mtu}"),
        BridgeEvent::CharacteristicDataChanged {
            device_id,
            characteristic_id,
            value,
            ..
        } => write!(
            line,
            "{device_id} {} = {}",
            label(characteristic_id),
            hex(value)
        ),
        BridgeEvent::NotifyEnabledChanged {
            device_id,
            characteristic_id,
            enabled,
            ..
        } => write!(line, "{device_id} {} notify={enabled}", label(characteristic_id)),
    };
    line.trim_end().to_owned()
}

/// Short hex form for SIG-assigned ids, full UUID otherwise.
fn label(id: &BleUuid) -> String {
    id.short()
        .map_or_else(|| id.to_string(), |short| format!("{short:#06x}"))
}

fn hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".into();
    }
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
