// ── GATT service and characteristic entities ──

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::ids::BleUuid;
use crate::channel::StateChannel;

/// Capability advertised by a characteristic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CharacteristicProperty {
    Read,
    WriteWithoutResponse,
    WriteWithResponse,
    Notify,
}

/// A characteristic as discovered on one connection.
///
/// `data` and `is_notifying` outlive the record: rediscovery builds a new
/// `Characteristic` around the same channels.
#[derive(Debug)]
pub struct Characteristic {
    pub id: BleUuid,
    pub name: Option<String>,
    pub properties: BTreeSet<CharacteristicProperty>,
    pub data: StateChannel<Bytes>,
    pub is_notifying: StateChannel<bool>,
}

impl Characteristic {
    /// A characteristic with fresh channels: empty data, not notifying.
    pub fn new(descriptor: CharacteristicDescriptor) -> Self {
        Self::with_channels(
            descriptor,
            StateChannel::with_value(Bytes::new()),
            StateChannel::with_value(false),
        )
    }

    pub fn with_channels(
        descriptor: CharacteristicDescriptor,
        data: StateChannel<Bytes>,
        is_notifying: StateChannel<bool>,
    ) -> Self {
        let name = descriptor
            .name
            .or_else(|| descriptor.id.known_name().map(str::to_owned));
        Self {
            id: descriptor.id,
            name,
            properties: descriptor.properties,
            data,
            is_notifying,
        }
    }

    pub fn supports(&self, property: CharacteristicProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn snapshot(&self) -> CharacteristicSnapshot {
        CharacteristicSnapshot {
            id: self.id,
            name: self.name.clone(),
            properties: self.properties.iter().copied().collect(),
        }
    }
}

/// One discovered service. Immutable: rediscovery yields a new value.
#[derive(Debug)]
pub struct Service {
    pub id: BleUuid,
    pub name: Option<String>,
    pub characteristics: Vec<Arc<Characteristic>>,
}

impl Service {
    pub fn new(
        id: BleUuid,
        name: Option<String>,
        characteristics: Vec<Arc<Characteristic>>,
    ) -> Self {
        let name = name.or_else(|| id.known_name().map(str::to_owned));
        Self {
            id,
            name,
            characteristics,
        }
    }

    pub fn characteristic(&self, id: &BleUuid) -> Option<&Arc<Characteristic>> {
        self.characteristics.iter().find(|c| c.id == *id)
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            id: self.id,
            name: self.name.clone(),
            characteristics: self
                .characteristics
                .iter()
                .map(|c| c.snapshot())
                .collect(),
        }
    }
}

/// A device's services keyed by id, in discovery order.
pub type ServiceMap = IndexMap<BleUuid, Arc<Service>>;

/// Plain export values for a services snapshot.
pub fn snapshot_services(services: &ServiceMap) -> Vec<ServiceSnapshot> {
    services.values().map(|s| s.snapshot()).collect()
}

// ── Export values ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicSnapshot {
    pub id: BleUuid,
    pub name: Option<String>,
    pub properties: Vec<CharacteristicProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub id: BleUuid,
    pub name: Option<String>,
    pub characteristics: Vec<CharacteristicSnapshot>,
}

// ── Producer input ───────────────────────────────────────────────────

/// What a discovery pass reports for one characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicDescriptor {
    pub id: BleUuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: BTreeSet<CharacteristicProperty>,
}

impl CharacteristicDescriptor {
    pub fn new(id: BleUuid, properties: impl IntoIterator<Item = CharacteristicProperty>) -> Self {
        Self {
            id,
            name: None,
            properties: properties.into_iter().collect(),
        }
    }
}

/// What a discovery pass reports for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: BleUuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub characteristics: Vec<CharacteristicDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(id: BleUuid, characteristics: Vec<CharacteristicDescriptor>) -> Self {
        Self {
            id,
            name: None,
            characteristics,
        }
    }
}
