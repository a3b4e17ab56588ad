// ── Characteristic channel registry ──
//
// Per-characteristic channels survive rediscovery: every `Characteristic`
// built for the same tracking key shares one `data` and one `is_notifying`
// channel, so cached values persist across reconnect cycles.

use bytes::Bytes;
use dashmap::DashMap;

use crate::channel::StateChannel;
use crate::model::TrackingKey;

#[derive(Clone)]
pub(crate) struct CharacteristicChannels {
    pub(crate) data: StateChannel<Bytes>,
    pub(crate) is_notifying: StateChannel<bool>,
}

impl CharacteristicChannels {
    fn new() -> Self {
        Self {
            data: StateChannel::with_value(Bytes::new()),
            is_notifying: StateChannel::with_value(false),
        }
    }
}

pub(crate) struct ChannelRegistry {
    by_key: DashMap<TrackingKey, CharacteristicChannels>,
}

impl ChannelRegistry {
    pub(crate) fn new() -> Self {
        Self {
            by_key: DashMap::new(),
        }
    }

    /// Channels for `key`, created on first request.
    pub(crate) fn channels_for(&self, key: TrackingKey) -> CharacteristicChannels {
        self.by_key
            .entry(key)
            .or_insert_with(CharacteristicChannels::new)
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BleUuid, DeviceId};

    fn key(c: u32) -> TrackingKey {
        TrackingKey::new(
            DeviceId::from("dev"),
            BleUuid::from_short(0x180d),
            BleUuid::from_short(c),
        )
    }

    #[test]
    fn same_key_yields_same_channels() {
        let registry = ChannelRegistry::new();
        let first = registry.channels_for(key(0x2a37));
        let again = registry.channels_for(key(0x2a37));
        assert!(first.data.same_channel(&again.data));
        assert!(first.is_notifying.same_channel(&again.is_notifying));

        let other = registry.channels_for(key(0x2a38));
        assert!(!first.data.same_channel(&other.data));
        assert_eq!(registry.len(), 2);
    }
}
