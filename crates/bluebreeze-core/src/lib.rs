//! Observable BLE device tree and the bridge that forwards it across a
//! runtime boundary.
//!
//! A BLE backend reports devices, services and characteristics as full
//! snapshots, over and over. This crate mirrors that tree into flat
//! observable channels and forwards each channel to a single event sink
//! exactly once, however often the tree is re-reported:
//!
//! - **[`StateChannel<T>`]** / **[`EventChannel<T>`]**: latest-value and
//!   transient multicast channels with synchronous, ordered, panic-isolated
//!   delivery. A new state observer receives the cached value before any
//!   later update.
//!
//! - **Entity model** ([`model`]): [`Device`](model::Device),
//!   [`Service`](model::Service) and [`Characteristic`](model::Characteristic)
//!   records owning their channels, plus serializable export values.
//!
//! - **[`BleStore`]**: the producer side. Constructs each device once per id,
//!   keeps characteristic channels alive across rediscovery, and rejects
//!   updates for entities it has never seen.
//!
//! - **[`SubscriptionTracker`]**: walks every devices and services snapshot,
//!   wiring new entities, leaving tracked ones alone and pruning whatever
//!   disappeared. [`teardown_all()`](SubscriptionTracker::teardown_all)
//!   cancels everything at once.
//!
//! - **[`Bridge`]**: attaches an [`EventSink`] to a store, answers
//!   current-value queries and resolves command targets.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod model;
pub mod sink;
pub mod store;
pub mod stream;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use channel::{EventChannel, Mapped, Observer, StateChannel, Subscription};
pub use config::{BridgeConfig, StoreConfig};
pub use error::CoreError;
pub use sink::{BridgeEvent, EventSink};
pub use store::BleStore;
pub use stream::ChannelStream;
pub use tracker::{SubscriptionTracker, TrackerStats};
