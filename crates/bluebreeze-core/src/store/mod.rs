// ── Producer-side state ──

mod ble_store;
mod registry;

pub use ble_store::BleStore;
