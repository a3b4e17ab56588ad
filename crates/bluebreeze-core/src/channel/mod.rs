// ── Observable channels ──
//
// `StateChannel` caches the latest value and replays it to every new
// observer; `EventChannel` only fans out transient occurrences. Both deliver
// synchronously on the publishing thread, in publication order, and isolate
// each observer invocation from the others.

mod event;
mod shared;
mod state;

pub use event::EventChannel;
pub use shared::Subscription;
pub use state::{Mapped, StateChannel};

/// Receiver of channel values.
///
/// Implemented for every `Fn(&T) + Send + Sync` closure, so most callers
/// never name this trait.
pub trait Observer<T>: Send + Sync {
    fn on_value(&self, value: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_value(&self, value: &T) {
        self(value);
    }
}
