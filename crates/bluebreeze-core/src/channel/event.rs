// ── Transient-occurrence channel ──

use std::fmt;
use std::sync::Arc;

use super::shared::{Shared, Subscription};
use super::Observer;

/// A multicast notifier without a cached value.
///
/// Late observers see nothing of what was emitted before they joined.
pub struct EventChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            shared: Shared::new(None),
        }
    }

    /// Notify every current observer, in subscription order.
    pub fn emit(&self, value: T) {
        self.shared.publish(value, false);
    }

    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe(f)
    }

    pub fn observe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        self.shared.subscribe(Box::new(observer), false)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscriber_count()
    }

    pub fn is_source_of(&self, subscription: &Subscription) -> bool {
        subscription.belongs_to(&self.shared)
    }
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn late_subscriber_gets_no_history() {
        let channel = EventChannel::new();
        channel.emit("before");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = Arc::clone(&seen);
            channel.subscribe(move |v: &&str| seen.lock().unwrap().push(*v))
        };
        assert!(seen.lock().unwrap().is_empty());

        channel.emit("after");
        sub.cancel();
        channel.emit("ignored");
        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn emit_without_observers_is_dropped() {
        let channel: EventChannel<u8> = EventChannel::new();
        channel.emit(1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn every_observer_receives_each_emission() {
        let channel = EventChannel::new();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let hits = Arc::clone(&hits);
                channel.subscribe(move |v: &u8| hits.lock().unwrap().push((name, *v)))
            })
            .collect();

        channel.emit(1);
        channel.emit(2);
        assert_eq!(
            *hits.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
        assert_eq!(subs.len(), 2);
    }
}
