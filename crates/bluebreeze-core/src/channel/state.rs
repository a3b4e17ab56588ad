// ── Latest-value channel ──

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::shared::{Shared, Subscription};
use super::Observer;

/// A single cached value plus a multicast notifier.
///
/// Every observer that joins while a value is cached receives that value
/// synchronously, before [`subscribe()`](Self::subscribe) returns and before
/// any later update. A channel that has never been set skips the replay.
///
/// Cloning is cheap and yields a handle to the same channel.
pub struct StateChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateChannel<T> {
    /// A channel with no value yet.
    pub fn new() -> Self {
        Self {
            shared: Shared::new(None),
        }
    }

    /// A channel seeded with `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            shared: Shared::new(Some(value)),
        }
    }

    /// The cached value, if any. No side effects.
    pub fn get(&self) -> Option<T> {
        self.shared.current()
    }

    /// Replace the cached value and notify every current observer in
    /// subscription order. Observers registered while this call is
    /// delivering only see `value` through their replay.
    pub fn set(&self, value: T) {
        self.shared.publish(value, true);
    }

    /// Replace the cached value with one computed from it, atomically with
    /// respect to other `set`/`update` calls on this channel.
    ///
    /// `f` sees the current value and returns the value to publish (or
    /// `None` to publish nothing) plus a result handed back to the caller.
    /// Called from inside an observer of this channel, `f` sees the most
    /// recently published value and its publication is queued behind the
    /// delivery in progress.
    /// `f` runs under the channel lock and must not touch this channel.
    pub fn update<R, F>(&self, f: F) -> R
    where
        F: FnOnce(Option<&T>) -> (Option<T>, R),
    {
        self.shared.update(f)
    }

    /// Register a closure observer. See [`observe()`](Self::observe).
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe(f)
    }

    /// Register `observer`, replaying the cached value to it first.
    ///
    /// Called from inside an observer of this same channel, the replay is
    /// queued behind the delivery in progress rather than run immediately.
    pub fn observe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        self.shared.subscribe(Box::new(observer), true)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscriber_count()
    }

    /// True when both handles point at the same channel.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// True when `subscription` was made on this channel.
    pub fn is_source_of(&self, subscription: &Subscription) -> bool {
        subscription.belongs_to(&self.shared)
    }

    /// Derive a channel holding `f` applied to this channel's values.
    ///
    /// The derived channel is seeded from the current value (if any) and
    /// follows every update for as long as the returned [`Mapped`] lives.
    pub fn map<U, F>(&self, f: F) -> Mapped<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let channel = StateChannel::new();
        let target = channel.clone();
        let link = self.subscribe(move |value| target.set(f(value)));
        Mapped {
            channel,
            _link: link,
        }
    }
}

impl<T> Clone for StateChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for StateChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for StateChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChannel")
            .field("current", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ── Mapped ───────────────────────────────────────────────────────────

/// A derived [`StateChannel`] kept in sync with its source.
///
/// Dereferences to the derived channel. Dropping it unhooks the source.
pub struct Mapped<U> {
    channel: StateChannel<U>,
    _link: Subscription,
}

impl<U> Mapped<U> {
    /// A standalone handle to the derived channel. It stops receiving
    /// updates once this `Mapped` is dropped.
    pub fn channel(&self) -> StateChannel<U> {
        self.channel.clone()
    }
}

impl<U> Deref for Mapped<U> {
    type Target = StateChannel<U>;

    fn deref(&self) -> &Self::Target {
        &self.channel
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync)
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &T| sink.lock().unwrap().push(v.clone()))
    }

    #[test]
    fn get_is_none_until_first_set() {
        let channel: StateChannel<u32> = StateChannel::new();
        assert_eq!(channel.get(), None);
        channel.set(7);
        assert_eq!(channel.get(), Some(7));
    }

    #[test]
    fn subscribe_replays_cached_value_exactly_once() {
        let channel = StateChannel::with_value(1);
        let (seen, observer) = recorder();
        let _sub = channel.subscribe(observer);
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        channel.set(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn subscribe_without_value_skips_replay() {
        let channel: StateChannel<&str> = StateChannel::new();
        let (seen, observer) = recorder();
        let _sub = channel.subscribe(observer);
        assert!(seen.lock().unwrap().is_empty());

        channel.set("first");
        assert_eq!(*seen.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn set_notifies_in_subscription_order() {
        let channel = StateChannel::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                channel.subscribe(move |_: &u8| order.lock().unwrap().push(i))
            })
            .collect();

        channel.set(0);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn observer_added_during_set_sees_value_only_through_replay() {
        let channel = StateChannel::new();
        let (late_seen, late_observer) = recorder::<u32>();
        let late_observer = Arc::new(late_observer);
        let late_sub = Arc::new(Mutex::new(None));

        let _outer = {
            let channel = channel.clone();
            let late_sub = Arc::clone(&late_sub);
            let late_observer = Arc::clone(&late_observer);
            channel.clone().subscribe(move |_: &u32| {
                let mut slot = late_sub.lock().unwrap();
                if slot.is_none() {
                    let observer = Arc::clone(&late_observer);
                    *slot = Some(channel.subscribe(move |v: &u32| (*observer)(v)));
                }
            })
        };

        channel.set(5);
        assert_eq!(*late_seen.lock().unwrap(), vec![5]);

        channel.set(6);
        assert_eq!(*late_seen.lock().unwrap(), vec![5, 6]);
    }

    #[test]
    fn nested_set_is_delivered_after_the_current_value() {
        let channel = StateChannel::new();
        let (seen, observer) = recorder::<u32>();

        let _bump = {
            let channel = channel.clone();
            channel.clone().subscribe(move |v: &u32| {
                if *v == 1 {
                    channel.set(2);
                }
            })
        };
        let _record = channel.subscribe(observer);

        channel.set(1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(channel.get(), Some(2));
    }

    #[test]
    fn cancel_is_idempotent() {
        let channel = StateChannel::with_value(0);
        let (seen, observer) = recorder();
        let sub = channel.subscribe(observer);
        assert_eq!(channel.subscriber_count(), 1);

        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        assert_eq!(channel.subscriber_count(), 0);

        channel.set(1);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn cancel_after_channel_dropped_is_a_noop() {
        let channel = StateChannel::with_value(0u8);
        let sub = channel.subscribe(|_: &u8| {});
        drop(channel);
        sub.cancel();
        drop(sub);
    }

    #[test]
    fn dropping_subscription_cancels_it() {
        let channel = StateChannel::new();
        let (seen, observer) = recorder();
        {
            let _sub = channel.subscribe(observer);
            channel.set(1);
        }
        channel.set(2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn observer_may_cancel_itself_mid_delivery() {
        let channel = StateChannel::new();
        let hits = Arc::new(Mutex::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            channel.subscribe(move |_: &u8| {
                *hits.lock().unwrap() += 1;
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.cancel();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        channel.set(1);
        channel.set(2);
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn cancel_from_another_thread_during_delivery_stops_later_values() {
        let channel = StateChannel::new();
        let handoff = Arc::new(Barrier::new(2));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sub = {
            let handoff = Arc::clone(&handoff);
            let seen = Arc::clone(&seen);
            channel.subscribe(move |v: &u32| {
                seen.lock().unwrap().push(*v);
                if *v == 1 {
                    handoff.wait();
                    handoff.wait();
                }
            })
        };

        let publisher = {
            let channel = channel.clone();
            thread::spawn(move || {
                channel.set(1);
                channel.set(2);
            })
        };
        handoff.wait();
        sub.cancel();
        handoff.wait();
        publisher.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.get(), Some(2));
    }

    #[test]
    fn update_reads_and_publishes_under_one_lock() {
        let channel = StateChannel::with_value(0u32);
        let (seen, observer) = recorder();
        let _sub = channel.subscribe(observer);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let channel = channel.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        channel.update(|v| (Some(v.copied().unwrap_or(0) + 1), ()));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(channel.get(), Some(1_000));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1_001);
        assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn update_returning_none_publishes_nothing() {
        let channel = StateChannel::with_value(7u8);
        let (seen, observer) = recorder();
        let _sub = channel.subscribe(observer);

        let previous = channel.update(|v| (None, v.copied()));
        assert_eq!(previous, Some(7));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn panicking_observer_does_not_starve_the_rest() {
        let channel = StateChannel::new();
        let _boom = channel.subscribe(|v: &u8| {
            assert!(*v != 1, "observer rejects 1");
        });
        let (seen, observer) = recorder();
        let _record = channel.subscribe(observer);

        channel.set(1);
        channel.set(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn concurrent_subscribers_never_see_values_out_of_order() {
        let channel = StateChannel::with_value(0u32);
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                for v in 1..=2_000 {
                    channel.set(v);
                }
            })
        };

        let mut recorders = Vec::new();
        for _ in 0..8 {
            let (seen, observer) = recorder();
            recorders.push((seen, channel.subscribe(observer)));
        }
        producer.join().unwrap();

        for (seen, _sub) in &recorders {
            let seen = seen.lock().unwrap();
            assert!(!seen.is_empty());
            assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {seen:?}");
            assert_eq!(seen.last(), Some(&2_000));
        }
    }

    #[test]
    fn map_follows_source_while_alive() {
        let source = StateChannel::with_value(2u32);
        let doubled = source.map(|v| v * 2);
        assert_eq!(doubled.get(), Some(4));

        source.set(5);
        assert_eq!(doubled.get(), Some(10));

        let detached = doubled.channel();
        drop(doubled);
        source.set(6);
        assert_eq!(detached.get(), Some(10));
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn same_channel_and_source_checks() {
        let a = StateChannel::with_value(1u8);
        let b = StateChannel::with_value(1u8);
        assert!(a.same_channel(&a.clone()));
        assert!(!a.same_channel(&b));

        let sub = a.subscribe(|_: &u8| {});
        assert!(a.is_source_of(&sub));
        assert!(!b.is_source_of(&sub));
    }
}
