// ── Shared delivery engine ──
//
// Observer bookkeeping and ordered, panic-isolated delivery behind both
// `StateChannel` and `EventChannel`.
//
// One thread at a time owns delivery for a channel (the "drainer"). Values
// are queued under the state lock and handed to observers with the lock
// released, so observers may freely subscribe, cancel or publish. Calls made
// by the drainer itself (from inside an observer) are queued and delivered
// once the current observer returns; calls from other threads wait until
// the drainer is done.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tracing::error;

use super::Observer;

/// A registered observer. Shared between the live list and queued deliveries.
struct Slot<T> {
    id: u64,
    active: Arc<AtomicBool>,
    observer: Box<dyn Observer<T>>,
}

impl<T> Slot<T> {
    fn deliver(&self, value: &T) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_value(value)));
        if let Err(payload) = outcome {
            error!(
                subscription = self.id,
                panic = panic_message(payload.as_ref()),
                "channel observer panicked; delivery continues"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

enum Delivery<T> {
    /// A published value, for the observers registered when it was published.
    Broadcast {
        value: T,
        targets: Vec<Arc<Slot<T>>>,
    },
    /// The cached value, for one freshly registered observer.
    Replay { value: T, target: Arc<Slot<T>> },
}

struct Inner<T> {
    current: Option<T>,
    slots: Vec<Arc<Slot<T>>>,
    pending: VecDeque<Delivery<T>>,
    drainer: Option<ThreadId>,
    next_id: u64,
}

pub(crate) struct Shared<T> {
    inner: Mutex<Inner<T>>,
    idle: Condvar,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    pub(crate) fn new(current: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                current,
                slots: Vec::new(),
                pending: VecDeque::new(),
                drainer: None,
                next_id: 1,
            }),
            idle: Condvar::new(),
        })
    }

    pub(crate) fn current(&self) -> Option<T> {
        self.lock().current.clone()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().slots.len()
    }

    /// Queue `value` for every observer registered right now, caching it
    /// first when `retain` is set.
    pub(crate) fn publish(&self, value: T, retain: bool) {
        let (inner, nested) = self.enter();
        self.broadcast(inner, nested, value, retain);
    }

    /// Compute the next cached value from the current one and publish it,
    /// with no other publication in between. `f` returns `None` to leave
    /// the channel untouched; it must not call back into this channel.
    pub(crate) fn update<R>(&self, f: impl FnOnce(Option<&T>) -> (Option<T>, R)) -> R {
        let (inner, nested) = self.enter();
        let (next, result) = f(inner.current.as_ref());
        if let Some(value) = next {
            self.broadcast(inner, nested, value, true);
        }
        result
    }

    /// Register `observer`. With `replay` set and a cached value present, the
    /// new observer receives that value before any later publication.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        observer: Box<dyn Observer<T>>,
        replay: bool,
    ) -> Subscription {
        let (mut inner, nested) = self.enter();

        let id = inner.next_id;
        inner.next_id += 1;
        let active = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(Slot {
            id,
            active: Arc::clone(&active),
            observer,
        });
        inner.slots.push(Arc::clone(&slot));

        if replay {
            if let Some(value) = inner.current.clone() {
                inner.pending.push_back(Delivery::Replay {
                    value,
                    target: slot,
                });
            }
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let owner: Weak<dyn Detach> = weak;
        let subscription = Subscription { id, active, owner };

        if !nested {
            self.drain(inner);
        }
        subscription
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn broadcast<'a>(
        &'a self,
        mut inner: MutexGuard<'a, Inner<T>>,
        nested: bool,
        value: T,
        retain: bool,
    ) {
        if retain {
            inner.current = Some(value.clone());
        }
        if inner.slots.is_empty() {
            return;
        }
        let targets = inner.slots.clone();
        inner.pending.push_back(Delivery::Broadcast { value, targets });
        if !nested {
            self.drain(inner);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state once no other thread is delivering. The flag is true
    /// when the calling thread is the drainer (a call from inside an observer).
    fn enter(&self) -> (MutexGuard<'_, Inner<T>>, bool) {
        let me = thread::current().id();
        let mut inner = self.lock();
        loop {
            match inner.drainer {
                None => return (inner, false),
                Some(owner) if owner == me => return (inner, true),
                Some(_) => {
                    inner = self
                        .idle
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn drain<'a>(&'a self, mut inner: MutexGuard<'a, Inner<T>>) {
        inner.drainer = Some(thread::current().id());
        while let Some(delivery) = inner.pending.pop_front() {
            drop(inner);
            match delivery {
                Delivery::Broadcast { value, targets } => {
                    for slot in &targets {
                        slot.deliver(&value);
                    }
                }
                Delivery::Replay { value, target } => target.deliver(&value),
            }
            inner = self.lock();
        }
        inner.drainer = None;
        drop(inner);
        self.idle.notify_all();
    }
}

/// Type-erased removal hook so `Subscription` need not carry `T`.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send + Sync> Detach for Shared<T> {
    fn detach(&self, id: u64) {
        let removed = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .slots
                .iter()
                .position(|slot| slot.id == id)
                .map(|index| inner.slots.remove(index))
        };
        // Dropped outside the lock: the observer may own other channels.
        drop(removed);
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle to one registered observer.
///
/// [`cancel()`](Self::cancel) removes the observer; it is idempotent and
/// safe after the channel itself is gone. Dropping the handle cancels it.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    /// Stop delivery to this observer.
    ///
    /// A delivery already running on another thread completes; nothing is
    /// delivered after that.
    pub fn cancel(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(owner) = self.owner.upgrade() {
                owner.detach(self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether this subscription was made on the channel behind `shared`.
    pub(crate) fn belongs_to<T>(&self, shared: &Arc<Shared<T>>) -> bool {
        std::ptr::addr_eq(self.owner.as_ptr(), Arc::as_ptr(shared))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
