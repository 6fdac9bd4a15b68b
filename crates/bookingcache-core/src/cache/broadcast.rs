//! Replay-last-value push channel.
//!
//! A `Broadcast` holds the most recent value and a set of subscriber
//! callbacks. Subscribing delivers the current value immediately, then every
//! later publication. Async consumers can take a `watch::Receiver` over the
//! same value instead of registering a callback.
//!
//! Each subscriber sees versions in increasing order. Deliveries to one
//! subscriber never overlap: a publication arriving while its callback runs
//! (from another thread, or from inside the callback) is parked and handed
//! over by the running delivery, superseding any older parked value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

type Callback<V> = Arc<dyn Fn(&V) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SlotState<V> {
    delivered: Option<u64>,
    delivering: bool,
    pending: Option<(u64, V)>,
}

/// One subscriber and its delivery state
struct Slot<V> {
    callback: Callback<V>,
    state: Mutex<SlotState<V>>,
}

impl<V> Slot<V> {
    fn new(callback: Callback<V>) -> Self {
        Self {
            callback,
            state: Mutex::new(SlotState {
                delivered: None,
                delivering: false,
                pending: None,
            }),
        }
    }

    fn deliver(&self, version: u64, value: V) {
        {
            let mut state = lock(&self.state);
            if state.delivered.is_some_and(|delivered| version <= delivered) {
                return;
            }
            if state.delivering {
                if state.pending.as_ref().map_or(true, |(parked, _)| version > *parked) {
                    state.pending = Some((version, value));
                }
                return;
            }
            state.delivering = true;
            state.delivered = Some(version);
        }

        let mut next = value;
        loop {
            (self.callback)(&next);

            let mut state = lock(&self.state);
            let delivered = state.delivered;
            match state.pending.take() {
                Some((version, value)) if delivered.map_or(true, |d| version > d) => {
                    state.delivered = Some(version);
                    next = value;
                }
                _ => {
                    state.delivering = false;
                    return;
                }
            }
        }
    }
}

struct Subscribers<V> {
    /// Version of the last accepted publication
    version: u64,
    next_id: u64,
    slots: Vec<(u64, Arc<Slot<V>>)>,
}

pub(crate) struct Broadcast<V> {
    subscribers: Arc<Mutex<Subscribers<V>>>,
    latest: watch::Sender<V>,
}

impl<V: Clone + Send + Sync + 'static> Broadcast<V> {
    pub fn new(initial: V) -> Self {
        let (latest, _) = watch::channel(initial);
        Self {
            subscribers: Arc::new(Mutex::new(Subscribers {
                version: 0,
                next_id: 0,
                slots: Vec::new(),
            })),
            latest,
        }
    }

    /// Deliver `value` unless a newer version has already gone out.
    /// Callbacks run after the subscriber lock is released, so they may
    /// subscribe, unsubscribe, publish or read the store.
    pub fn publish(&self, version: u64, value: V) {
        let slots: Vec<Arc<Slot<V>>> = {
            let mut subscribers = lock(&self.subscribers);
            if version <= subscribers.version {
                return;
            }
            subscribers.version = version;
            self.latest.send_replace(value.clone());
            subscribers.slots.iter().map(|(_, slot)| Arc::clone(slot)).collect()
        };

        for slot in slots {
            slot.deliver(version, value.clone());
        }
    }

    pub fn current(&self) -> V {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self, callback: impl Fn(&V) + Send + Sync + 'static) -> Subscription {
        let slot = Arc::new(Slot::new(Arc::new(callback) as Callback<V>));
        let (id, version, current) = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.next_id += 1;
            let id = subscribers.next_id;
            subscribers.slots.push((id, Arc::clone(&slot)));
            (id, subscribers.version, self.latest.borrow().clone())
        };

        // Skipped if a newer publication reached the slot first
        slot.deliver(version, current);

        let weak: Weak<Mutex<Subscribers<V>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(subscribers) = weak.upgrade() {
                    lock(&subscribers).slots.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    pub fn watch(&self) -> watch::Receiver<V> {
        self.latest.subscribe()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).slots.len()
    }
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.run_unsubscribe();
    }

    fn run_unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Read-only view of a store's channel handed to consumers.
pub struct Observable<V> {
    channel: Arc<Broadcast<V>>,
}

impl<V> Clone for Observable<V> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Observable<V> {
    pub(crate) fn new(channel: Arc<Broadcast<V>>) -> Self {
        Self { channel }
    }

    pub fn subscribe(&self, callback: impl Fn(&V) + Send + Sync + 'static) -> Subscription {
        self.channel.subscribe(callback)
    }

    pub fn current(&self) -> V {
        self.channel.current()
    }

    pub fn watch(&self) -> watch::Receiver<V> {
        self.channel.watch()
    }
}

// ============================================================================
// Tests
// ============================================================================
