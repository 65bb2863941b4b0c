//! Observable value holder: current value + synchronously notified subscribers.
//!
//! The session exposes its connection state and message log through this
//! type so a UI layer can react to changes without owning any of the
//! mutation paths. Subscribers run synchronously, in registration order, on
//! the thread that performed the mutation.
//!
//! Subscribers must not subscribe or unsubscribe from inside a
//! notification callback; the subscriber list is locked while it runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Recover the guard from a poisoned lock; session state stays usable even
/// if a subscriber panicked mid-notification.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Subscriber<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Observable::subscribe`]; pass it back to
/// [`Observable::unsubscribe`] to stop receiving notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscribers<T> {
    next_id: u64,
    // Vec keeps notification order equal to registration order.
    entries: Vec<(u64, Subscriber<T>)>,
}

/// A shared value whose changes are pushed to registered subscribers.
pub struct Observable<T> {
    value: Mutex<T>,
    subscribers: Mutex<Subscribers<T>>,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Replace the value and notify every subscriber, even when the new
    /// value equals the old one.
    pub fn set(&self, next: T) {
        {
            *lock(&self.value) = next.clone();
        }
        self.notify(&next);
    }

    /// Mutate the value in place and notify subscribers with the result.
    pub fn update(&self, mutate: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut guard = lock(&self.value);
            mutate(&mut guard);
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Register a subscriber; it is NOT called with the current value,
    /// only with subsequent changes.
    pub fn subscribe(&self, subscriber: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut guard = lock(&self.subscribers);
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push((id, Box::new(subscriber)));
        SubscriptionId(id)
    }

    /// Remove one subscriber. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.subscribers).entries.retain(|(sid, _)| *sid != id.0);
    }

    /// Drop every subscriber. Called on session teardown.
    pub fn clear_subscribers(&self) {
        lock(&self.subscribers).entries.clear();
    }

    fn notify(&self, value: &T) {
        let guard = lock(&self.subscribers);
        for (_, subscriber) in &guard.entries {
            subscriber(value);
        }
    }
}
