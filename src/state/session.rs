//! Observable cell holding the current session user.
//!
//! DESIGN
//! ======
//! Subscribers are plain callbacks, invoked on every `set` in `set` order and
//! once on subscription with the value current at that point. Writes append
//! to a delivery queue. One thread at a time drains it, with no lock held
//! while a callback runs, so callbacks may write the cell or subscribe. A
//! write made while another delivery is running is queued behind it and
//! delivered by the draining thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::net::types::User;

type Callback = Arc<dyn Fn(Option<&User>) + Send + Sync>;

/// Shared handle to the current session user. Clones observe the same cell.
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cell: Mutex<Cell>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Cell {
    user: Option<User>,
    /// Last value handed to subscribers; replayed to late joiners.
    delivered: Option<User>,
    queue: VecDeque<Event>,
    draining: bool,
}

enum Event {
    Changed(Option<User>),
    Joined(u64, Callback),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current user.
    #[must_use]
    pub fn get(&self) -> Option<User> {
        lock(&self.inner.cell).user.clone()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        lock(&self.inner.cell).user.is_some()
    }

    /// Replace the current user and notify every subscriber. Notification
    /// happens when the returned [`Delivery`] is dropped, so a discarded
    /// result notifies at once.
    pub(crate) fn set(&self, user: Option<User>) -> Delivery<'_> {
        let mut cell = lock(&self.inner.cell);
        cell.user.clone_from(&user);
        self.enqueue(cell, Event::Changed(user))
    }

    /// Edit the current user in place and notify. Returns `false` (and does
    /// not notify) when no user is present.
    pub(crate) fn update(&self, edit: impl FnOnce(&mut User)) -> bool {
        let mut cell = lock(&self.inner.cell);
        let Some(user) = cell.user.as_mut() else {
            return false;
        };
        edit(user);
        let snapshot = user.clone();
        drop(self.enqueue(cell, Event::Changed(Some(snapshot))));
        true
    }

    /// Register `callback`; it is called with the current value before this
    /// returns, unless another delivery is running, in which case it is
    /// replayed in turn.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&User>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cell = lock(&self.inner.cell);
        drop(self.enqueue(cell, Event::Joined(id, Arc::new(callback))));
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let queued = lock(&self.inner.cell)
            .queue
            .iter()
            .filter(|event| matches!(event, Event::Joined(..)))
            .count();
        lock(&self.inner.subscribers).len() + queued
    }

    fn enqueue(&self, mut cell: MutexGuard<'_, Cell>, event: Event) -> Delivery<'_> {
        cell.queue.push_back(event);
        if cell.draining {
            return Delivery { session: None };
        }
        cell.draining = true;
        Delivery { session: Some(self) }
    }

    fn drain(&self) {
        let _reset = DrainReset(&self.inner);
        loop {
            let (callbacks, user) = {
                let mut cell = lock(&self.inner.cell);
                match cell.queue.pop_front() {
                    None => {
                        cell.draining = false;
                        return;
                    }
                    Some(Event::Changed(user)) => {
                        cell.delivered.clone_from(&user);
                        let callbacks: Vec<Callback> = lock(&self.inner.subscribers)
                            .iter()
                            .map(|(_, cb)| Arc::clone(cb))
                            .collect();
                        (callbacks, user)
                    }
                    Some(Event::Joined(id, callback)) => {
                        lock(&self.inner.subscribers).push((id, Arc::clone(&callback)));
                        (vec![callback], cell.delivered.clone())
                    }
                }
            };
            for callback in callbacks {
                callback(user.as_ref());
            }
        }
    }
}

/// Pending notifications from a write. Dropping it delivers them; holding
/// it defers them, e.g. past a lock the caller still owns.
pub(crate) struct Delivery<'a> {
    session: Option<&'a SessionState>,
}

impl Delivery<'_> {
    /// Nothing to deliver.
    pub(crate) fn none() -> Self {
        Delivery { session: None }
    }
}

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.drain();
        }
    }
}

/// Releases the drain role if a callback panics mid-delivery.
struct DrainReset<'a>(&'a Inner);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut cell = lock(&self.0.cell);
            cell.queue.clear();
            cell.draining = false;
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("user", &self.get().map(|u| u.username))
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a subscription alive; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.subscribers).retain(|(id, _)| *id != self.id);
            // Not yet delivered: drop the pending join too.
            lock(&inner.cell)
                .queue
                .retain(|event| !matches!(event, Event::Joined(id, _) if *id == self.id));
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
