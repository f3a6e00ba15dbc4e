// src/status/publisher.rs
use super::Status;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use uuid::Uuid;

/// Receives every status published while it is subscribed.
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, status: &Status);
}

impl<F> StatusObserver for F
where
    F: Fn(&Status) + Send + Sync,
{
    fn on_status_changed(&self, status: &Status) {
        self(status)
    }
}

struct Inner {
    current: watch::Sender<Status>,
    observers: DashMap<Uuid, Arc<dyn StatusObserver>>,
}

/// Retains the most recent status and fans it out to observers.
///
/// Observers are called synchronously on the publishing thread, so nothing
/// is queued: a newer publish simply replaces the retained value.
#[derive(Clone)]
pub struct StatusPublisher {
    inner: Arc<Inner>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (current, _) = watch::channel(Status::unknown());
        Self {
            inner: Arc::new(Inner {
                current,
                observers: DashMap::new(),
            }),
        }
    }

    pub fn publish(&self, status: Status) {
        self.inner.current.send_replace(status.clone());

        // Snapshot first so observers may (un)subscribe from their callback.
        let observers: Vec<Arc<dyn StatusObserver>> = self
            .inner
            .observers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for observer in observers {
            observer.on_status_changed(&status);
        }
    }

    pub fn current(&self) -> Status {
        self.inner.current.borrow().clone()
    }

    pub fn subscribe(&self, observer: Arc<dyn StatusObserver>) -> Subscription {
        let id = Uuid::new_v4();
        self.inner.observers.insert(id, observer);
        tracing::debug!(%id, "Status observer subscribed");

        Subscription {
            id,
            publisher: Arc::downgrade(&self.inner),
        }
    }

    /// Async view of the retained value, for consumers that prefer to await
    /// changes instead of being called back.
    pub fn watch(&self) -> watch::Receiver<Status> {
        self.inner.current.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps an observer registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: Uuid,
    publisher: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.publisher.upgrade() {
            inner.observers.remove(&self.id);
            tracing::debug!(id = %self.id, "Status observer unsubscribed");
        }
    }
}
