//! Change-event fan-out to the presentation layer.
//!
//! Every successful mutation emits one named event so dependent views
//! (calendar, stats) can recompute. Consumers hold immutable snapshots and
//! recompute on every event — no incremental patching.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named change events exposed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    AppointmentCreated(Uuid),
    AppointmentUpdated(Uuid),
    AppointmentCancelled(Uuid),
    CatalogRefreshed,
}

type Subscriber = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Plain observer list. Emission is synchronous and in subscription order;
/// subscribers must not block. The list lock is released before callbacks
/// run, so a subscriber may subscribe or emit again without deadlocking.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // The subscriber list stays usable even after a callback panicked while
    // the lock was held elsewhere.
    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback for all future events.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.lock_subscribers().push(Arc::new(callback));
    }

    /// Deliver an event to every subscriber registered at emit time.
    pub fn emit(&self, event: &ChangeEvent) {
        tracing::debug!(?event, "change event");
        let subscribers: Vec<Subscriber> = self.lock_subscribers().clone();
        for subscriber in &subscribers {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emit_reaches_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&ChangeEvent::CatalogRefreshed);
        bus.emit(&ChangeEvent::AppointmentCreated(Uuid::new_v4()));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn all_subscribers_receive_each_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let seen = seen.clone();
            bus.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(bus.subscriber_count(), 3);

        bus.emit(&ChangeEvent::CatalogRefreshed);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(&ChangeEvent::AppointmentCancelled(Uuid::new_v4()));
    }

    #[test]
    fn subscriber_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        bus.subscribe(move |_| {
            // Re-entering the bus from inside a callback must not deadlock.
            bus2.subscribe(|_| {});
        });

        bus.emit(&ChangeEvent::CatalogRefreshed);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn subscriber_added_mid_emit_is_not_called_for_that_event() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let bus2 = bus.clone();
        let late_calls2 = late_calls.clone();
        bus.subscribe(move |_| {
            let late_calls3 = late_calls2.clone();
            bus2.subscribe(move |_| {
                late_calls3.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.emit(&ChangeEvent::CatalogRefreshed);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        bus.emit(&ChangeEvent::CatalogRefreshed);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_sees_event_payload() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();
        let matched = Arc::new(AtomicUsize::new(0));
        let matched2 = matched.clone();
        bus.subscribe(move |e| {
            if *e == ChangeEvent::AppointmentUpdated(id) {
                matched2.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.emit(&ChangeEvent::AppointmentUpdated(id));
        assert_eq!(matched.load(Ordering::SeqCst), 1);
    }
}
