//! Event subscriptions: "a registry keyed by the event's
//! creator SR (nullable: null subscribes to all events). Publishing
//! iterates the matching subscribers in registration order; delivery to a
//! subscriber is synchronous and at-most-once per event; any exception
//! from a subscriber is logged, not propagated."
//!
//! The wire data model (§3) carries no dedicated "event creator" field —
//! an event is just a [`StorageReference`] in a response's event list.
//! This registry derives the creator from the call that produced the
//! event: the new object for a successful constructor call, the receiver
//! for an instance method call, and `None` (matching only wildcard
//! subscribers) for a static method call or a constructor that ended in a
//! declared exception before a new object could be bound.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use tessera_types::StorageReference;

/// A subscriber callback, notified once per matching event with the
/// event's creator (if known) and the event object itself.
pub trait EventHandler: Send + Sync {
    fn handle(&self, creator: Option<StorageReference>, event: StorageReference);
}

impl<F> EventHandler for F
where
    F: Fn(Option<StorageReference>, StorageReference) + Send + Sync,
{
    fn handle(&self, creator: Option<StorageReference>, event: StorageReference) {
        self(creator, event)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` subscribes to every creator ("null subscribes to
    /// all events").
    creator: Option<StorageReference>,
    handler: Box<dyn EventHandler>,
}

/// The concurrent map of event subscribers ("a concurrent map
/// of SR -> set of handlers").
#[derive(Default)]
pub struct EventRegistry {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, creator: Option<StorageReference>, handler: impl EventHandler + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            creator,
            handler: Box::new(handler),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.lock().retain(|s| s.id != id);
    }

    /// Notifies every subscriber whose filter matches `creator`, in
    /// registration order, for one `event`. A panicking handler is caught
    /// and logged at `warn` rather than propagated or allowed to poison
    /// the transaction that raised the event. Subscribers must not
    /// re-enter `subscribe`/`unsubscribe`/`publish` on this registry from
    /// within a handler — the lock is held for the whole call.
    pub fn publish(&self, creator: Option<StorageReference>, event: StorageReference) {
        let guard = self.subscriptions.lock();
        for subscription in guard.iter() {
            if subscription.creator.is_some() && subscription.creator != creator {
                continue;
            }
            let handler = AssertUnwindSafe(&subscription.handler);
            let result = catch_unwind(|| handler.handle(creator, event));
            if result.is_err() {
                log::warn!("event subscriber panicked handling event {:?}", event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as StdMutex;
    use std::sync::Arc;
    use tessera_crypto::Hash;
    use tessera_types::TransactionReference;

    fn tr(byte: u8) -> TransactionReference {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TransactionReference::new(Hash::new(bytes))
    }

    fn sr(byte: u8, progressive: u64) -> StorageReference {
        StorageReference::new(tr(byte), progressive)
    }

    #[test]
    fn wildcard_subscriber_sees_every_creator() {
        let registry = EventRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.subscribe(None, move |_creator, event| seen_clone.lock().push(event));

        registry.publish(Some(sr(1, 0)), sr(9, 0));
        registry.publish(Some(sr(2, 0)), sr(9, 1));

        assert_eq!(*seen.lock(), vec![sr(9, 0), sr(9, 1)]);
    }

    #[test]
    fn scoped_subscriber_only_sees_its_creator() {
        let registry = EventRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.subscribe(Some(sr(1, 0)), move |_creator, event| seen_clone.lock().push(event));

        registry.publish(Some(sr(1, 0)), sr(9, 0));
        registry.publish(Some(sr(2, 0)), sr(9, 1));

        assert_eq!(*seen.lock(), vec![sr(9, 0)]);
    }

    #[test]
    fn events_are_delivered_in_registration_and_emission_order() {
        let registry = EventRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        registry.subscribe(None, move |_c, e| a.lock().push(('a', e)));
        registry.subscribe(None, move |_c, e| b.lock().push(('b', e)));

        registry.publish(Some(sr(1, 0)), sr(9, 0));
        registry.publish(Some(sr(1, 0)), sr(9, 1));

        assert_eq!(
            *seen.lock(),
            vec![('a', sr(9, 0)), ('b', sr(9, 0)), ('a', sr(9, 1)), ('b', sr(9, 1))]
        );
    }

    #[test]
    fn a_panicking_subscriber_does_not_stop_the_rest() {
        let registry = EventRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.subscribe(None, |_c, _e| panic!("boom"));
        registry.subscribe(None, move |_c, e| seen_clone.lock().push(e));

        registry.publish(Some(sr(1, 0)), sr(9, 0));
        assert_eq!(*seen.lock(), vec![sr(9, 0)]);
    }
}
