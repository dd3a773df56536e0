//! Subscriber registry and best-effort fan-out.
//!
//! Subscribers are keyed by a [`SubscriberId`] allocated from a counter,
//! so iteration order is registration order and deregistration is a
//! direct lookup that cannot disturb any other subscriber.
//!
//! # Delivery
//!
//! [`Subscriber::deliver`] must not block: the tick task calls it inline.
//! A failed delivery is logged, never propagated, and the failing
//! subscriber is dropped from the registry. The next broadcast simply
//! skips it.
//!
//! # Ordering
//!
//! [`register`](SubscriberRegistry::register) delivers the backlog while
//! holding the write lock and only then inserts the subscriber. A
//! concurrent broadcast either runs before the insert (and the new
//! subscriber misses it) or after it, in which case the backlog has
//! already been delivered. A subscriber therefore never sees a live
//! record ahead of its backlog.
//!
//! Because the backlog is delivered under the write lock, `deliver` must
//! not call back into the registry (or a [`Feed`](crate::Feed) wrapping
//! it) while handling a `generations` event. Live events are delivered
//! with no lock held, so re-entry is allowed there.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jackpot_types::{GenerationRecord, SubscriberEvent, SubscriberId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why a delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The listener's connection is gone.
    #[error("subscriber connection closed")]
    Closed,

    /// The listener refused the event.
    #[error("subscriber rejected event: {message}")]
    Rejected {
        /// Description of the failure.
        message: String,
    },
}

/// A connected listener.
pub trait Subscriber: Send + Sync {
    /// Hand `event` to the listener without blocking.
    ///
    /// Must not re-enter the owning registry while handling a backlog
    /// event; the registration lock is held for that call.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the listener can no longer receive.
    fn deliver(&self, event: &SubscriberEvent) -> Result<(), DeliveryError>;
}

/// Subscriber backed by an unbounded tokio channel.
///
/// The transport owns the receiving half and forwards events in its own
/// task. Dropping the receiver makes the next delivery fail with
/// [`DeliveryError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<SubscriberEvent>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SubscriberEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, event: &SubscriberEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(event.clone())
            .map_err(|_closed| DeliveryError::Closed)
    }
}

/// Subscriber that invokes a function with each new record.
///
/// Backlog events are ignored; the function runs once per tick.
pub struct CallbackSubscriber<F> {
    callback: F,
}

impl<F> CallbackSubscriber<F>
where
    F: Fn(&GenerationRecord) + Send + Sync,
{
    /// Wrap `callback`.
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Subscriber for CallbackSubscriber<F>
where
    F: Fn(&GenerationRecord) + Send + Sync,
{
    fn deliver(&self, event: &SubscriberEvent) -> Result<(), DeliveryError> {
        if let SubscriberEvent::NewGeneration { generation } = event {
            (self.callback)(generation);
        }
        Ok(())
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers whose delivery failed and were deregistered.
    pub failed: usize,
}

/// The set of currently connected subscribers.
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<BTreeMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl core::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SubscriberId, Arc<dyn Subscriber>>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SubscriberId, Arc<dyn Subscriber>>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `subscriber`, first delivering `backlog` to it.
    ///
    /// The subscriber is registered even if the backlog delivery fails;
    /// the next broadcast will find out and remove it. The backlog is
    /// delivered under the write lock, so `subscriber` must not call back
    /// into this registry from that delivery.
    pub fn register(
        &self,
        subscriber: Arc<dyn Subscriber>,
        backlog: &[GenerationRecord],
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.write();

        if let Err(e) = subscriber.deliver(&SubscriberEvent::backlog(backlog)) {
            debug!(subscriber = %id, error = %e, "Backlog delivery failed");
        }
        subscribers.insert(id, subscriber);

        debug!(
            subscriber = %id,
            backlog = backlog.len(),
            subscribers = subscribers.len(),
            "Subscriber registered"
        );
        id
    }

    /// Remove the subscriber registered as `id`.
    ///
    /// Returns `false` if it was not registered (already removed).
    pub fn deregister(&self, id: SubscriberId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Subscriber deregistered");
        }
        removed
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.read().contains_key(&id)
    }

    /// Deliver a `new-generation` event for `record` to every subscriber,
    /// in registration order.
    ///
    /// Each delivery is independent; failures are logged and the failing
    /// subscribers are deregistered.
    pub fn broadcast(&self, record: GenerationRecord) -> BroadcastReport {
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let event = SubscriberEvent::new_generation(record);
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        for (id, subscriber) in targets {
            match subscriber.deliver(&event) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "Delivery failed, dropping subscriber");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.write();
            for id in &failed {
                subscribers.remove(id);
            }
        }
        report.failed = failed.len();
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every event it receives.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<SubscriberEvent>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<SubscriberEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Subscriber for Recorder {
        fn deliver(&self, event: &SubscriberEvent) -> Result<(), DeliveryError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Always fails.
    struct Broken;

    impl Subscriber for Broken {
        fn deliver(&self, _event: &SubscriberEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected {
                message: "socket reset".to_owned(),
            })
        }
    }

    fn rec(ts: u64, value: u32) -> GenerationRecord {
        GenerationRecord::new(ts, value)
    }

    #[test]
    fn backlog_then_broadcasts_in_order() {
        let registry = SubscriberRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let backlog = [rec(1, 10), rec(2, 20)];

        registry.register(recorder.clone(), &backlog);
        registry.broadcast(rec(3, 30));
        registry.broadcast(rec(4, 40));

        assert_eq!(
            recorder.events(),
            vec![
                SubscriberEvent::backlog(&backlog),
                SubscriberEvent::new_generation(rec(3, 30)),
                SubscriberEvent::new_generation(rec(4, 40)),
            ]
        );
    }

    #[test]
    fn deregistered_subscriber_stops_receiving() {
        let registry = SubscriberRegistry::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let id_a = registry.register(a.clone(), &[]);
        registry.register(b.clone(), &[]);

        registry.broadcast(rec(1, 1));
        assert!(registry.deregister(id_a));
        registry.broadcast(rec(2, 2));

        assert_eq!(a.events().len(), 2);
        assert_eq!(b.events().len(), 3);
        assert!(!registry.contains(id_a));
    }

    #[test]
    fn removal_is_by_identity_not_position() {
        let registry = SubscriberRegistry::new();
        let subs: Vec<Arc<Recorder>> = (0..4).map(|_| Arc::new(Recorder::default())).collect();
        let ids: Vec<SubscriberId> = subs
            .iter()
            .map(|s| registry.register(s.clone(), &[]))
            .collect();

        // Remove an early one first, then a later one: the later removal
        // must still hit the intended subscriber.
        assert!(registry.deregister(ids[0]));
        assert!(registry.deregister(ids[2]));
        registry.broadcast(rec(1, 1));

        assert_eq!(subs[0].events().len(), 1);
        assert_eq!(subs[1].events().len(), 2);
        assert_eq!(subs[2].events().len(), 1);
        assert_eq!(subs[3].events().len(), 2);
    }

    #[test]
    fn deregister_twice_is_harmless() {
        let registry = SubscriberRegistry::new();
        let id = registry.register(Arc::new(Recorder::default()), &[]);
        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let registry = SubscriberRegistry::new();
        let before = Arc::new(Recorder::default());
        let after = Arc::new(Recorder::default());
        registry.register(before.clone(), &[]);
        let broken = registry.register(Arc::new(Broken), &[]);
        registry.register(after.clone(), &[]);

        let report = registry.broadcast(rec(1, 1));

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(before.events().len(), 2);
        assert_eq!(after.events().len(), 2);
        assert!(!registry.contains(broken));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let registry = SubscriberRegistry::new();
        let first = registry.register(Arc::new(Recorder::default()), &[]);
        registry.deregister(first);
        let second = registry.register(Arc::new(Recorder::default()), &[]);
        assert!(second > first);
    }

    /// Deregisters itself from inside its first live delivery.
    struct OneShot {
        registry: std::sync::Weak<SubscriberRegistry>,
        id: Mutex<Option<SubscriberId>>,
        seen: Mutex<usize>,
    }

    impl Subscriber for OneShot {
        fn deliver(&self, event: &SubscriberEvent) -> Result<(), DeliveryError> {
            if let SubscriberEvent::NewGeneration { .. } = event {
                *self.seen.lock().unwrap() += 1;
                let id = *self.id.lock().unwrap();
                if let (Some(registry), Some(id)) = (self.registry.upgrade(), id) {
                    registry.deregister(id);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn live_delivery_may_reenter_the_registry() {
        let registry = Arc::new(SubscriberRegistry::new());
        let one_shot = Arc::new(OneShot {
            registry: Arc::downgrade(&registry),
            id: Mutex::new(None),
            seen: Mutex::new(0),
        });
        let id = registry.register(one_shot.clone(), &[rec(1, 1)]);
        *one_shot.id.lock().unwrap() = Some(id);

        let report = registry.broadcast(rec(2, 2));
        registry.broadcast(rec(3, 3));

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert_eq!(*one_shot.seen.lock().unwrap(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_with_no_subscribers_is_fine() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.broadcast(rec(1, 1)), BroadcastReport::default());
    }

    #[tokio::test]
    async fn channel_subscriber_forwards_and_detects_close() {
        let registry = SubscriberRegistry::new();
        let (sub, mut rx) = ChannelSubscriber::new();
        let id = registry.register(Arc::new(sub), &[rec(1, 1)]);

        registry.broadcast(rec(2, 2));
        assert_eq!(rx.recv().await.unwrap().kind(), "generations");
        assert_eq!(
            rx.recv().await.unwrap(),
            SubscriberEvent::new_generation(rec(2, 2))
        );

        drop(rx);
        let report = registry.broadcast(rec(3, 3));
        assert_eq!(report.failed, 1);
        assert!(!registry.contains(id));
    }

    #[test]
    fn callback_subscriber_sees_only_new_records() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = CallbackSubscriber::new(move |record: &GenerationRecord| {
            sink.lock().unwrap().push(record.value);
        });

        let registry = SubscriberRegistry::new();
        registry.register(Arc::new(callback), &[rec(1, 99)]);
        registry.broadcast(rec(2, 5));
        registry.broadcast(rec(3, 6));

        assert_eq!(*seen.lock().unwrap(), vec![5, 6]);
    }
}
