//! The engine's outward-facing surface.
//!
//! [`Feed`] is what an HTTP layer, page renderer, or live transport holds.
//! Queries read straight from the store; subscriptions go through the
//! registry with the configured backlog window. None of these calls fail.

use std::sync::Arc;

use jackpot_types::{GenerationRecord, SubscriberId};

use crate::registry::{CallbackSubscriber, Subscriber, SubscriberRegistry};
use crate::store::GenerationStore;

/// Cloneable handle for querying and subscribing to the engine.
#[derive(Debug, Clone)]
pub struct Feed {
    store: GenerationStore,
    registry: Arc<SubscriberRegistry>,
    backlog_size: usize,
}

impl Feed {
    /// Build a feed over `store` and `registry`.
    pub const fn new(
        store: GenerationStore,
        registry: Arc<SubscriberRegistry>,
        backlog_size: usize,
    ) -> Self {
        Self {
            store,
            registry,
            backlog_size,
        }
    }

    /// The latest record, or the sentinel before the first tick.
    pub fn current(&self) -> GenerationRecord {
        self.store.current()
    }

    /// History, oldest first. `Some(n)` limits it to the `n` most recent.
    pub fn history(&self, limit: Option<usize>) -> Vec<GenerationRecord> {
        self.store.history(limit)
    }

    /// Whether the target value has been produced.
    pub fn is_completed(&self) -> bool {
        self.store.is_completed()
    }

    /// Total number of records generated so far.
    pub fn generation_count(&self) -> usize {
        self.store.len()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Register a live listener.
    ///
    /// It immediately receives the most recent backlog window, then one
    /// `new-generation` event per tick until unsubscribed.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let backlog = self.store.history(Some(self.backlog_size));
        self.registry.register(subscriber, &backlog)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.deregister(id)
    }

    /// Invoke `callback` with every new record, once per tick.
    ///
    /// The returned id can be passed to [`unsubscribe`](Self::unsubscribe).
    pub fn on_broadcast<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&GenerationRecord) + Send + Sync + 'static,
    {
        self.registry
            .register(Arc::new(CallbackSubscriber::new(callback)), &[])
    }
}
