//! Log stream listener.
//!
//! Registers a [`ChannelSubscriber`] on the feed and turns every event it
//! receives into a structured log line, so the daemon's output doubles as
//! a live view of the generation stream.

use std::sync::Arc;

use jackpot_core::Feed;
use jackpot_core::registry::ChannelSubscriber;
use jackpot_types::{SubscriberEvent, SubscriberId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Subscribe to `feed` and spawn a task that logs each event.
///
/// The task ends when the subscriber is removed from the feed.
pub fn spawn_log_listener(feed: &Feed) -> (SubscriberId, JoinHandle<()>) {
    let (subscriber, rx) = ChannelSubscriber::new();
    let id = feed.subscribe(Arc::new(subscriber));
    let task = tokio::spawn(forward_to_log(rx, feed.clone()));
    (id, task)
}

async fn forward_to_log(mut rx: mpsc::UnboundedReceiver<SubscriberEvent>, feed: Feed) {
    while let Some(event) = rx.recv().await {
        match event {
            SubscriberEvent::Generations { generations } => {
                info!(
                    backlog = generations.len(),
                    total = feed.generation_count(),
                    completed = feed.is_completed(),
                    "Subscribed to generation stream"
                );
            }
            SubscriberEvent::NewGeneration { generation } => {
                info!(
                    value = generation.value,
                    timestamp = generation.timestamp,
                    total = feed.generation_count(),
                    completed = feed.is_completed(),
                    "Generation"
                );
            }
        }
    }
    debug!("Log listener closed");
}
