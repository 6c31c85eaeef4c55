//! # Event Broadcaster
//!
//! Post-commit fan-out of order and reservation notifications to real-time
//! listeners, scoped by restaurant.
//!
//! ```text
//! publish() ──try_send──▶ outbound queue ──▶ dispatcher task
//!                                                │ try_send per subscriber
//!                                                ▼
//!                               restaurant_id → [Subscription, ...]
//! ```
//!
//! `publish` never awaits and never fails the caller. A full outbound queue
//! or a full subscriber buffer drops the event and bumps the `dropped`
//! counter; a closed subscriber is pruned on the next delivery attempt.
//! A single dispatcher keeps delivery FIFO per subscription.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{BroadcastEvent, EventType};
use crate::config::BroadcasterConfig;

type SubscriberMap = DashMap<Uuid, Vec<mpsc::Sender<BroadcastEvent>>>;

/// Cheaply cloneable handle to the broadcaster
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    outbound: mpsc::Sender<BroadcastEvent>,
    subscribers: Arc<SubscriberMap>,
    counters: Arc<Counters>,
    subscriber_buffer: usize,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of broadcaster counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcasterStats {
    /// Events accepted into the outbound queue
    pub published: u64,
    /// Per-subscriber deliveries
    pub delivered: u64,
    /// Events rejected by a full queue or a full subscriber buffer
    pub dropped: u64,
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Outbound event queue is full")]
    QueueFull,
    #[error("Event channel is closed")]
    ChannelClosed,
}

/// One listener connection; events arrive in publish order
#[derive(Debug)]
pub struct Subscription {
    restaurant_id: Uuid,
    receiver: mpsc::Receiver<BroadcastEvent>,
}

impl Subscription {
    pub fn restaurant_id(&self) -> Uuid {
        self.restaurant_id
    }

    /// Next event, or `None` once the broadcaster is gone
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
        self.receiver.try_recv().ok()
    }
}

impl EventBroadcaster {
    /// Create the broadcaster and spawn its dispatcher task.
    ///
    /// The dispatcher exits once every handle has been dropped.
    pub fn start(config: &BroadcasterConfig) -> (Self, JoinHandle<()>) {
        let (outbound, inbound) = mpsc::channel(config.queue_capacity.max(1));
        let subscribers: Arc<SubscriberMap> = Arc::new(DashMap::new());
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn(dispatch(
            inbound,
            Arc::clone(&subscribers),
            Arc::clone(&counters),
        ));

        let broadcaster = Self {
            outbound,
            subscribers,
            counters,
            subscriber_buffer: config.subscriber_buffer.max(1),
        };
        (broadcaster, handle)
    }

    /// Best-effort publish; failures are logged and counted, never returned
    pub fn publish(&self, restaurant_id: Uuid, event_type: EventType, payload: Value) {
        if let Err(error) = self.try_publish(BroadcastEvent::new(restaurant_id, event_type, payload))
        {
            warn!(
                restaurant_id = %restaurant_id,
                event_type = %event_type,
                error = %error,
                "Dropping broadcast event"
            );
        }
    }

    /// Enqueue an event without waiting for queue capacity
    pub fn try_publish(&self, event: BroadcastEvent) -> Result<(), PublishError> {
        match self.outbound.try_send(event) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PublishError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(PublishError::ChannelClosed),
        }
    }

    /// Register a listener for one restaurant
    pub fn subscribe(&self, restaurant_id: Uuid) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        self.subscribers
            .entry(restaurant_id)
            .or_default()
            .push(sender);

        debug!(restaurant_id = %restaurant_id, "Listener subscribed");

        Subscription {
            restaurant_id,
            receiver,
        }
    }

    /// Live listeners for a restaurant
    pub fn subscriber_count(&self, restaurant_id: Uuid) -> usize {
        self.subscribers
            .get(&restaurant_id)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> BroadcasterStats {
        BroadcasterStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn dispatch(
    mut inbound: mpsc::Receiver<BroadcastEvent>,
    subscribers: Arc<SubscriberMap>,
    counters: Arc<Counters>,
) {
    while let Some(event) = inbound.recv().await {
        fan_out(&event, &subscribers, &counters);
    }
    debug!("Event dispatcher stopped");
}

fn fan_out(event: &BroadcastEvent, subscribers: &SubscriberMap, counters: &Counters) {
    let restaurant_id = event.restaurant_id;

    if let Some(mut senders) = subscribers.get_mut(&restaurant_id) {
        senders.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    restaurant_id = %restaurant_id,
                    event_type = %event.event_type,
                    "Listener buffer full, event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    // Guard from get_mut must be released before remove_if
    subscribers.remove_if(&restaurant_id, |_, senders| senders.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn config(queue_capacity: usize, subscriber_buffer: usize) -> BroadcasterConfig {
        BroadcasterConfig {
            queue_capacity,
            subscriber_buffer,
        }
    }

    async fn next(subscription: &mut Subscription) -> BroadcastEvent {
        tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("event within timeout")
            .expect("broadcaster alive")
    }

    async fn wait_for(broadcaster: &EventBroadcaster, predicate: impl Fn(BroadcasterStats) -> bool) {
        for _ in 0..100 {
            if predicate(broadcaster.stats()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stats never matched: {:?}", broadcaster.stats());
    }

    #[tokio::test]
    async fn test_fifo_per_subscription() {
        let (broadcaster, _handle) = EventBroadcaster::start(&config(64, 16));
        let restaurant_id = Uuid::new_v4();
        let mut subscription = broadcaster.subscribe(restaurant_id);

        for seq in 0..5 {
            broadcaster.publish(restaurant_id, EventType::OrderStateChanged, json!({ "seq": seq }));
        }

        for seq in 0..5 {
            assert_eq!(next(&mut subscription).await.payload["seq"], seq);
        }
    }

    #[tokio::test]
    async fn test_events_are_scoped_by_restaurant() {
        let (broadcaster, _handle) = EventBroadcaster::start(&config(64, 16));
        let restaurant_a = Uuid::new_v4();
        let restaurant_b = Uuid::new_v4();
        let mut listener_a = broadcaster.subscribe(restaurant_a);
        let mut listener_b = broadcaster.subscribe(restaurant_b);

        broadcaster.publish(restaurant_a, EventType::OrderCreated, json!({ "for": "a" }));
        broadcaster.publish(restaurant_b, EventType::ReservationCreated, json!({ "for": "b" }));

        let event_a = next(&mut listener_a).await;
        let event_b = next(&mut listener_b).await;
        assert_eq!(event_a.payload["for"], "a");
        assert_eq!(event_b.payload["for"], "b");
        assert!(listener_a.try_recv().is_none());
        assert!(listener_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_slow_listener_drops_without_blocking_others() {
        let (broadcaster, _handle) = EventBroadcaster::start(&config(64, 2));
        let restaurant_id = Uuid::new_v4();
        let mut slow = broadcaster.subscribe(restaurant_id);
        let mut fast = broadcaster.subscribe(restaurant_id);

        for seq in 0..2 {
            broadcaster.publish(restaurant_id, EventType::OrderStateChanged, json!({ "seq": seq }));
            assert_eq!(next(&mut fast).await.payload["seq"], seq);
        }
        for seq in 2..5 {
            broadcaster.publish(restaurant_id, EventType::OrderStateChanged, json!({ "seq": seq }));
            assert_eq!(next(&mut fast).await.payload["seq"], seq);
        }

        wait_for(&broadcaster, |stats| stats.dropped == 3).await;
        assert_eq!(next(&mut slow).await.payload["seq"], 0);
        assert_eq!(next(&mut slow).await.payload["seq"], 1);
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_closed_listeners_are_pruned() {
        let (broadcaster, _handle) = EventBroadcaster::start(&config(64, 4));
        let restaurant_id = Uuid::new_v4();
        let subscription = broadcaster.subscribe(restaurant_id);
        assert_eq!(broadcaster.subscriber_count(restaurant_id), 1);

        drop(subscription);
        assert_eq!(broadcaster.subscriber_count(restaurant_id), 0);

        broadcaster.publish(restaurant_id, EventType::OrderCreated, json!({}));
        wait_for(&broadcaster, |stats| stats.published == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(broadcaster.subscribers.get(&restaurant_id).is_none());
        assert_eq!(broadcaster.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_silent() {
        let (broadcaster, _handle) = EventBroadcaster::start(&config(4, 4));
        broadcaster.publish(Uuid::new_v4(), EventType::ReservationCancelled, json!({}));
        wait_for(&broadcaster, |stats| stats.published == 1).await;
        assert_eq!(broadcaster.stats().dropped, 0);
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_handles_dropped() {
        let (broadcaster, handle) = EventBroadcaster::start(&config(4, 4));
        drop(broadcaster);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher exits")
            .expect("dispatcher did not panic");
    }
}
