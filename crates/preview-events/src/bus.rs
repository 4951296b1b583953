//! Event bus implementation
//!
//! This module provides the event bus abstraction and an in-process
//! implementation for delivering preview notifications to hosts.

use crate::types::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Unknown subscription
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Handler failed
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// Events dropped because the subscriber lagged are skipped.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscription = %self.id, skipped, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventBusError::ChannelClosed),
            }
        }
    }

    /// Receive an already published event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

/// Event handler trait for processing events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `preview.mode.*` matches `preview.mode.degraded`
    /// - `preview.#` matches every preview event
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;

    /// Unsubscribe.
    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()>;

    /// Get event bus stats.
    async fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total deliveries to subscribers and handlers
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
    /// Registered handlers
    pub registered_handlers: usize,
}

/// Check if a dotted topic matches a pattern.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();
    segments_match(&pattern, &topic)
}

fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
    match pattern.split_first() {
        None => topic.is_empty(),
        Some((&"#", rest)) => (0..=topic.len()).any(|skip| segments_match(rest, &topic[skip..])),
        Some((head, rest)) => match topic.split_first() {
            Some((segment, remaining)) => {
                (*head == "*" || head == segment) && segments_match(rest, remaining)
            }
            None => false,
        },
    }
}

struct Subscriber {
    pattern: String,
    sender: broadcast::Sender<Event>,
}

/// In-memory event bus implementation.
///
/// Each subscription gets its own channel, so unsubscribing closes exactly
/// one receiver.
pub struct MemoryEventBus {
    /// Subscribers by subscription ID
    subscribers: Arc<RwLock<HashMap<String, Subscriber>>>,
    /// Registered handlers
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    /// Statistics
    stats: Arc<RwLock<EventBusStats>>,
    /// Per-subscription channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(EventBusStats::default())),
            channel_capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();
        let mut delivered = 0u64;

        {
            let subscribers = self.subscribers.read().await;
            for subscriber in subscribers.values() {
                if topic_matches(&subscriber.pattern, &topic)
                    && subscriber.sender.send(event.clone()).is_ok()
                {
                    delivered += 1;
                }
            }
        }

        {
            let handlers = self.handlers.read().await;
            for handler in handlers.iter() {
                if handler.topics().iter().any(|t| topic_matches(t, &topic)) {
                    let handler = handler.clone();
                    let event = event.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handler.handle(event).await {
                            warn!(error = %e, "Event handler failed");
                        }
                    });
                    delivered += 1;
                }
            }
        }

        debug!(%topic, delivered, "Published event");

        let mut stats = self.stats.write().await;
        stats.events_published += 1;
        stats.events_delivered += delivered;

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        let id = uuid::Uuid::now_v7().to_string();
        let (sender, receiver) = broadcast::channel(self.channel_capacity);

        self.subscribers.write().await.insert(
            id.clone(),
            Subscriber {
                pattern: topic.to_string(),
                sender,
            },
        );
        self.stats.write().await.active_subscriptions += 1;

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        self.handlers.write().await.push(handler);
        self.stats.write().await.registered_handlers += 1;
        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()> {
        if self
            .subscribers
            .write()
            .await
            .remove(subscription_id)
            .is_none()
        {
            return Err(EventBusError::SubscriptionNotFound(
                subscription_id.to_string(),
            ));
        }

        let mut stats = self.stats.write().await;
        stats.active_subscriptions = stats.active_subscriptions.saturating_sub(1);
        Ok(())
    }

    async fn stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreviewEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn degraded() -> Event {
        PreviewEvent::ModeDegraded {
            initial_url: "http://localhost:3000/".to_string(),
            message: PreviewEvent::DEGRADED_MESSAGE.to_string(),
        }
        .to_event()
    }

    #[test]
    fn test_topic_matching() {
        assert!(topic_matches("preview.url.resolved", "preview.url.resolved"));
        assert!(topic_matches("preview.url.*", "preview.url.resolved"));
        assert!(topic_matches("*.mode.degraded", "preview.mode.degraded"));
        assert!(topic_matches("preview.#", "preview.mode.degraded"));
        assert!(topic_matches("#", "preview.url.resolved"));
        assert!(topic_matches("preview.#.failed", "preview.machine.failed"));
        assert!(topic_matches("preview.url.resolved.#", "preview.url.resolved"));

        assert!(!topic_matches("preview.url.*", "preview.mode.degraded"));
        assert!(!topic_matches("preview.*", "preview.url.resolved"));
        assert!(!topic_matches("preview.url", "preview.url.resolved"));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryEventBus::new();
        let mut warnings = bus.subscribe("preview.mode.*").await.unwrap();
        let mut resolved = bus.subscribe("preview.url.resolved").await.unwrap();

        bus.publish(degraded()).await.unwrap();

        let received = warnings.recv().await.unwrap();
        assert_eq!(received.event_type, "mode.degraded");
        assert!(resolved.try_recv().is_none());

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.active_subscriptions, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_receiver() {
        let bus = MemoryEventBus::new();
        let mut sub = bus.subscribe("#").await.unwrap();

        bus.unsubscribe(&sub.id).await.unwrap();
        assert!(matches!(sub.recv().await, Err(EventBusError::ChannelClosed)));
        assert!(matches!(
            bus.unsubscribe(&sub.id).await,
            Err(EventBusError::SubscriptionNotFound(_))
        ));
        assert_eq!(bus.stats().await.active_subscriptions, 0);
    }

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: Event) -> EventBusResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn topics(&self) -> Vec<String> {
            vec!["preview.mode.#".to_string()]
        }
    }

    #[tokio::test]
    async fn test_handlers_receive_matching_events() {
        let bus = MemoryEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.register_handler(Arc::new(CountingHandler {
            count: count.clone(),
        }))
        .await
        .unwrap();

        bus.publish(degraded()).await.unwrap();
        bus.publish(
            PreviewEvent::NavigationRejected {
                origin: "https://example.com".to_string(),
            }
            .to_event(),
        )
        .await
        .unwrap();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().await.registered_handlers, 1);
    }
}
