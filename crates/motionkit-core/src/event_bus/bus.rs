//! Event Bus implementation.
//!
//! Provides the generic topic-keyed `EventBus`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Subscription handle for unsubscribing from a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// An event together with the topic it was published on
#[derive(Debug, Clone)]
pub struct Envelope<E> {
    /// Topic key
    pub topic: String,
    /// Event payload
    pub event: E,
}

/// Type alias for event handler functions
type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the async broadcast receiver.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Thread-safe, topic-keyed publish/subscribe bus
///
/// Listener lists are guarded by a lock, but listeners are invoked on a
/// snapshot taken outside of it, so a listener may subscribe or
/// unsubscribe without deadlocking. A slow listener stalls the publisher.
pub struct EventBus<E> {
    /// Registered handlers per topic, in subscription order
    subscribers: Mutex<HashMap<String, Vec<(SubscriptionId, EventHandler<E>)>>>,
    /// Broadcast sender for async receivers
    sender: broadcast::Sender<Envelope<E>>,
    /// Configuration
    config: EventBusConfig,
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            subscribers: Mutex::new(HashMap::new()),
            sender,
            config,
        }
    }

    /// Append a listener to `topic`
    ///
    /// The handler is called on the publishing thread, so it should return
    /// quickly or hand the event off to its own loop.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let topic = topic.into();
        tracing::debug!("Subscription {} added to '{}'", id, topic);
        self.subscribers
            .lock()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a listener from `topic`
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(listeners) = subscribers.get_mut(topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            subscribers.remove(topic);
        }
        if removed {
            tracing::debug!("Subscription {} removed from '{}'", id, topic);
        }
        removed
    }

    /// Publish `event` to every listener of `topic`
    ///
    /// A listener that panics is logged and skipped; the remaining
    /// listeners still run and the panic does not reach the publisher.
    /// Returns the number of synchronous listeners invoked.
    pub fn publish(&self, topic: &str, event: E) -> usize {
        let snapshot: Vec<EventHandler<E>> = self
            .subscribers
            .lock()
            .get(topic)
            .map(|listeners| listeners.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!("Listener on '{}' panicked", topic);
            }
        }

        // No async receivers is not an error
        let _ = self.sender.send(Envelope {
            topic: topic.to_string(),
            event,
        });

        snapshot.len()
    }

    /// Get a receiver for manual event polling from async code
    ///
    /// The receiver sees events of every topic.
    pub fn receiver(&self) -> broadcast::Receiver<Envelope<E>> {
        self.sender.subscribe()
    }

    /// Number of listeners on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.lock().get(topic).map_or(0, Vec::len)
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl<E> Default for EventBus<E>
where
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<String> = self.subscribers.lock().keys().cloned().collect();
        f.debug_struct("EventBus")
            .field("topics", &topics)
            .field("config", &self.config)
            .finish()
    }
}
