//! Subscriber registry and fan-out.
//!
//! # Responsibilities
//! - Register a private bounded channel per connected browser tab
//! - Broadcast events to every registered subscriber
//! - Deregister a subscriber when its stream is dropped
//!
//! The registry lock is held only to insert, remove, or snapshot senders.
//! Delivery happens on spawned tasks, one per subscriber, so a stalled tab
//! cannot hold up the others or the broadcasting request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::reload::event::Event;

/// Identifier of a registered subscriber. Never reused.
pub type SubscriberId = u64;

/// How long a delivery task waits on a full subscriber queue.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Registry {
    closed: bool,
    next_id: SubscriberId,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Event>>,
}

/// In-memory pub/sub hub behind the SSE endpoint.
#[derive(Debug)]
pub struct ReloadHub {
    registry: Mutex<Registry>,
    queue_capacity: usize,
}

impl ReloadHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let (id, count) = {
            let mut registry = self.registry();
            registry.next_id += 1;
            let id = registry.next_id;
            // After close() the sender is dropped right away, so the new
            // stream ends immediately.
            if !registry.closed {
                registry.subscribers.insert(id, tx);
            }
            (id, registry.subscribers.len())
        };

        metrics::set_subscribers(count);
        tracing::debug!(subscriber = id, subscribers = count, "Subscriber registered");

        Subscription {
            id,
            receiver: rx,
            hub: Arc::clone(self),
        }
    }

    /// Dispatch `event` to every current subscriber and return how many
    /// deliveries were started. Must be called from within a Tokio runtime.
    pub fn broadcast(&self, event: Event) -> usize {
        let senders: Vec<(SubscriberId, mpsc::Sender<Event>)> = self
            .registry()
            .subscribers
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        for (id, tx) in &senders {
            let id = *id;
            let tx = tx.clone();
            let event = event.clone();
            tokio::spawn(async move {
                match tx.send_timeout(event, DELIVERY_TIMEOUT).await {
                    Ok(()) => {}
                    Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                        tracing::warn!(subscriber = id, "Subscriber queue full, dropping event");
                    }
                    Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                        tracing::debug!(subscriber = id, "Subscriber went away before delivery");
                    }
                }
            });
        }

        metrics::record_broadcast();
        tracing::info!(
            event_type = %event.event_type,
            data = %event.data,
            subscribers = senders.len(),
            "Broadcasting event"
        );
        senders.len()
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    /// Drop every subscriber channel so open event streams finish, and refuse
    /// new registrations. Used on shutdown.
    pub fn close(&self) {
        let closed = {
            let mut registry = self.registry();
            registry.closed = true;
            std::mem::take(&mut registry.subscribers).len()
        };
        metrics::set_subscribers(0);
        tracing::info!(subscribers = closed, "Reload hub closed");
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let count = {
            let mut registry = self.registry();
            registry.subscribers.remove(&id);
            registry.subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(subscriber = id, subscribers = count, "Subscriber removed");
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(16)
    }
}

/// A registered subscriber's end of its event channel.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Event>,
    hub: Arc<ReloadHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event for this subscriber.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Stream of events; dropping the stream deregisters the subscriber.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        stream::unfold(self, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        self.hub.unsubscribe(self.id);
    }
}
