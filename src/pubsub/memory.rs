/// In-process broadcaster over `tokio::sync::broadcast`
use super::{Broadcaster, BusEvent, Topic};
use crate::metrics;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};

type Channels = Arc<RwLock<HashMap<String, broadcast::Sender<BusEvent>>>>;

/// One broadcast channel per topic key, created on first subscription
pub struct InMemoryBroadcaster {
    capacity: usize,
    channels: Channels,
}

impl InMemoryBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Drop a topic's channel once its last subscriber is gone
fn prune(channels: &RwLock<HashMap<String, broadcast::Sender<BusEvent>>>, key: &str) {
    let mut channels = channels.write().unwrap_or_else(|e| e.into_inner());
    if channels
        .get(key)
        .map(|sender| sender.receiver_count() == 0)
        .unwrap_or(false)
    {
        channels.remove(key);
    }
}

/// Receiving end of one subscriber; releases the topic's channel on drop
struct Subscription {
    receiver: Option<broadcast::Receiver<BusEvent>>,
    channels: Channels,
    key: String,
}

impl Subscription {
    async fn next_event(&mut self) -> Option<BusEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.key, skipped, "Subscriber lagged, skipping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked
        self.receiver.take();
        prune(&self.channels, &self.key);
        tracing::trace!(topic = %self.key, "Bus subscriber dropped");
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Broadcaster for InMemoryBroadcaster {
    fn publish(&self, topic: Topic, event: BusEvent) -> usize {
        let key = topic.key();
        metrics::BUS_EVENTS_PUBLISHED
            .with_label_values(&[topic.kind()])
            .inc();

        let sender = {
            let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
            channels.get(&key).cloned()
        };

        let delivered = match sender {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            prune(&self.channels, &key);
        }

        tracing::trace!(topic = %key, delivered, "Published bus event");
        delivered
    }

    fn subscribe(&self, topic: Topic) -> BoxStream<'static, BusEvent> {
        let key = topic.key();
        let receiver = {
            let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
            channels
                .entry(key.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        tracing::debug!(topic = %key, "New bus subscriber");

        let subscription = Subscription {
            receiver: Some(receiver),
            channels: self.channels.clone(),
            key,
        };

        futures::stream::unfold(subscription, |mut subscription| async move {
            let event = subscription.next_event().await?;
            Some((event, subscription))
        })
        .boxed()
    }

    fn subscriber_count(&self, topic: &Topic) -> usize {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        channels
            .get(&topic.key())
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
