use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::trace;

use super::traits::{Topic, Transport};
use super::TransportError;
use crate::constants::IN_MEMORY_TOPIC_BUFFER;

/// Stand-in bus for running without a broker.
///
/// Topics map to broadcast channels. Sending to a topic that was never
/// registered fails with [`TransportError::TopicNotFound`]; sending to a
/// registered topic nobody listens to succeeds and the message is dropped.
#[derive(Debug)]
pub struct InMemoryBus {
    channels: RwLock<HashMap<Topic, broadcast::Sender<Bytes>>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Create a bus with the prompt topic already registered
    pub fn new() -> Self {
        Self::with_topics([Topic::prompt()])
    }

    pub fn with_topics(topics: impl IntoIterator<Item = Topic>) -> Self {
        let channels = topics
            .into_iter()
            .map(|topic| (topic, broadcast::channel(IN_MEMORY_TOPIC_BUFFER).0))
            .collect();
        Self {
            channels: RwLock::new(channels),
        }
    }

    /// Listen on a topic, registering it if needed
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<Bytes> {
        if let Some(sender) = self.channels.read().get(topic) {
            return sender.subscribe();
        }

        self.channels
            .write()
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(IN_MEMORY_TOPIC_BUFFER).0)
            .subscribe()
    }

    pub fn has_topic(&self, topic: &Topic) -> bool {
        self.channels.read().contains_key(topic)
    }
}

#[async_trait]
impl Transport for InMemoryBus {
    async fn send(&self, topic: &Topic, payload: Bytes) -> Result<(), TransportError> {
        let channels = self.channels.read();
        let sender = channels
            .get(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.clone()))?;

        // No subscribers is not an error for a fire-and-forget bus
        let delivered = sender.send(payload).unwrap_or(0);
        trace!(topic = %topic, subscribers = delivered, "published in memory");
        Ok(())
    }
}
