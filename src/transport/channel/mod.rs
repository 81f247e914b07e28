//! In-memory channel-based pub/sub backend for standalone mode.
//!
//! Uses tokio broadcast channels for pub/sub within a single process.
//! Ideal for local development and testing without external dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::{PubSubConnection, RawSubscription, Result, TransportError};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

type Topics = Arc<RwLock<HashMap<String, broadcast::Sender<Arc<[u8]>>>>>;

/// In-process pub/sub connection.
///
/// Clones share the same topics, so a clone handed to a subscriber sees
/// everything published through the original.
#[derive(Clone, Default)]
pub struct ChannelConnection {
    topics: Topics,
}

impl ChannelConnection {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Arc<[u8]>> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl PubSubConnection for ChannelConnection {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // Send to channel (ignore error if no receivers)
        match self.sender(topic).await.send(Arc::from(payload)) {
            Ok(receivers) => debug!(topic, receivers, "Published to channel"),
            Err(_) => debug!(topic, "Published to channel (no receivers)"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn RawSubscription>> {
        Ok(Box::new(ChannelSubscription {
            topic: topic.to_string(),
            topics: self.topics.clone(),
            state: State::Pending,
        }))
    }
}

enum State {
    Pending,
    Active(broadcast::Receiver<Arc<[u8]>>),
    Closed,
}

/// Subscription on a [`ChannelConnection`] topic.
///
/// The broadcast receiver is attached on `confirm`; anything published
/// before that is not observed.
pub struct ChannelSubscription {
    topic: String,
    topics: Topics,
    state: State,
}

#[async_trait]
impl RawSubscription for ChannelSubscription {
    async fn confirm(&mut self) -> Result<()> {
        match self.state {
            State::Pending => {
                let receiver = self
                    .topics
                    .write()
                    .await
                    .entry(self.topic.clone())
                    .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                    .subscribe();
                self.state = State::Active(receiver);
                info!(topic = %self.topic, "Channel subscription active");
                Ok(())
            }
            State::Active(_) => Ok(()),
            State::Closed => Err(TransportError::Closed),
        }
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        let State::Active(receiver) = &mut self.state else {
            return None;
        };
        loop {
            match receiver.recv().await {
                Ok(payload) => return Some(payload.to_vec()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Channel subscriber lagged, skipped messages");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = State::Closed;
        debug!(topic = %self.topic, "Channel subscription closed");
        Ok(())
    }
}
