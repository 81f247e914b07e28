//! Redis pub/sub backend.
//!
//! Publishing goes through a lazily created [`ConnectionManager`] shared by
//! all publishers. Every subscription opens its own dedicated pub/sub
//! connection, since a Redis connection in subscribe mode cannot issue
//! regular commands.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::{ConnectionLike, ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, Msg};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::transport::{PubSubConnection, RawSubscription, Result, TransportError};

/// Redis pub/sub connection.
pub struct RedisConnection {
    client: Client,
    publisher: OnceCell<ConnectionManager>,
}

impl RedisConnection {
    /// Create a connection handle for `url` (e.g., redis://localhost:6379).
    ///
    /// Only the URL is validated here; the server is contacted on first use.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            publisher: OnceCell::new(),
        })
    }

    async fn publisher(&self) -> Result<ConnectionManager> {
        let conn = self
            .publisher
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to Redis for publishing");
                Ok::<_, TransportError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl PubSubConnection for RedisConnection {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.req_packed_command(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.publisher().await?;
        let receivers: i64 = conn.publish(topic, payload).await?;
        debug!(topic, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn RawSubscription>> {
        let pubsub = self.client.get_async_pubsub().await?;
        Ok(Box::new(RedisSubscription {
            topic: topic.to_string(),
            state: State::Pending(pubsub),
        }))
    }
}

type MessageStream = Pin<Box<dyn Stream<Item = Msg> + Send>>;

enum State {
    Pending(PubSub),
    Active(MessageStream),
    Closed,
}

/// Subscription backed by a dedicated Redis pub/sub connection.
pub struct RedisSubscription {
    topic: String,
    state: State,
}

#[async_trait]
impl RawSubscription for RedisSubscription {
    async fn confirm(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(mut pubsub) => {
                // Resolves once the server acknowledged SUBSCRIBE
                pubsub.subscribe(&self.topic).await?;
                self.state = State::Active(Box::pin(pubsub.into_on_message()));
                info!(topic = %self.topic, "Redis subscription active");
                Ok(())
            }
            State::Active(stream) => {
                self.state = State::Active(stream);
                Ok(())
            }
            State::Closed => Err(TransportError::Closed),
        }
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        match &mut self.state {
            State::Active(stream) => stream
                .next()
                .await
                .map(|msg| msg.get_payload_bytes().to_vec()),
            _ => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream drops the dedicated connection
        self.state = State::Closed;
        debug!(topic = %self.topic, "Redis subscription closed");
        Ok(())
    }
}
