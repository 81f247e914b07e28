//! Pub/sub transport layer.
//!
//! This module contains:
//! - `PubSubConnection` trait: liveness, publish and subscribe primitives
//! - `RawSubscription` trait: byte-level subscription handle
//! - Implementations: Redis, in-process channel, Mock

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{BackendType, BrokerConfig};

// Implementation modules
#[cfg(feature = "channel")]
pub mod channel;
pub mod mock;
#[cfg(feature = "redis")]
pub mod redis;

// Re-exports
#[cfg(feature = "channel")]
pub use channel::ChannelConnection;
pub use mock::MockConnection;
#[cfg(feature = "redis")]
pub use self::redis::RedisConnection;

// ============================================================================
// Traits
// ============================================================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by a pub/sub backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Subscription is closed")]
    Closed,

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// A connection to a pub/sub backend.
///
/// Implementations must be safe to share between any number of concurrent
/// publishers and subscribers.
#[async_trait]
pub trait PubSubConnection: Send + Sync {
    /// Succeeds iff the backend is reachable right now.
    async fn ping(&self) -> Result<()>;

    /// Best-effort, at-most-once publish of `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Open a subscription to `topic`.
    ///
    /// The subscription is not guaranteed to receive anything until
    /// [`RawSubscription::confirm`] has returned.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn RawSubscription>>;
}

/// Byte-level subscription handle returned by [`PubSubConnection::subscribe`].
#[async_trait]
pub trait RawSubscription: Send {
    /// Block until the backend reports the subscription as active.
    async fn confirm(&mut self) -> Result<()>;

    /// Next payload delivered by the backend.
    ///
    /// Returns `None` once the underlying stream has ended (connection lost
    /// or subscription closed). Must be cancel safe: dropping the future
    /// before completion must not lose a message.
    async fn recv(&mut self) -> Option<Vec<u8>>;

    /// Release backend resources. Calling it more than once is harmless.
    async fn close(&mut self) -> Result<()>;
}

// ============================================================================
// Factory
// ============================================================================

/// Build the connection selected by `config.backend`.
///
/// No network round-trip happens here; use
/// [`wait_until_ready`](crate::utils::bootstrap::wait_until_ready) before
/// first use.
pub fn init_connection(
    config: &BrokerConfig,
) -> std::result::Result<Arc<dyn PubSubConnection>, Box<dyn std::error::Error + Send + Sync>> {
    match config.backend {
        BackendType::Channel => {
            #[cfg(feature = "channel")]
            {
                info!(backend = "channel", "Pub/sub connection initialized");
                Ok(Arc::new(ChannelConnection::new()))
            }

            #[cfg(not(feature = "channel"))]
            {
                Err("Channel backend requires the 'channel' feature. Rebuild with --features channel".into())
            }
        }
        BackendType::Redis => {
            #[cfg(feature = "redis")]
            {
                let conn = RedisConnection::new(&config.url)?;
                info!(backend = "redis", url = %config.url, "Pub/sub connection initialized");
                Ok(Arc::new(conn))
            }

            #[cfg(not(feature = "redis"))]
            {
                Err("Redis backend requires the 'redis' feature. Rebuild with --features redis".into())
            }
        }
    }
}
