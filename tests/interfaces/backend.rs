//! Backend factory for interface tests.

use std::env;
use std::sync::Arc;

use tracelink::transport::{MockConnection, PubSubConnection};

/// Bus backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusBackend {
    Channel,
    Mock,
    Redis,
}

impl BusBackend {
    pub fn from_env() -> Self {
        match env::var("BUS_BACKEND")
            .unwrap_or_else(|_| "channel".to_string())
            .to_lowercase()
            .as_str()
        {
            "mock" => BusBackend::Mock,
            "redis" => BusBackend::Redis,
            _ => BusBackend::Channel,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BusBackend::Channel => "channel",
            BusBackend::Mock => "mock",
            BusBackend::Redis => "redis",
        }
    }

    /// Open a fresh connection for one scenario.
    pub fn connect(&self) -> Arc<dyn PubSubConnection> {
        match self {
            BusBackend::Channel => {
                #[cfg(feature = "channel")]
                {
                    Arc::new(tracelink::transport::ChannelConnection::new())
                }
                #[cfg(not(feature = "channel"))]
                {
                    panic!("Channel backend requires --features channel")
                }
            }
            BusBackend::Mock => Arc::new(MockConnection::new()),
            BusBackend::Redis => {
                #[cfg(feature = "redis")]
                {
                    let uri = env::var("REDIS_URI")
                        .unwrap_or_else(|_| "redis://localhost:6379".to_string());
                    Arc::new(
                        tracelink::transport::RedisConnection::new(&uri)
                            .expect("Invalid REDIS_URI"),
                    )
                }
                #[cfg(not(feature = "redis"))]
                {
                    panic!("Redis backend requires --features redis")
                }
            }
        }
    }
}
