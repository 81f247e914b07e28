//! Broker backend and bootstrap configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::broker::BROKER_KEY;

/// Backend type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// In-process broadcast channels (no external broker).
    #[default]
    Channel,
    /// Redis pub/sub.
    Redis,
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Backend type discriminator.
    pub backend: BackendType,
    /// Backend connection URL.
    pub url: String,
    /// Topic carrying the work messages.
    pub topic: String,
}

impl BrokerConfig {
    /// Fail unless the backend can be reached from other processes.
    ///
    /// The channel backend only connects publishers and subscribers inside
    /// one process, so separate server and worker processes would never see
    /// each other's messages.
    pub fn require_shared(&self) -> Result<(), super::ConfigError> {
        match self.backend {
            BackendType::Redis => Ok(()),
            BackendType::Channel => Err(super::ConfigError::Message(
                "the channel backend only works within one process; set REDIS_URL \
                 (or broker.backend: redis) or run tracelink-standalone"
                    .to_string(),
            )),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Channel,
            url: "redis://localhost:6379".to_string(),
            topic: BROKER_KEY.to_string(),
        }
    }
}

/// Readiness polling applied before a backend connection is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Interval between liveness checks, in milliseconds.
    pub ping_interval_ms: u64,
    /// Hard deadline for the backend to become reachable, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 3_000,
            timeout_ms: 60_000,
        }
    }
}

impl BootstrapConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
