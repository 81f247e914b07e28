//! Front-door server and worker configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Front-door HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Simulated work per request, in milliseconds.
    pub work_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            work_delay_ms: 1_000,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Simulated work per message, in milliseconds.
    pub work_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_delay_ms: 1_000,
        }
    }
}

impl WorkerConfig {
    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }
}
