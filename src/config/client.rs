//! Edge client configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Edge client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full URL of the front-door endpoint.
    pub server_url: String,
    /// Wait before the first request, in milliseconds.
    pub startup_delay_ms: u64,
    /// Number of requests to send.
    pub requests: u32,
    /// Simulated work before each request, in milliseconds.
    pub request_delay_ms: u64,
    /// Value of the `username` baggage entry.
    pub username: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/hello".to_string(),
            startup_delay_ms: 10_000,
            requests: 5,
            request_delay_ms: 1_000,
            username: "donuts".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
