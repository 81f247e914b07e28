//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod client;
mod messaging;
mod server;

pub use client::ClientConfig;
pub use messaging::{BackendType, BootstrapConfig, BrokerConfig};
pub use server::{ServerConfig, WorkerConfig};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "tracelink.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "TRACELINK_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "TRACELINK";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "TRACELINK_LOG";

/// Deployment variable for the broker backend URL.
pub const REDIS_URL_ENV_VAR: &str = "REDIS_URL";
/// Deployment variable for the OTLP agent address.
pub const OTEL_AGENT_URL_ENV_VAR: &str = "OTEL_AGENT_URL";
/// Deployment variable for the front-door URL used by the client.
pub const SERVER_URL_ENV_VAR: &str = "SERVER_URL";

/// Deployment variables mapped onto configuration keys.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    (REDIS_URL_ENV_VAR, "broker.url"),
    (OTEL_AGENT_URL_ENV_VAR, "telemetry.otlp_endpoint"),
    (SERVER_URL_ENV_VAR, "client.server_url"),
];

use serde::Deserialize;

/// Configuration error.
pub type ConfigError = ::config::ConfigError;

/// Telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
    /// Log filter directives; falls back to `TRACELINK_LOG`, then "info".
    pub log_filter: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker backend configuration.
    pub broker: BrokerConfig,
    /// Readiness polling configuration.
    pub bootstrap: BootstrapConfig,
    /// Telemetry configuration.
    pub telemetry: TelemetryConfig,
    /// Front-door server configuration.
    pub server: ServerConfig,
    /// Worker configuration.
    pub worker: WorkerConfig,
    /// Edge client configuration.
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `tracelink.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Deployment variables (`REDIS_URL`, `OTEL_AGENT_URL`, `SERVER_URL`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading deployment variables through `lookup`.
    pub fn load_with(
        path: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        // Add config file from path argument if provided
        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        // Add config file from CONFIG_ENV_VAR env var if set
        if let Some(config_path) = lookup(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                builder = builder.set_override(*key, value)?;
            }
        }

        // A Redis URL means the processes share a Redis broker
        if lookup(REDIS_URL_ENV_VAR).is_some_and(|v| !v.is_empty()) {
            builder = builder.set_override("broker.backend", "redis")?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.broker.backend, BackendType::Channel);
        assert_eq!(config.broker.topic, "work");
        assert_eq!(config.bootstrap.ping_interval_ms, 3_000);
        assert_eq!(config.bootstrap.timeout_ms, 60_000);
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.client.requests, 5);
        assert!(config.telemetry.otlp_endpoint.is_none());
    }

    #[test]
    fn test_deployment_overrides() {
        let config = Config::load_with(None, |key| match key {
            REDIS_URL_ENV_VAR => Some("redis://redis:6379".to_string()),
            OTEL_AGENT_URL_ENV_VAR => Some("otel-agent:4317".to_string()),
            SERVER_URL_ENV_VAR => Some("http://server:8080/hello".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.broker.url, "redis://redis:6379");
        assert_eq!(config.broker.backend, BackendType::Redis);
        assert_eq!(
            config.telemetry.otlp_endpoint.as_deref(),
            Some("otel-agent:4317")
        );
        assert_eq!(config.client.server_url, "http://server:8080/hello");
    }

    #[test]
    fn test_redis_url_selects_redis_backend() {
        let config = Config::load_with(None, |key| {
            (key == REDIS_URL_ENV_VAR).then(|| "redis://redis:6379".to_string())
        })
        .unwrap();

        assert_eq!(config.broker.backend, BackendType::Redis);
        assert!(config.broker.require_shared().is_ok());
    }

    #[test]
    fn test_empty_redis_url_keeps_channel_backend() {
        let config = Config::load_with(None, |key| {
            (key == REDIS_URL_ENV_VAR).then(String::new)
        })
        .unwrap();

        assert_eq!(config.broker.backend, BackendType::Channel);
        assert!(config.broker.require_shared().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(
            &path,
            "broker:\n  backend: redis\n  topic: jobs\nbootstrap:\n  ping_interval_ms: 10\n",
        )
        .unwrap();

        let config = Config::load_with(path.to_str(), |_| None).unwrap();

        assert_eq!(config.broker.backend, BackendType::Redis);
        assert_eq!(config.broker.topic, "jobs");
        assert_eq!(config.bootstrap.ping_interval_ms, 10);
        assert_eq!(config.bootstrap.timeout_ms, 60_000);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Config::load_with(Some("/nonexistent/tracelink.yaml"), |_| None).is_err());
    }
}
