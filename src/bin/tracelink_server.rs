//! tracelink-server: Front-door HTTP server
//!
//! Serves `GET /hello`, continuing the caller's trace and publishing the
//! response body to the broker for the worker to pick up.
//!
//! ## Architecture
//! ```text
//! [tracelink-client] --(HTTP + traceparent)--> [tracelink-server]
//!                                                     |
//!                                                     v
//!                                        Broker::publish (topic "work")
//! ```
//!
//! ## Configuration
//! - REDIS_URL: Redis URL (sets `broker.url` and selects the redis backend)
//! - OTEL_AGENT_URL: OTLP agent address (sets `telemetry.otlp_endpoint`)
//! - TRACELINK__SERVER__PORT: port to listen on (default: 8080)

use std::sync::Arc;

use tracing::info;

use tracelink::broker::Broker;
use tracelink::config::Config;
use tracelink::services::server::{serve, FrontDoor};
use tracelink::telemetry::Telemetry;
use tracelink::transport::init_connection;
use tracelink::utils::bootstrap::wait_until_ready;

const SERVICE_NAME: &str = "server";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load(None)?;
    config.broker.require_shared()?;
    let telemetry = Telemetry::init(&config.telemetry, SERVICE_NAME)?;

    let conn = init_connection(&config.broker)?;
    wait_until_ready(
        conn.as_ref(),
        config.bootstrap.ping_interval(),
        config.bootstrap.timeout(),
    )
    .await?;

    let broker = Broker::with_topic(conn, telemetry.propagator(), &config.broker.topic);
    let door = Arc::new(FrontDoor::new(broker, config.server.work_delay()));
    let addr = config.server.addr();

    let result = tokio::select! {
        result = serve(door, &addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    telemetry.shutdown()?;
    result
}
