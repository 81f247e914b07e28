//! tracelink-worker: Background worker
//!
//! Subscribes to the broker and processes every published message on its own
//! task, continuing the trace carried in the message headers.
//!
//! ## Configuration
//! - REDIS_URL: Redis URL (sets `broker.url` and selects the redis backend)
//! - OTEL_AGENT_URL: OTLP agent address (sets `telemetry.otlp_endpoint`)
//! - TRACELINK__WORKER__WORK_DELAY_MS: simulated work per message (default: 1000)

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use tracelink::broker::Broker;
use tracelink::config::Config;
use tracelink::services::worker::{SimulatedWork, Worker};
use tracelink::telemetry::Telemetry;
use tracelink::transport::init_connection;
use tracelink::utils::bootstrap::wait_until_ready;

const SERVICE_NAME: &str = "worker";

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

    let token = CancellationToken::new();
    let messages = broker.subscribe(token.clone()).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            token.cancel();
        }
    });

    let handler = Arc::new(SimulatedWork::new(config.worker.work_delay()));
    let worker = Worker::new(handler, telemetry.propagator());
    worker.run(messages).await;

    telemetry.shutdown()?;
    Ok(())
}
