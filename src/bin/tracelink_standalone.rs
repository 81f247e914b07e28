//! tracelink-standalone: All three roles in one process
//!
//! Runs the front-door server and the worker over the configured backend
//! (in-process channels by default) and drives them with the edge client.
//! Exits once the client has finished its requests.
//!
//! ## Architecture
//! ```text
//! tracelink-standalone (single process)
//!     ├── EdgeClient   ──HTTP──→ FrontDoor (:8080)
//!     ├── FrontDoor    ──Broker::publish──→ backend
//!     └── Worker       ←─Broker::subscribe── backend
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tracelink::broker::Broker;
use tracelink::config::Config;
use tracelink::services::client::EdgeClient;
use tracelink::services::server::{serve, FrontDoor};
use tracelink::services::worker::{SimulatedWork, Worker};
use tracelink::telemetry::Telemetry;
use tracelink::transport::init_connection;
use tracelink::utils::bootstrap::wait_until_ready;

const SERVICE_NAME: &str = "standalone";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load(None)?;
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
    let worker = Worker::new(
        Arc::new(SimulatedWork::new(config.worker.work_delay())),
        telemetry.propagator(),
    );
    let worker_task = tokio::spawn(async move { worker.run(messages).await });

    let door = Arc::new(FrontDoor::new(broker, config.server.work_delay()));
    let addr = config.server.addr();
    let server_task = tokio::spawn(async move {
        if let Err(e) = serve(door, &addr).await {
            error!(error = %e, "Front door stopped");
        }
    });

    let client = EdgeClient::new(&config.client, telemetry.propagator());
    let result = client
        .run(config.client.startup_delay(), config.client.requests)
        .await;

    // Let in-flight work finish before tearing down
    tokio::time::sleep(config.worker.work_delay() + Duration::from_millis(100)).await;
    token.cancel();
    let dispatched = worker_task.await?;
    server_task.abort();
    info!(dispatched, "Standalone run complete");

    telemetry.shutdown()?;
    Ok(result?)
}
