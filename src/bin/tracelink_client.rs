//! tracelink-client: Edge client
//!
//! Waits for the server, sends a handful of traced requests to it, then
//! records an example error span.
//!
//! ## Configuration
//! - SERVER_URL: front-door URL (sets `client.server_url`)
//! - OTEL_AGENT_URL: OTLP agent address (sets `telemetry.otlp_endpoint`)
//! - TRACELINK__CLIENT__REQUESTS: number of requests (default: 5)

use tracelink::config::Config;
use tracelink::services::client::EdgeClient;
use tracelink::telemetry::Telemetry;

const SERVICE_NAME: &str = "client";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load(None)?;
    let telemetry = Telemetry::init(&config.telemetry, SERVICE_NAME)?;

    let client = EdgeClient::new(&config.client, telemetry.propagator());
    let result = client
        .run(config.client.startup_delay(), config.client.requests)
        .await;

    telemetry.shutdown()?;
    Ok(result?)
}
