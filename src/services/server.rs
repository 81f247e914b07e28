//! Front-door HTTP server (producer path).
//!
//! `GET /hello` continues the caller's trace, publishes the response body to
//! the broker and returns it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use opentelemetry::baggage::BaggageExt;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::HeaderExtractor;
use crate::broker::Broker;
use crate::telemetry::span_context;

/// Body returned to callers and published to the bus.
pub const HELLO_BODY: &str = "hello, world";

/// Shared state for axum handlers.
pub struct FrontDoor {
    broker: Broker,
    work_delay: Duration,
}

impl FrontDoor {
    pub fn new(broker: Broker, work_delay: Duration) -> Self {
        Self { broker, work_delay }
    }
}

type AppState = Arc<FrontDoor>;

/// Build the axum router (separated for testing).
pub fn router(door: Arc<FrontDoor>) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .layer(TraceLayer::new_for_http())
        .with_state(door)
}

/// Start the HTTP server on `addr`.
pub async fn serve(
    door: Arc<FrontDoor>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "Front door listening");
    axum::serve(listener, router(door)).await?;
    Ok(())
}

async fn hello(
    State(door): State<AppState>,
    headers: HeaderMap,
) -> Result<&'static str, (StatusCode, String)> {
    let parent_cx = door
        .broker
        .propagator()
        .extract(&HeaderExtractor(&headers));

    // Simulated work
    tokio::time::sleep(door.work_delay).await;

    let span = tracing::info_span!("handle request", body = tracing::field::Empty);
    span.set_parent(parent_cx.clone());

    let username = parent_cx
        .baggage()
        .get("username")
        .map(|v| v.to_string())
        .unwrap_or_default();
    info!(parent: &span, username = %username, "reading username baggage");
    span.record("body", HELLO_BODY);

    let publish_span = tracing::info_span!(parent: &span, "broker publish", otel.kind = "producer");
    let cx = span_context(&publish_span, &parent_cx);

    match door
        .broker
        .publish(&cx, HELLO_BODY)
        .instrument(publish_span)
        .await
    {
        Ok(()) => Ok(HELLO_BODY),
        Err(e) => {
            error!(parent: &span, error = %e, "Failed to publish");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
