//! Edge client.
//!
//! Sends instrumented requests to the front door. Each request starts a new
//! trace, attaches `username` baggage and injects both into the outgoing
//! HTTP headers.

use std::time::Duration;

use opentelemetry::baggage::BaggageExt;
use opentelemetry::{Context, KeyValue};
use tracing::{error, info, Instrument};

use super::HeaderInjector;
use crate::config::ClientConfig;
use crate::telemetry::{span_context, SharedPropagator};

/// Errors raised by the edge client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for the front-door endpoint.
pub struct EdgeClient {
    http: reqwest::Client,
    url: String,
    username: String,
    request_delay: Duration,
    propagator: SharedPropagator,
}

impl EdgeClient {
    pub fn new(config: &ClientConfig, propagator: SharedPropagator) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.server_url.clone(),
            username: config.username.clone(),
            request_delay: config.request_delay(),
            propagator,
        }
    }

    /// Perform one request and return the response body.
    pub async fn make_request(&self) -> Result<String, ClientError> {
        let span = tracing::info_span!("make request", url = %self.url);
        let cx = span_context(&span, &Context::new())
            .with_baggage(vec![KeyValue::new("username", self.username.clone())]);

        let mut headers = http::HeaderMap::new();
        self.propagator
            .inject_context(&cx, &mut HeaderInjector(&mut headers));

        async {
            // Simulated work before the request
            tokio::time::sleep(self.request_delay).await;

            let body = self
                .http
                .get(&self.url)
                .headers(headers)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            info!(body = %body, "Received response");
            Ok::<_, ClientError>(body)
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| error!(parent: &span, error = %e, "Request failed"))
    }

    /// Wait for the server, send `requests` requests, then record an example
    /// error span. The first failed request aborts the run.
    pub async fn run(&self, startup_delay: Duration, requests: u32) -> Result<(), ClientError> {
        async {
            tokio::time::sleep(startup_delay).await;
            info!(?startup_delay, "waited for server to come up");
        }
        .instrument(tracing::info_span!("wait for server"))
        .await;

        for _ in 0..requests {
            self.make_request().await?;
        }

        let span = tracing::error_span!(
            "example error",
            otel.status_code = "ERROR",
            otel.status_message = "fail entire span"
        );
        error!(parent: &span, error = "example error", "Recorded example error");

        Ok(())
    }
}
