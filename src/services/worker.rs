//! Background worker (consumer path).
//!
//! Drains a broker subscription and hands every envelope to a
//! [`MessageHandler`] on its own task. Handler tasks are fire-and-forget:
//! nothing waits on them and their failures never reach the consume loop,
//! so processing is best-effort and at-most-once.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use opentelemetry::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::envelope::Envelope;
use crate::telemetry::SharedPropagator;

/// Handler for processing envelopes taken off the bus.
pub trait MessageHandler: Send + Sync {
    /// Process one envelope. `cx` is the causal context carried by it.
    fn handle(&self, envelope: Envelope, cx: Context) -> BoxFuture<'static, ()>;
}

/// Handler that records a consumer span and sleeps for a fixed duration.
pub struct SimulatedWork {
    delay: Duration,
}

impl SimulatedWork {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl MessageHandler for SimulatedWork {
    fn handle(&self, envelope: Envelope, cx: Context) -> BoxFuture<'static, ()> {
        let span = tracing::info_span!("work", otel.kind = "consumer", payload = %envelope.payload);
        span.set_parent(cx);

        let delay = self.delay;
        Box::pin(
            async move {
                tokio::time::sleep(delay).await;
                debug!("Work done");
            }
            .instrument(span),
        )
    }
}

/// Consume loop over a broker subscription.
pub struct Worker {
    handler: Arc<dyn MessageHandler>,
    propagator: SharedPropagator,
}

impl Worker {
    pub fn new(handler: Arc<dyn MessageHandler>, propagator: SharedPropagator) -> Self {
        Self {
            handler,
            propagator,
        }
    }

    /// Consume until the channel is closed, spawning one task per envelope.
    ///
    /// Returns the number of envelopes dispatched.
    pub async fn run(&self, mut messages: mpsc::Receiver<Envelope>) -> usize {
        let mut dispatched = 0;

        while let Some(envelope) = messages.recv().await {
            let cx = envelope.extract(self.propagator.as_ref(), &Context::new());
            tokio::spawn(self.handler.handle(envelope, cx));
            dispatched += 1;
        }

        info!(dispatched, "Message stream closed, worker stopping");
        dispatched
    }
}
