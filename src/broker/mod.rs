//! Typed, context-propagating message bus.
//!
//! [`Broker`] wraps a raw [`PubSubConnection`] and turns it into a bus of
//! [`Envelope`]s:
//! - `publish` injects the caller's causal context into the envelope headers
//!   before serializing, since headers are the only way context crosses the bus.
//! - `subscribe` confirms the raw subscription, then bridges it to a typed
//!   channel through one background delivery loop whose lifetime is bound to a
//!   [`CancellationToken`].
//!
//! Delivery is best-effort and at-most-once per connected subscriber.

use std::sync::Arc;

use opentelemetry::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::envelope::Envelope;
use crate::telemetry::SharedPropagator;
use crate::transport::{PubSubConnection, RawSubscription, TransportError};

/// Well-known topic shared by every producer and consumer.
pub const BROKER_KEY: &str = "work";

/// Capacity of the output channel returned by `subscribe`.
///
/// tokio channels cannot be zero-sized; one slot is the closest to a
/// rendezvous hand-off.
const OUTPUT_CAPACITY: usize = 1;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Timed out after {timeout:?} waiting for the backend ({attempts} pings): {last_error}")]
    ConnectTimeout {
        timeout: std::time::Duration,
        attempts: u32,
        last_error: String,
    },

    #[error("Subscription was not confirmed: {0}")]
    SubscriptionConfirm(#[source] TransportError),

    #[error("Envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Message bus over a shared pub/sub connection.
///
/// Holds no subscription state; every `subscribe` call is independent.
#[derive(Clone)]
pub struct Broker {
    conn: Arc<dyn PubSubConnection>,
    propagator: SharedPropagator,
    topic: String,
}

impl Broker {
    /// Create a broker on the well-known [`BROKER_KEY`] topic.
    pub fn new(conn: Arc<dyn PubSubConnection>, propagator: SharedPropagator) -> Self {
        Self::with_topic(conn, propagator, BROKER_KEY)
    }

    /// Create a broker on a custom topic.
    pub fn with_topic(
        conn: Arc<dyn PubSubConnection>,
        propagator: SharedPropagator,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            propagator,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn propagator(&self) -> &SharedPropagator {
        &self.propagator
    }

    /// Publish `payload` carrying the causal context of `cx`.
    ///
    /// A context that cannot be injected leaves the headers empty; the
    /// message is still published.
    #[tracing::instrument(name = "broker.publish", skip_all, fields(topic = %self.topic))]
    pub async fn publish(&self, cx: &Context, payload: &str) -> Result<()> {
        let mut envelope = Envelope::new(payload);
        envelope.inject(self.propagator.as_ref(), cx);

        let bytes = envelope.encode()?;
        self.conn.publish(&self.topic, bytes).await?;

        debug!(headers = envelope.headers.len(), "Published envelope");
        Ok(())
    }

    /// Subscribe to the topic.
    ///
    /// Returns only after the backend confirmed the subscription, so anything
    /// published after this call returns is delivered. The returned channel
    /// is closed, and the raw subscription released, once `token` is
    /// cancelled or the receiver is dropped.
    #[tracing::instrument(name = "broker.subscribe", skip_all, fields(topic = %self.topic))]
    pub async fn subscribe(&self, token: CancellationToken) -> Result<mpsc::Receiver<Envelope>> {
        let mut raw = self.conn.subscribe(&self.topic).await?;

        if let Err(e) = raw.confirm().await {
            if let Err(close_err) = raw.close().await {
                warn!(error = %close_err, "Failed to close unconfirmed subscription");
            }
            return Err(BrokerError::SubscriptionConfirm(e));
        }

        let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
        let span = tracing::info_span!("broker.listen", topic = %self.topic);
        tokio::spawn(deliver(raw, tx, token).instrument(span));

        info!("Subscription confirmed");
        Ok(rx)
    }

    /// Causal context carried by `envelope`, rooted at `base`.
    pub fn extract(&self, envelope: &Envelope, base: &Context) -> Context {
        envelope.extract(self.propagator.as_ref(), base)
    }
}

/// Delivery loop bridging a raw subscription to the typed output channel.
///
/// Exits only on cancellation or when the receiver is gone. The output
/// sender is dropped before the raw subscription is closed, and `close` runs
/// exactly once.
async fn deliver(
    mut raw: Box<dyn RawSubscription>,
    tx: mpsc::Sender<Envelope>,
    token: CancellationToken,
) {
    loop {
        let bytes = tokio::select! {
            _ = token.cancelled() => break,
            bytes = raw.recv() => bytes,
        };

        let Some(bytes) = bytes else {
            // Stream ended (connection lost). Nothing more will arrive;
            // hold the subscription until the owner cancels.
            warn!("Subscription stream ended, waiting for cancellation");
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tx.closed() => {}
            }
            break;
        };

        let envelope = match Envelope::decode(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Dropping malformed message");
                continue;
            }
        };

        tokio::select! {
            _ = token.cancelled() => {
                debug!("Cancelled while handing off, message dropped");
                break;
            }
            sent = tx.send(envelope) => {
                if sent.is_err() {
                    debug!("Receiver dropped, stopping delivery");
                    break;
                }
            }
        }
    }

    drop(tx);
    if let Err(e) = raw.close().await {
        warn!(error = %e, "Failed to close subscription");
    }
    info!("Delivery loop stopped");
}
