//! Broker interface step definitions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use opentelemetry::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tracelink::telemetry::default_propagator;
use tracelink::transport::PubSubConnection;
use tracelink::{Broker, Envelope};

use crate::backend::BusBackend;

const WAIT: Duration = Duration::from_secs(2);

/// Test context for Broker scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct BrokerWorld {
    backend: BusBackend,
    conn: Option<Arc<dyn PubSubConnection>>,
    broker: Option<Broker>,
    subscriptions: Vec<(CancellationToken, mpsc::Receiver<Envelope>)>,
    received: Vec<Envelope>,
}

impl fmt::Debug for BrokerWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerWorld")
            .field("backend", &self.backend)
            .field("topic", &self.broker.as_ref().map(|b| b.topic().to_string()))
            .field("subscriptions", &self.subscriptions.len())
            .field("received", &self.received)
            .finish()
    }
}

impl BrokerWorld {
    fn new() -> Self {
        Self {
            backend: BusBackend::from_env(),
            conn: None,
            broker: None,
            subscriptions: Vec::new(),
            received: Vec::new(),
        }
    }

    fn broker(&self) -> &Broker {
        self.broker.as_ref().expect("Broker not initialized")
    }

    async fn next(&mut self, index: usize) -> Option<Envelope> {
        let (_, rx) = &mut self.subscriptions[index];
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("Timed out waiting for delivery")
    }
}

impl Drop for BrokerWorld {
    fn drop(&mut self) {
        for (token, _) in &self.subscriptions {
            token.cancel();
        }
    }
}

fn remote_context(trace_id: &str, span_id: &str) -> Context {
    Context::new().with_remote_span_context(SpanContext::new(
        TraceId::from_hex(trace_id).expect("valid trace id"),
        SpanId::from_hex(span_id).expect("valid span id"),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    ))
}

// --- Background ---

#[given("a broker backend")]
async fn given_broker_backend(world: &mut BrokerWorld) {
    println!("Using backend: {}", world.backend.name());
    let conn = world.backend.connect();
    // Unique topic keeps scenarios apart on shared servers
    let topic = format!("test_{}", &Uuid::new_v4().simple().to_string()[..8]);
    world.broker = Some(Broker::with_topic(conn.clone(), default_propagator(), &topic));
    world.conn = Some(conn);
}

// --- Given steps ---

#[given("an active subscription")]
async fn given_active_subscription(world: &mut BrokerWorld) {
    given_active_subscriptions(world, 1).await;
}

#[given(expr = "{int} active subscriptions")]
async fn given_active_subscriptions(world: &mut BrokerWorld, count: usize) {
    for _ in 0..count {
        let token = CancellationToken::new();
        let rx = world
            .broker()
            .subscribe(token.clone())
            .await
            .expect("Subscribe should succeed");
        world.subscriptions.push((token, rx));
    }
}

// --- When steps ---

#[when(expr = "{string} is published with trace {string} and span {string}")]
async fn when_published_with_context(
    world: &mut BrokerWorld,
    payload: String,
    trace_id: String,
    span_id: String,
) {
    world
        .broker()
        .publish(&remote_context(&trace_id, &span_id), &payload)
        .await
        .expect("Publish should succeed");
}

#[when(expr = "{string} is published without context")]
async fn when_published_without_context(world: &mut BrokerWorld, payload: String) {
    world
        .broker()
        .publish(&Context::new(), &payload)
        .await
        .expect("Publish should succeed");
}

#[when("a malformed message is published to the topic")]
async fn when_malformed_published(world: &mut BrokerWorld) {
    let topic = world.broker().topic().to_string();
    world
        .conn
        .as_ref()
        .expect("Connection not initialized")
        .publish(&topic, b"{not an envelope".to_vec())
        .await
        .expect("Raw publish should succeed");
}

#[when(expr = "{int} numbered messages are published")]
async fn when_numbered_published(world: &mut BrokerWorld, count: usize) {
    for i in 0..count {
        world
            .broker()
            .publish(&Context::new(), &i.to_string())
            .await
            .expect("Publish should succeed");
    }
}

#[when("the subscription is cancelled")]
async fn when_cancelled(world: &mut BrokerWorld) {
    for (token, _) in &world.subscriptions {
        token.cancel();
    }
}

// --- Then steps ---

#[then(expr = "the subscriber receives {string}")]
async fn then_receives(world: &mut BrokerWorld, payload: String) {
    let envelope = world.next(0).await.expect("Channel closed unexpectedly");
    assert_eq!(envelope.payload, payload);
    world.received.push(envelope);
}

#[then(expr = "every subscriber receives {string}")]
async fn then_every_subscriber_receives(world: &mut BrokerWorld, payload: String) {
    for i in 0..world.subscriptions.len() {
        let envelope = world.next(i).await.expect("Channel closed unexpectedly");
        assert_eq!(envelope.payload, payload, "subscriber {}", i);
    }
}

#[then(expr = "the extracted context has trace {string} and span {string}")]
async fn then_extracted_context(world: &mut BrokerWorld, trace_id: String, span_id: String) {
    let envelope = world.received.last().expect("Nothing received");
    let cx = world.broker().extract(envelope, &Context::new());
    let span = cx.span();
    let sc = span.span_context();
    assert_eq!(sc.trace_id(), TraceId::from_hex(&trace_id).unwrap());
    assert_eq!(sc.span_id(), SpanId::from_hex(&span_id).unwrap());
}

#[then("the received headers are empty")]
async fn then_headers_empty(world: &mut BrokerWorld) {
    let envelope = world.received.last().expect("Nothing received");
    assert!(envelope.headers.is_empty());
}

#[then(expr = "the subscriber receives {int} numbered messages in order")]
async fn then_numbered_in_order(world: &mut BrokerWorld, count: usize) {
    for i in 0..count {
        let envelope = world.next(0).await.expect("Channel closed unexpectedly");
        assert_eq!(envelope.payload, i.to_string());
    }
}

#[then("the subscriber channel is closed")]
async fn then_channel_closed(world: &mut BrokerWorld) {
    assert!(world.next(0).await.is_none());
}
