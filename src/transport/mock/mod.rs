//! Mock pub/sub connection for testing.
//!
//! Delivers published payloads to confirmed subscriptions in-process and
//! exposes knobs for failure injection, raw-byte injection and observing
//! how many times subscriptions were closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use super::{PubSubConnection, RawSubscription, Result, TransportError};

#[derive(Default)]
struct Shared {
    subscribers: RwLock<Vec<(String, mpsc::UnboundedSender<Vec<u8>>)>>,
    published: RwLock<Vec<(String, Vec<u8>)>>,
    fail_on_ping: RwLock<bool>,
    fail_on_publish: RwLock<bool>,
    fail_on_subscribe: RwLock<bool>,
    fail_on_confirm: RwLock<bool>,
    pings: AtomicUsize,
    publishes: AtomicUsize,
    closes: AtomicUsize,
}

/// Mock pub/sub connection for testing.
#[derive(Clone, Default)]
pub struct MockConnection {
    shared: Arc<Shared>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_ping(&self, fail: bool) {
        *self.shared.fail_on_ping.write().await = fail;
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.shared.fail_on_publish.write().await = fail;
    }

    pub async fn set_fail_on_subscribe(&self, fail: bool) {
        *self.shared.fail_on_subscribe.write().await = fail;
    }

    pub async fn set_fail_on_confirm(&self, fail: bool) {
        *self.shared.fail_on_confirm.write().await = fail;
    }

    /// Payloads accepted by `publish`, in order.
    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.shared.published.read().await.clone()
    }

    pub async fn published_count(&self) -> usize {
        self.shared.published.read().await.len()
    }

    /// Push raw bytes to every confirmed subscription on `topic`, bypassing
    /// `publish`.
    pub async fn inject_raw(&self, topic: &str, payload: &[u8]) {
        self.deliver(topic, payload).await;
    }

    /// Simulate a dropped connection: every active stream ends.
    pub async fn end_streams(&self) {
        self.shared.subscribers.write().await.clear();
    }

    /// Number of confirmed subscriptions still attached.
    pub async fn active_subscriptions(&self) -> usize {
        self.shared
            .subscribers
            .read()
            .await
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn ping_count(&self) -> usize {
        self.shared.pings.load(Ordering::SeqCst)
    }

    /// Number of `publish` calls, failed ones included.
    pub fn publish_attempts(&self) -> usize {
        self.shared.publishes.load(Ordering::SeqCst)
    }

    /// Number of subscriptions that have been closed.
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    async fn deliver(&self, topic: &str, payload: &[u8]) {
        let mut subscribers = self.shared.subscribers.write().await;
        subscribers.retain(|(t, tx)| t != topic || tx.send(payload.to_vec()).is_ok());
    }
}

#[async_trait]
impl PubSubConnection for MockConnection {
    async fn ping(&self) -> Result<()> {
        self.shared.pings.fetch_add(1, Ordering::SeqCst);
        if *self.shared.fail_on_ping.read().await {
            return Err(TransportError::Connection("Mock ping failure".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.shared.publishes.fetch_add(1, Ordering::SeqCst);
        if *self.shared.fail_on_publish.read().await {
            return Err(TransportError::Publish("Mock publish failure".to_string()));
        }
        self.deliver(topic, &payload).await;
        self.shared
            .published
            .write()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn RawSubscription>> {
        if *self.shared.fail_on_subscribe.read().await {
            return Err(TransportError::Subscribe("Mock subscribe failure".to_string()));
        }
        Ok(Box::new(MockSubscription {
            topic: topic.to_string(),
            shared: self.shared.clone(),
            receiver: None,
            closed: false,
        }))
    }
}

/// Subscription handed out by [`MockConnection`].
pub struct MockSubscription {
    topic: String,
    shared: Arc<Shared>,
    receiver: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: bool,
}

#[async_trait]
impl RawSubscription for MockSubscription {
    async fn confirm(&mut self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if *self.shared.fail_on_confirm.read().await {
            return Err(TransportError::Subscribe("Mock confirm failure".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .write()
            .await
            .push((self.topic.clone(), tx));
        self.receiver = Some(rx);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.as_mut()?.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.receiver = None;
        Ok(())
    }
}
