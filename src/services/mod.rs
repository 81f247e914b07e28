//! The three process roles built on the broker.
//!
//! - `server`: front-door HTTP endpoint that publishes work (producer path)
//! - `worker`: consumes published work (consumer path)
//! - `client`: edge client driving requests into the server

pub mod client;
pub mod server;
pub mod worker;

pub use client::{ClientError, EdgeClient};
pub use server::FrontDoor;
pub use worker::{MessageHandler, SimulatedWork, Worker};

/// Adapter to inject OTel context into HTTP headers.
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl opentelemetry::propagation::Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(key.as_bytes()),
            http::header::HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Adapter to extract OTel context from HTTP headers.
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl opentelemetry::propagation::Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
