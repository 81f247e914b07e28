//! Tracelink - causal-context-propagating message bus
//!
//! A front-door server publishes work through a [`broker::Broker`] and a
//! background worker consumes it. The broker carries the causal context
//! (W3C trace context and baggage) inside every [`envelope::Envelope`], so a
//! single request can be followed from the edge client through the server
//! to the worker.

pub mod broker;
pub mod config;
pub mod envelope;
pub mod services;
pub mod telemetry;
pub mod transport;
pub mod utils;

pub use broker::{Broker, BrokerError, BROKER_KEY};
pub use envelope::{Envelope, Headers};
