//! Interface tests for pub/sub backends using Cucumber.
//!
//! These scenarios verify that every backend gives the broker the same
//! observable behavior. Select a backend via environment variable:
//!
//! ```bash
//! # In-process channels (default)
//! cargo test --test interfaces
//!
//! # Mock backend
//! BUS_BACKEND=mock cargo test --test interfaces
//!
//! # Redis (requires a running instance, see REDIS_URI)
//! BUS_BACKEND=redis cargo test --test interfaces --features redis
//! ```

mod backend;
mod steps;

use cucumber::World;
use steps::broker::BrokerWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Broker Interface Tests ===\n");
    BrokerWorld::cucumber()
        .fail_on_skipped()
        .run("tests/interfaces/features/broker.feature")
        .await;
}
