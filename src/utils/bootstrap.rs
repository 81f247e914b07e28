//! Bootstrap utilities for tracelink binaries.
//!
//! Gates first use of a backend connection on a successful liveness check.

use std::time::Duration;

use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broker::{BrokerError, Result};
use crate::transport::PubSubConnection;

/// Floor for the ping interval; tokio intervals cannot have a zero period.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `conn` every `ping_interval` until a ping succeeds.
///
/// The first ping happens one interval after the call. A zero interval is
/// raised to [`MIN_PING_INTERVAL`]. Fails with
/// [`BrokerError::ConnectTimeout`] if no ping succeeded within `deadline`;
/// a ping still in flight at the deadline is abandoned.
pub async fn wait_until_ready(
    conn: &dyn PubSubConnection,
    ping_interval: Duration,
    deadline: Duration,
) -> Result<()> {
    let ping_interval = ping_interval.max(MIN_PING_INTERVAL);
    let mut attempts = 0u32;
    let mut last_error = String::from("no ping attempted");

    let poll = async {
        let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            attempts += 1;
            match conn.ping().await {
                Ok(()) => return,
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "Backend not ready");
                    last_error = e.to_string();
                }
            }
        }
    };

    let outcome = timeout(deadline, poll).await;
    match outcome {
        Ok(()) => {
            info!(attempts, "Backend ready");
            Ok(())
        }
        Err(_) => {
            warn!(attempts, timeout = ?deadline, error = %last_error, "Timed out waiting for backend");
            Err(BrokerError::ConnectTimeout {
                timeout: deadline,
                attempts,
                last_error,
            })
        }
    }
}
