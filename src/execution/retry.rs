//! Broker submission with bounded retry on transient failures.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::exchange::{BrokerClient, BrokerFill, MarketOrderRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Attempt `n` (1-based) waits `n * backoff` before retrying
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub result: Result<BrokerFill, BrokerError>,
    /// Broker calls made, including the first
    pub attempts: u32,
    pub latency: Duration,
}

/// Submit, retrying transient errors up to `policy.max_retries` times.
/// Permanent errors return after the first attempt.
pub async fn submit_with_retry(
    broker: &dyn BrokerClient,
    request: &MarketOrderRequest,
    policy: RetryPolicy,
) -> SubmissionOutcome {
    let started = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = broker.submit_market_order(request).await;
        match result {
            Err(ref e) if e.is_transient() && attempts <= policy.max_retries => {
                let wait = policy.backoff * attempts;
                warn!(
                    instrument = %request.instrument,
                    attempt = attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Transient broker error, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            _ => {
                debug!(instrument = %request.instrument, attempts, ok = result.is_ok(), "Submission finished");
                return SubmissionOutcome {
                    result,
                    attempts,
                    latency: started.elapsed(),
                };
            }
        }
    }
}
