//! Bounded polling
//!
//! The one wait loop used for API readiness, status checks, machine
//! readiness, kubectl apply retries and post-delete emptiness checks.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::ClusterClientError;

/// How often to probe, and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollBudget {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Probe immediately, then every `budget.interval`, until the probe returns
/// `Ok(true)`.
///
/// A probe error ends polling at once and is returned unchanged. If the
/// timeout passes first the result is [`ClusterClientError::Timeout`] naming
/// `condition`. The probe is never invoked after the deadline.
pub async fn poll_immediate<F, Fut>(
    budget: PollBudget,
    condition: &str,
    mut probe: F,
) -> Result<(), ClusterClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ClusterClientError>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if probe().await? {
            debug!("{} after {} attempt(s)", condition, attempt);
            return Ok(());
        }

        sleep(budget.interval).await;
        if started.elapsed() >= budget.timeout {
            warn!(
                "Gave up waiting for {} after {} attempt(s) ({:?})",
                condition, attempt, budget.timeout
            );
            return Err(ClusterClientError::Timeout {
                condition: condition.to_string(),
                timeout: budget.timeout,
            });
        }
        debug!("Waiting for {} (attempt {})", condition, attempt + 1);
    }
}
