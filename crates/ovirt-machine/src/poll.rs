//! Bounded polling until a remote condition holds.
//!
//! Every wait in the create and teardown pipelines goes through
//! [`poll_until`], so timeouts and read-error handling are uniform: a failed
//! read only means "not yet", and the timeout is the single hard failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{Error, Result};

/// Interval between checks and the overall budget for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Check immediately, then every `interval`, until `check` yields `Ok(true)`.
///
/// `Err` from `check` is logged and treated like `Ok(false)`. Returns
/// [`Error::Timeout`] once `timeout` has elapsed without success; the last
/// check happens at the deadline.
pub async fn poll_until<F, Fut, E>(config: &PollConfig, what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, E>>,
    E: Display,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match check().await {
            Ok(true) => {
                debug!(what, attempt, "condition met");
                return Ok(());
            }
            Ok(false) => debug!(what, attempt, "condition not met yet"),
            Err(e) => debug!(what, attempt, error = %e, "read failed while polling"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout {
                what: what.to_string(),
                timeout: config.timeout,
            });
        }
        tokio::time::sleep(config.interval.min(deadline - now)).await;
    }
}
