//! Polling for remote status changes
//!
//! Most services create and delete resources asynchronously. `StateChangeConf`
//! repeatedly calls a refresh function until the reported status is one of the
//! target states, failing on unknown states or when the timeout elapses.

use crate::error::{ClientError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Status reported by a refresh function for a resource that no longer exists
pub const STATE_DELETED: &str = "DELETED";

/// Wait configuration
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Wait between refreshes
    pub poll_interval: Duration,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll until a target state is reached.
    ///
    /// The refresh function returns the current object (if any) and its status.
    /// The object from the final refresh is returned.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, String)>>,
    {
        let deadline = Instant::now() + self.timeout;
        let target = self.target.join(", ");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut last_state = String::new();
        loop {
            let (object, state) = refresh().await?;
            tracing::debug!(state = %state, target = %target, "refreshed resource state");

            if self.target.iter().any(|t| *t == state) {
                return Ok(object);
            }
            if !self.pending.iter().any(|p| *p == state) {
                return Err(ClientError::UnexpectedState { state, target });
            }
            last_state = state;

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
            if Instant::now() >= deadline {
                break;
            }
        }

        Err(ClientError::Timeout {
            target,
            last_state,
            timeout: self.timeout,
        })
    }
}

/// Map a `get` result into a refresh outcome where a 404 means [`STATE_DELETED`].
pub fn deleted_on_not_found<T>(
    result: Result<T>,
    status: impl FnOnce(&T) -> String,
) -> Result<(Option<T>, String)> {
    match result {
        Ok(object) => {
            let state = status(&object);
            Ok((Some(object), state))
        }
        Err(e) if e.is_not_found() => Ok((None, STATE_DELETED.to_string())),
        Err(e) => Err(e),
    }
}
