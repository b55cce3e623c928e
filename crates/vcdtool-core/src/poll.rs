//! Fixed-interval polling.
//!
//! The server finishes descriptor processing and disk transfers
//! asynchronously, so the upload flows repeatedly probe a status document.
//! [`poll_until`] owns that loop; the probe only answers "done yet?".

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// How often to probe and how many probes to allow.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between two probes.
    pub interval: Duration,
    /// Probe budget. `None` waits indefinitely.
    pub max_attempts: Option<u32>,
    /// Sleep function called between probes.
    pub sleep: fn(Duration),
}

impl PollPolicy {
    /// Create a policy that sleeps on the current thread.
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
            sleep: std::thread::sleep,
        }
    }

    /// Create a policy without an attempt budget.
    pub fn unbounded(interval: Duration) -> Self {
        Self::new(interval, None)
    }

    /// Replace the sleep function, e.g. with a no-op in tests.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }
}

/// Repeat `probe` until it yields a value.
///
/// `probe` receives the 1-based attempt number. Errors from `probe` abort the
/// loop immediately. When the attempt budget runs out, an
/// [`Error::Timeout`] naming `operation` is returned.
pub fn poll_until<T, F>(policy: &PollPolicy, operation: &str, mut probe: F) -> Result<T>
where
    F: FnMut(u32) -> Result<Option<T>>,
{
    let mut attempt = 1u32;
    loop {
        if let Some(value) = probe(attempt)? {
            debug!(operation, attempt, "poll finished");
            return Ok(value);
        }

        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                return Err(Error::timeout(operation, attempt));
            }
        }

        (policy.sleep)(policy.interval);
        attempt = attempt.saturating_add(1);
    }
}
