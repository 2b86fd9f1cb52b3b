//! Wait Mechanisms
//!
//! Bounded polling for UI transitions that happen asynchronously on the
//! remote browser side: popups opening, windows appearing, tabs being
//! restored after a restart.
//!
//! A wait either observes its condition within the timeout or fails with
//! [`CertProbeError::Timeout`]. Nothing is retried after a timeout.

use crate::result::{CertProbeError, CertProbeResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
    /// Number of times the condition was evaluated
    pub attempts: u32,
}

// =============================================================================
// WAIT
// =============================================================================

/// Bounded poller
#[derive(Debug, Clone, Copy, Default)]
pub struct Wait {
    options: WaitOptions,
}

impl Wait {
    /// Create a poller with the given options
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Poll `condition` until it returns `Ok(true)` or the timeout expires.
    ///
    /// A missing element counts as "not yet". Any other error ends the wait
    /// immediately and is returned unchanged.
    pub async fn until<F, Fut>(&self, waited_for: &str, mut condition: F) -> CertProbeResult<WaitResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CertProbeResult<bool>>,
    {
        let start = Instant::now();
        let timeout = self.options.timeout();
        let poll_interval = self.options.poll_interval();
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            match condition().await {
                Ok(true) => {
                    let elapsed = start.elapsed();
                    tracing::debug!(waited_for, attempts, ?elapsed, "wait satisfied");
                    return Ok(WaitResult {
                        elapsed,
                        waited_for: waited_for.to_string(),
                        attempts,
                    });
                }
                Ok(false) => {}
                Err(err) if err.is_element_not_found() => {}
                Err(err) => return Err(err),
            }

            if start.elapsed() >= timeout {
                return Err(CertProbeError::Timeout {
                    waited_for: waited_for.to_string(),
                    ms: self.options.timeout_ms,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
