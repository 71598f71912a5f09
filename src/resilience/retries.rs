//! Retry and failover bookkeeping.
//!
//! # Responsibilities
//! - Count same-backend retries and top-level dispatch attempts per request
//! - Decide between retrying the same backend, failing over, and rejecting
//!
//! # Design Decisions
//! - Transport errors only; any HTTP response from a backend is final
//! - Fixed delay between same-backend retries, no jitter
//! - Failover marks the backend down; only the prober brings it back

use std::time::Duration;

use crate::config::RetryConfig;

/// Limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transport failures on one backend before failover.
    pub max_retries: u32,
    /// Pause before retrying the same backend.
    pub retry_delay: Duration,
    /// Top-level attempts before the request is rejected.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

/// What to do after a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Wait, then forward to the same backend again.
    RetrySameBackend,
    /// Mark the backend down and schedule the request afresh.
    Failover,
}

/// Per-request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// Top-level dispatch passes, starting at 1.
    pub attempts: u32,
    /// Same-backend retries for the current backend, starting at 0.
    pub retries: u32,
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryContext {
    pub fn new() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }

    /// True once the attempt budget is spent.
    pub fn exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts > policy.max_attempts
    }

    /// Reset the retry count for a freshly selected backend.
    pub fn start_backend(&mut self) {
        self.retries = 0;
    }

    /// Count a transport error and decide the next step.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> NextStep {
        self.retries += 1;
        if self.retries < policy.max_retries {
            NextStep::RetrySameBackend
        } else {
            NextStep::Failover
        }
    }

    /// Move on to the next top-level attempt.
    pub fn fail_over(&mut self) {
        self.attempts += 1;
        self.retries = 0;
    }
}
