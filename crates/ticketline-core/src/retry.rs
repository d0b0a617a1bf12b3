// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry policies.
//
// Used by the tray (icon creation) and by clients polling the intake server
// for liveness.  Attempts are counted from 1.

use std::time::Duration;

use tracing::{debug, warn};

/// Shape of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// `base * attempt`.
    Linear,
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

/// Tray icon creation: 3 attempts, 500 ms then 1000 ms apart.
pub const TRAY_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    base_delay: Duration::from_millis(500),
    backoff: Backoff::Linear,
};

/// Server liveness polling: 10 attempts, 1 s apart.
pub const LIVENESS_POLL: RetryPolicy = RetryPolicy {
    max_attempts: 10,
    base_delay: Duration::from_secs(1),
    backoff: Backoff::Fixed,
};

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// No attempts left.
    Exhausted,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt.max(1)),
        }
    }
}

/// Decide what to do after `attempts_made` failed attempts.
pub fn should_retry(attempts_made: u32, policy: &RetryPolicy) -> RetryDecision {
    if attempts_made >= policy.max_attempts {
        warn!(attempts_made, max = policy.max_attempts, "retry limit exhausted");
        RetryDecision::Exhausted
    } else {
        let delay = policy.delay_after(attempts_made);
        debug!(attempts_made, delay_ms = delay.as_millis() as u64, "scheduling retry");
        RetryDecision::RetryAfter(delay)
    }
}
