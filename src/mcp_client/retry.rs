//! Retry policy for RPC calls.
//!
//! A pure function of (attempts made, classified failure). The client owns
//! the loop; the policy only decides what happens next.

use std::time::Duration;

use super::errors::TransportFailure;
use crate::config::RetryConfig;

/// What the client should do after a failed attempt on the primary transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then try the primary transport again.
    Retry { delay: Duration },
    /// Primary exhausted; send the same envelope once over the fallback.
    Fallback,
    /// Not retry-eligible; surface the failure.
    Fail,
}

/// Fixed-delay retry on premature close, then one fallback attempt.
///
/// `max_retries` counts retries, not attempts: `max_retries = 3` allows four
/// primary attempts, then one fallback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.delay())
    }

    /// Decide the next step after `attempts` failed primary attempts
    /// (1-based), the last of which failed with `failure`.
    pub fn decide(&self, attempts: u32, failure: &TransportFailure) -> RetryDecision {
        if !failure.is_premature_close() {
            return RetryDecision::Fail;
        }
        if attempts <= self.max_retries {
            RetryDecision::Retry { delay: self.delay }
        } else {
            RetryDecision::Fallback
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premature() -> TransportFailure {
        TransportFailure::PrematureClose {
            reason: "connection closed before message completed".into(),
        }
    }

    #[test]
    fn test_premature_close_retries_then_falls_back() {
        let policy = RetryPolicy::default();
        let delay = Duration::from_millis(300);
        assert_eq!(policy.decide(1, &premature()), RetryDecision::Retry { delay });
        assert_eq!(policy.decide(2, &premature()), RetryDecision::Retry { delay });
        assert_eq!(policy.decide(3, &premature()), RetryDecision::Retry { delay });
        assert_eq!(policy.decide(4, &premature()), RetryDecision::Fallback);
    }

    #[test]
    fn test_other_failures_never_retry() {
        let policy = RetryPolicy::default();
        let failures = [
            TransportFailure::Timeout { reason: "read".into() },
            TransportFailure::Connect { reason: "refused".into() },
            TransportFailure::PoolExhausted { waited_ms: 10_000 },
            TransportFailure::Other { reason: "decode".into() },
        ];
        for failure in &failures {
            assert_eq!(policy.decide(1, failure), RetryDecision::Fail);
        }
    }

    #[test]
    fn test_zero_retries_goes_straight_to_fallback() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.decide(1, &premature()), RetryDecision::Fallback);
    }
}
