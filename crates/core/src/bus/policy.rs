//! Retry policies for message handlers and DAG nodes.

use std::time::Duration;

use crate::constants::{DEFAULT_BACKOFF_FACTOR, DEFAULT_FIRST_RETRY};

/// Decides whether a failed handler invocation is attempted again.
///
/// One instance lives for one dispatch of one message to one handler.
pub trait Policy: Send {
    /// Called after each domain-level failure. `Some(delay)` asks for another
    /// attempt after `delay`; `None` gives up.
    fn next_delay(&mut self) -> Option<Duration>;
}

/// Builds a fresh [`Policy`] for every dispatch.
pub trait PolicyFactory: Send + Sync {
    fn build(&self) -> Box<dyn Policy>;
}

/// A cloneable policy is its own factory: each dispatch gets a clone of the
/// registered prototype.
impl<P> PolicyFactory for P
where
    P: Policy + Clone + Sync + 'static,
{
    fn build(&self) -> Box<dyn Policy> {
        Box::new(self.clone())
    }
}

/// Exponential backoff: `delay(n) = first_delay * factor^(n-1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    first_delay: Duration,
    factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_RETRY, DEFAULT_BACKOFF_FACTOR)
    }
}

impl Backoff {
    pub fn new(first_delay: Duration, factor: f64) -> Self {
        Self {
            first_delay,
            factor,
        }
    }

    pub fn first_delay(&self) -> Duration {
        self.first_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Delay before retry number `retry` (1-based). Saturates at
    /// `Duration::MAX` when the value is not representable.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.first_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Never retries: the handler gets exactly one attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreErrorsPolicy;

impl Policy for IgnoreErrorsPolicy {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }
}

/// Retries forever with exponential backoff.
#[derive(Clone, Debug, Default)]
pub struct IndefiniteRetryPolicy {
    backoff: Backoff,
    retries: u32,
}

impl IndefiniteRetryPolicy {
    pub fn new(first_delay: Duration, factor: f64) -> Self {
        Self::with_backoff(Backoff::new(first_delay, factor))
    }

    pub fn with_backoff(backoff: Backoff) -> Self {
        Self {
            backoff,
            retries: 0,
        }
    }
}

impl Policy for IndefiniteRetryPolicy {
    fn next_delay(&mut self) -> Option<Duration> {
        self.retries = self.retries.saturating_add(1);
        Some(self.backoff.delay(self.retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(actual: Duration, expected_secs: f64) {
        assert!(
            (actual.as_secs_f64() - expected_secs).abs() < 1e-6,
            "{actual:?} != {expected_secs}s"
        );
    }

    #[test]
    fn test_ignore_errors_never_retries() {
        let mut policy = IgnoreErrorsPolicy;
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn test_indefinite_retry_doubles_delay() {
        let mut policy = IndefiniteRetryPolicy::new(Duration::from_secs(30), 2.0);
        assert_close(policy.next_delay().unwrap(), 30.0);
        assert_close(policy.next_delay().unwrap(), 60.0);
        assert_close(policy.next_delay().unwrap(), 120.0);
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        let prototype = IndefiniteRetryPolicy::new(Duration::from_millis(100), 3.0);

        let mut first = PolicyFactory::build(&prototype);
        first.next_delay();
        first.next_delay();

        let mut second = PolicyFactory::build(&prototype);
        assert_close(second.next_delay().unwrap(), 0.1);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let backoff = Backoff::new(Duration::from_secs(30), 10.0);
        assert_eq!(backoff.delay(u32::MAX), Duration::MAX);
    }

    proptest! {
        #[test]
        fn prop_nth_retry_delay_is_exponential(
            first_ms in 1u64..10_000,
            factor in 1.0f64..4.0,
            n in 1u32..12,
        ) {
            let mut policy = IndefiniteRetryPolicy::new(Duration::from_millis(first_ms), factor);
            let mut last = Duration::ZERO;
            for _ in 0..n {
                last = policy.next_delay().unwrap();
            }
            let expected = first_ms as f64 / 1000.0 * factor.powi(n as i32 - 1);
            prop_assert!((last.as_secs_f64() - expected).abs() <= expected * 1e-9 + 1e-6);
        }
    }
}
