//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{FetchError, StoreError};

/// Decides whether a failed operation is worth repeating.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    /// Only rate limiting is transient; everything else fails fast.
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay to randomize, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let jitter = clamp_jitter(self.jitter);
        if jitter == 0.0 || backoff.is_zero() {
            return backoff;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        backoff.mul_f64(factor).min(self.max_delay)
    }

    /// Delay before the next attempt, or `None` to give up.
    pub fn next_delay<E: Retryable>(&self, attempt: u32, err: &E) -> Option<Duration> {
        if !err.is_retryable() || attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay_for(attempt))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `on_retry` is called with the failed attempt number, the chosen delay
    /// and the error before sleeping.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        mut on_retry: impl FnMut(u32, Duration, &E),
    ) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(attempt, &err) {
                    Some(delay) => {
                        on_retry(attempt, delay, &err);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}

/// Jitter limited to `0.0..=1.0`; NaN and infinities disable it.
pub(crate) fn clamp_jitter(jitter: f64) -> f64 {
    if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fixed(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: 0.0,
        }
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = fixed(10);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy {
            jitter: 0.5,
            ..fixed(10)
        };
        for _ in 0..100 {
            let d = policy.delay_for(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_non_finite_jitter_is_ignored() {
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = RetryPolicy { jitter, ..fixed(10) };
            assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        }
    }

    #[test]
    fn test_only_rate_limits_are_retried() {
        let policy = fixed(3);
        assert!(policy.next_delay(1, &FetchError::RateLimited).is_some());
        assert!(policy.next_delay(3, &FetchError::RateLimited).is_none());
        assert!(policy
            .next_delay(1, &FetchError::Network("reset".into()))
            .is_none());
        assert!(RetryPolicy::none()
            .next_delay(1, &FetchError::RateLimited)
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();
        let started = tokio::time::Instant::now();

        let result: Result<(), FetchError> = fixed(3)
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(FetchError::RateLimited) }
                },
                |attempt, delay, _| retries.push((attempt, delay)),
            )
            .await;

        assert_eq!(result, Err(FetchError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            retries,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200))
            ]
        );
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers() {
        let calls = AtomicU32::new(0);
        let result = fixed(5)
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(FetchError::RateLimited)
                        } else {
                            Ok(n)
                        }
                    }
                },
                |_, _, _| {},
            )
            .await;
        assert_eq!(result, Ok(2));
    }
}
