// src/provider/retry.rs — Retry with exponential backoff for gateway calls
//
// Retries: rate limits (429) and transport failures flagged retriable (5xx,
// timeouts, connection resets). Never retries malformed responses, bad requests
// or auth errors. Cancellation is checked before every attempt, so an operator
// abort takes effect between retries and not only before the first call.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::infra::config::RetryToml;
use crate::infra::errors::DebateError;

/// Default retry configuration.
const MAX_RETRIES: u32 = 3;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl From<&RetryToml> for RetryConfig {
    fn from(cfg: &RetryToml) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            backoff_factor: cfg.backoff_factor,
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter_fraction: cfg.jitter_fraction.clamp(0.0, 1.0),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // If the server told us how long to wait, use that (with a small buffer).
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

/// Determine if an error should be retried.
pub fn should_retry(error: &DebateError) -> bool {
    error.is_retriable()
}

/// Extract rate-limit retry delay from the error, if available.
fn rate_limit_delay(error: &DebateError) -> Option<Duration> {
    match error {
        DebateError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// Suspension point between attempts. Injected so tests can observe delays
/// without waiting for them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Shared abort switch for one session. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Successful result of a retried operation.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retriable error, or the retry
/// budget is spent. Backoff counters live on this call's stack only.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    cancel: &CancelFlag,
    label: &str,
    mut op: F,
) -> Result<Retried<T>, DebateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DebateError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(DebateError::Cancelled);
        }

        match op().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(e) => {
                if !should_retry(&e) || attempt >= config.max_retries {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt, rate_limit_delay(&e));
                tracing::warn!(
                    call = label,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}",
                    e
                );

                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NoSleep(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn transport(retriable: bool) -> DebateError {
        DebateError::Transport {
            provider: "test".into(),
            message: "HTTP 503".into(),
            retriable,
        }
    }

    #[test]
    fn test_should_retry_rate_limited() {
        let err = DebateError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 5000,
        };
        assert!(should_retry(&err));
    }

    #[test]
    fn test_should_not_retry_malformed() {
        assert!(!should_retry(&DebateError::malformed("arbiter", "empty")));
    }

    #[test]
    fn test_should_not_retry_non_retriable_transport() {
        assert!(!should_retry(&transport(false)));
    }

    #[test]
    fn test_rate_limit_delay_zero_is_ignored() {
        let err = DebateError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 0,
        };
        assert!(rate_limit_delay(&err).is_none());
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let cfg = RetryConfig::default();
        let d0 = cfg.delay_for_attempt(0, None);
        let d1 = cfg.delay_for_attempt(1, None);
        let d2 = cfg.delay_for_attempt(2, None);

        assert!(d0.as_millis() >= 800 && d0.as_millis() <= 1200);
        assert!(d1.as_millis() >= 1600 && d1.as_millis() <= 2400);
        assert!(d2.as_millis() >= 3200 && d2.as_millis() <= 4800);
    }

    #[test]
    fn test_delay_without_jitter_is_exact() {
        let cfg = RetryConfig {
            jitter_fraction: 0.0,
            ..Default::default()
        };
        assert_eq!(cfg.delay_for_attempt(0, None), Duration::from_secs(1));
        assert_eq!(cfg.delay_for_attempt(1, None), Duration::from_secs(2));
        assert_eq!(cfg.delay_for_attempt(2, None), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let cfg = RetryConfig::default();
        let d = cfg.delay_for_attempt(20, None);
        assert!(d.as_millis() <= 36_000);
    }

    #[test]
    fn test_delay_uses_rate_limit_hint() {
        let cfg = RetryConfig::default();
        let d = cfg.delay_for_attempt(0, Some(Duration::from_millis(10_000)));
        assert_eq!(d.as_millis(), 10_100);
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} out of range");
        }
    }

    #[test]
    fn test_from_toml() {
        let cfg = RetryConfig::from(&RetryToml {
            max_retries: 7,
            initial_delay_ms: 250,
            backoff_factor: 3.0,
            max_delay_ms: 9_000,
            jitter_fraction: 4.0,
        });
        assert_eq!(cfg.max_retries, 7);
        assert_eq!(cfg.initial_delay, Duration::from_millis(250));
        assert_eq!(cfg.jitter_fraction, 1.0);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retriable() {
        let sleeper = NoSleep(Mutex::new(Vec::new()));
        let mut calls = 0;
        let result: Result<Retried<()>, _> = with_retry(
            &RetryConfig::default(),
            &sleeper,
            &CancelFlag::new(),
            "test",
            || {
                calls += 1;
                async { Err(transport(false)) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_with_retry_honours_cancel_between_attempts() {
        let sleeper = NoSleep(Mutex::new(Vec::new()));
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let mut calls = 0;
        let result: Result<Retried<()>, _> = with_retry(
            &RetryConfig::default(),
            &sleeper,
            &cancel,
            "test",
            || {
                calls += 1;
                // Operator aborts while the first attempt is in flight.
                flag.cancel();
                async { Err(transport(true)) }
            },
        )
        .await;
        assert!(matches!(result, Err(DebateError::Cancelled)));
        assert_eq!(calls, 1);
    }
}
