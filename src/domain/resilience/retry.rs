//! Bounded retry with exponential backoff and full jitter

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CircuitBreaker, Clock, JitterSource};
use crate::domain::ProviderError;

/// Backoff shape shared by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff window before the first retry
    pub base_delay_ms: u64,
    /// Upper bound on any backoff window
    pub max_delay_ms: u64,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
    /// Draw the actual delay uniformly from `[0, window)`
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_base_delay(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff window before retry number `retry` (0-based)
    pub fn window_for_retry(&self, retry: u32) -> Duration {
        let window = self.base_delay_ms as f64 * self.backoff_multiplier.powi(retry as i32);
        let window_ms = window.min(self.max_delay_ms as f64).max(0.0) as u64;

        Duration::from_millis(window_ms)
    }
}

/// Which provider is being called and how much room the call has
#[derive(Debug, Clone, Copy)]
pub struct RetryScope<'a> {
    pub provider_id: &'a str,
    pub breaker: &'a CircuitBreaker,
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Per-attempt transport timeout
    pub attempt_timeout: Duration,
    /// Request-wide deadline covering every attempt and backoff
    pub deadline: Instant,
}

/// Value produced by a successful attempt
#[derive(Debug)]
pub struct RetrySuccess<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why a retried call gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The breaker refused the first attempt; nothing was sent
    CircuitOpen,
    /// Permanent failure, retries exhausted, or the breaker stopped admitting
    Failed { error: ProviderError, attempts: u32 },
    /// The request deadline left no room for another attempt
    DeadlineExceeded {
        last_error: Option<ProviderError>,
        attempts: u32,
    },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen => 0,
            Self::Failed { attempts, .. } | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }
}

/// Wraps single provider calls with bounded retries.
///
/// Each attempt is gated by the breaker and reports its outcome to it.
/// Only transient failures are retried.
pub struct RetryPolicy {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, clock: Arc<dyn Clock>, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            config,
            clock,
            jitter,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Actual delay before retry number `retry` (0-based), jitter applied
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let window = self.config.window_for_retry(retry);

        if self.config.jitter {
            let fraction = self.jitter.fraction().clamp(0.0, 1.0);
            window.mul_f64(fraction)
        } else {
            window
        }
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// retries, is refused by the breaker, or the deadline leaves no room.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(
        &self,
        scope: RetryScope<'_>,
        mut operation: F,
    ) -> Result<RetrySuccess<T>, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let provider = scope.provider_id;
        let mut attempts = 0u32;
        let mut last_error: Option<ProviderError> = None;

        loop {
            let now = self.clock.now();
            if now >= scope.deadline {
                return Err(RetryError::DeadlineExceeded {
                    last_error,
                    attempts,
                });
            }

            if !scope.breaker.allow(provider) {
                debug!(provider = %provider, attempts, "Circuit breaker refused attempt");
                return Err(match last_error {
                    Some(error) => RetryError::Failed { error, attempts },
                    None => RetryError::CircuitOpen,
                });
            }

            attempts += 1;
            let remaining = scope.deadline.saturating_duration_since(now);
            let deadline_bound = remaining < scope.attempt_timeout;
            let budget = scope.attempt_timeout.min(remaining);

            match tokio::time::timeout(budget, operation(attempts)).await {
                Ok(Ok(value)) => {
                    scope.breaker.record_success(provider);
                    return Ok(RetrySuccess { value, attempts });
                }
                Ok(Err(error)) => {
                    scope.breaker.record_failure(provider);
                    debug!(
                        provider = %provider,
                        attempt = attempts,
                        kind = %error.kind,
                        error = %error.message,
                        "Provider attempt failed"
                    );

                    if !error.is_transient() {
                        return Err(RetryError::Failed { error, attempts });
                    }
                    last_error = Some(error);
                }
                Err(_) if deadline_bound => {
                    // The request ran out of time, not the provider
                    return Err(RetryError::DeadlineExceeded {
                        last_error: Some(ProviderError::timeout(
                            provider,
                            format!("Request deadline reached after {}ms", budget.as_millis()),
                        )),
                        attempts,
                    });
                }
                Err(_) => {
                    scope.breaker.record_failure(provider);
                    last_error = Some(ProviderError::timeout(
                        provider,
                        format!("Request timed out after {}ms", budget.as_millis()),
                    ));
                }
            }

            if attempts > scope.max_retries {
                let error = last_error.unwrap_or_else(|| {
                    ProviderError::unavailable(provider, "retries exhausted")
                });
                return Err(RetryError::Failed { error, attempts });
            }

            let delay = self.delay_for_attempt(attempts - 1);
            if self.clock.now() + delay >= scope.deadline {
                return Err(RetryError::DeadlineExceeded {
                    last_error,
                    attempts,
                });
            }

            debug!(
                provider = %provider,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );
            self.clock.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderErrorKind;
    use crate::domain::resilience::clock::mock::{FixedJitter, ManualClock};
    use crate::domain::resilience::{BreakerSettings, CircuitState};
    use crate::domain::telemetry::NoopTelemetrySink;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        clock: Arc<ManualClock>,
        breaker: CircuitBreaker,
        policy: RetryPolicy,
    }

    fn harness(threshold: u32, jitter: f64) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new(clock.clone(), Arc::new(NoopTelemetrySink)).with_provider(
            "openai",
            BreakerSettings {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(30),
            },
        );
        let policy = RetryPolicy::new(
            RetryConfig::default(),
            clock.clone(),
            Arc::new(FixedJitter(jitter)),
        );

        Harness {
            clock,
            breaker,
            policy,
        }
    }

    impl Harness {
        fn scope(&self, max_retries: u32) -> RetryScope<'_> {
            RetryScope {
                provider_id: "openai",
                breaker: &self.breaker,
                max_retries,
                attempt_timeout: Duration::from_secs(30),
                deadline: self.clock.now() + Duration::from_secs(600),
            }
        }
    }

    fn transient() -> ProviderError {
        ProviderError::new("openai", ProviderErrorKind::RateLimited, "429")
    }

    #[test]
    fn test_backoff_window_growth_and_cap() {
        let config = RetryConfig::default().with_base_delay(100).with_max_delay(1000);

        assert_eq!(config.window_for_retry(0), Duration::from_millis(100));
        assert_eq!(config.window_for_retry(1), Duration::from_millis(200));
        assert_eq!(config.window_for_retry(3), Duration::from_millis(800));
        assert_eq!(config.window_for_retry(4), Duration::from_millis(1000));
        assert_eq!(config.window_for_retry(20), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_applies_full_jitter() {
        let h = harness(10, 0.25);
        assert_eq!(h.policy.delay_for_attempt(0), Duration::from_millis(25));
        assert_eq!(h.policy.delay_for_attempt(2), Duration::from_millis(100));

        let no_jitter = RetryPolicy::new(
            RetryConfig::default().with_jitter(false),
            h.clock.clone(),
            Arc::new(FixedJitter(0.25)),
        );
        assert_eq!(no_jitter.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let h = harness(10, 0.5);
        let calls = AtomicU32::new(0);

        let result = h
            .policy
            .execute(h.scope(3), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(transient()) } else { Ok("answer") } }
            })
            .await
            .unwrap();

        assert_eq!(result.value, "answer");
        assert_eq!(result.attempts, 3);
        assert_eq!(
            h.clock.sleeps(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
        assert_eq!(h.breaker.snapshot("openai").unwrap().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let h = harness(10, 0.5);
        let calls = AtomicU32::new(0);

        let err = h
            .policy
            .execute(h.scope(5), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ProviderError::new(
                        "openai",
                        ProviderErrorKind::Authentication,
                        "invalid api key",
                    ))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            RetryError::Failed { ref error, attempts: 1 } if error.kind == ProviderErrorKind::Authentication
        ));
        assert!(h.clock.sleeps().is_empty());
        assert_eq!(h.breaker.snapshot("openai").unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let h = harness(10, 0.5);
        let calls = AtomicU32::new(0);

        let err = h
            .policy
            .execute(h.scope(2), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), 3);
        assert_eq!(h.breaker.snapshot("openai").unwrap().consecutive_failures, 3);
    }

    #[tokio::test]
    async fn test_open_breaker_refuses_without_calling() {
        let h = harness(1, 0.5);
        h.breaker.record_failure("openai");
        let calls = AtomicU32::new(0);

        let err = h
            .policy
            .execute(h.scope(3), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert_eq!(err, RetryError::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stops_retrying_once_breaker_opens() {
        let h = harness(2, 0.0);
        let calls = AtomicU32::new(0);

        let err = h
            .policy
            .execute(h.scope(5), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, RetryError::Failed { attempts: 2, .. }));
        assert_eq!(h.breaker.state("openai"), Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn test_backoff_past_deadline_reports_deadline() {
        let h = harness(10, 1.0);
        let scope = RetryScope {
            deadline: h.clock.now() + Duration::from_millis(150),
            ..h.scope(5)
        };

        let err = h
            .policy
            .execute(scope, |_| async { Err::<(), _>(transient()) })
            .await
            .unwrap_err();

        // 100ms after attempt one fits; 200ms after attempt two does not
        assert!(matches!(
            err,
            RetryError::DeadlineExceeded { last_error: Some(_), attempts: 2 }
        ));
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_transient() {
        let h = harness(10, 0.0);
        let scope = RetryScope {
            attempt_timeout: Duration::from_millis(20),
            ..h.scope(1)
        };
        let calls = AtomicU32::new(0);

        let result = h
            .policy
            .execute(scope, |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, ProviderError>(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(result.value, 1);
        assert_eq!(result.attempts, 2);
    }
}
