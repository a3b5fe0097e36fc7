//! Per-provider circuit breaker

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Clock;
use crate::domain::telemetry::{BreakerTransition, TelemetrySink};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for one provider's breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time to keep the breaker open before admitting a trial call
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Breaker state for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderState {
    pub provider_id: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    /// Start of the outstanding HALF_OPEN trial, if one was admitted
    probe_started_at: Option<Instant>,
}

impl ProviderState {
    fn new(provider_id: String) -> Self {
        Self {
            provider_id,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_started_at: None,
        }
    }

    fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        self.opened_at
            .is_none_or(|opened| now.saturating_duration_since(opened) >= cooldown)
    }

    /// A trial lease is free when none was handed out or the holder never reported back
    fn probe_free(&self, now: Instant, cooldown: Duration) -> bool {
        self.probe_started_at
            .is_none_or(|started| now.saturating_duration_since(started) >= cooldown)
    }

    fn move_to(&mut self, to: CircuitState) -> BreakerTransition {
        let from = self.state;
        self.state = to;

        BreakerTransition {
            provider_id: self.provider_id.clone(),
            from,
            to,
            consecutive_failures: self.consecutive_failures,
        }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    settings: BreakerSettings,
    state: Mutex<ProviderState>,
}

impl BreakerEntry {
    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Failure-state machine gating calls to each configured provider.
///
/// Every provider owns its own mutex so admission and transition happen
/// atomically per provider without serializing unrelated providers.
pub struct CircuitBreaker {
    entries: HashMap<String, BreakerEntry>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("providers", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
            telemetry,
        }
    }

    /// Register a provider in the CLOSED state
    pub fn with_provider(mut self, provider_id: impl Into<String>, settings: BreakerSettings) -> Self {
        let provider_id = provider_id.into();
        let settings = BreakerSettings {
            failure_threshold: settings.failure_threshold.max(1),
            ..settings
        };

        self.entries.insert(
            provider_id.clone(),
            BreakerEntry {
                settings,
                state: Mutex::new(ProviderState::new(provider_id)),
            },
        );
        self
    }

    /// Admission decision for one call. OPEN → HALF_OPEN happens here once the
    /// cooldown has elapsed, and only one caller receives the trial lease.
    pub fn allow(&self, provider_id: &str) -> bool {
        let Some(entry) = self.entries.get(provider_id) else {
            warn!(provider = %provider_id, "Circuit breaker check for unknown provider");
            return false;
        };

        let now = self.clock.now();
        let cooldown = entry.settings.cooldown;

        let (allowed, transition) = {
            let mut state = entry.lock();

            match state.state {
                CircuitState::Closed => (true, None),
                CircuitState::Open => {
                    if state.cooldown_elapsed(now, cooldown) {
                        state.probe_started_at = Some(now);
                        (true, Some(state.move_to(CircuitState::HalfOpen)))
                    } else {
                        (false, None)
                    }
                }
                CircuitState::HalfOpen => {
                    if state.probe_free(now, cooldown) {
                        state.probe_started_at = Some(now);
                        (true, None)
                    } else {
                        (false, None)
                    }
                }
            }
        };

        if let Some(transition) = transition {
            self.emit(&transition);
        }

        allowed
    }

    /// Non-mutating view of whether `allow` would currently admit a call
    pub fn is_available(&self, provider_id: &str) -> bool {
        let Some(entry) = self.entries.get(provider_id) else {
            return false;
        };

        let now = self.clock.now();
        let cooldown = entry.settings.cooldown;
        let state = entry.lock();

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => state.cooldown_elapsed(now, cooldown),
            CircuitState::HalfOpen => state.probe_free(now, cooldown),
        }
    }

    pub fn record_success(&self, provider_id: &str) {
        let Some(entry) = self.entries.get(provider_id) else {
            return;
        };

        let transition = {
            let mut state = entry.lock();

            match state.state {
                CircuitState::Closed => {
                    state.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    state.consecutive_failures = 0;
                    state.opened_at = None;
                    state.probe_started_at = None;
                    Some(state.move_to(CircuitState::Closed))
                }
                // A call admitted before the breaker opened finished late
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.emit(&transition);
        }
    }

    pub fn record_failure(&self, provider_id: &str) {
        let Some(entry) = self.entries.get(provider_id) else {
            return;
        };

        let now = self.clock.now();
        let threshold = entry.settings.failure_threshold;

        let transition = {
            let mut state = entry.lock();
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);

            match state.state {
                CircuitState::Closed if state.consecutive_failures >= threshold => {
                    state.opened_at = Some(now);
                    Some(state.move_to(CircuitState::Open))
                }
                CircuitState::Closed => None,
                CircuitState::HalfOpen => {
                    state.opened_at = Some(now);
                    state.probe_started_at = None;
                    Some(state.move_to(CircuitState::Open))
                }
                // Late failure from a call admitted earlier; the cooldown clock is not reset
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.emit(&transition);
        }
    }

    /// Current stored state, without applying any pending cooldown transition
    pub fn state(&self, provider_id: &str) -> Option<CircuitState> {
        self.entries.get(provider_id).map(|e| e.lock().state)
    }

    pub fn snapshot(&self, provider_id: &str) -> Option<ProviderState> {
        self.entries.get(provider_id).map(|e| e.lock().clone())
    }

    pub fn settings(&self, provider_id: &str) -> Option<BreakerSettings> {
        self.entries.get(provider_id).map(|e| e.settings)
    }

    fn emit(&self, transition: &BreakerTransition) {
        if transition.to == CircuitState::Open {
            warn!(
                provider = %transition.provider_id,
                from = %transition.from,
                to = %transition.to,
                consecutive_failures = transition.consecutive_failures,
                "Circuit breaker opened"
            );
        } else {
            info!(
                provider = %transition.provider_id,
                from = %transition.from,
                to = %transition.to,
                "Circuit breaker state changed"
            );
        }

        self.telemetry.breaker_transition(transition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resilience::clock::mock::ManualClock;
    use crate::domain::telemetry::{MockTelemetrySink, NoopTelemetrySink};

    const COOLDOWN: Duration = Duration::from_secs(30);

    fn breaker(threshold: u32) -> (Arc<ManualClock>, CircuitBreaker) {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new(clock.clone(), Arc::new(NoopTelemetrySink)).with_provider(
            "openai",
            BreakerSettings {
                failure_threshold: threshold,
                cooldown: COOLDOWN,
            },
        );
        (clock, breaker)
    }

    #[test]
    fn test_opens_after_exactly_threshold_failures() {
        let (_, breaker) = breaker(3);

        breaker.record_failure("openai");
        breaker.record_failure("openai");
        assert!(breaker.allow("openai"));
        assert_eq!(breaker.state("openai"), Some(CircuitState::Closed));

        breaker.record_failure("openai");
        assert_eq!(breaker.state("openai"), Some(CircuitState::Open));
        assert!(!breaker.allow("openai"));
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (_, breaker) = breaker(2);

        breaker.record_failure("openai");
        breaker.record_success("openai");
        breaker.record_failure("openai");

        assert_eq!(breaker.state("openai"), Some(CircuitState::Closed));
        assert_eq!(breaker.snapshot("openai").unwrap().consecutive_failures, 1);
    }

    #[test]
    fn test_stays_open_until_cooldown_elapses() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");

        clock.advance(COOLDOWN - Duration::from_millis(1));
        assert!(!breaker.allow("openai"));

        clock.advance(Duration::from_millis(1));
        assert!(breaker.allow("openai"));
        assert_eq!(breaker.state("openai"), Some(CircuitState::HalfOpen));
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");
        clock.advance(COOLDOWN);

        assert!(breaker.allow("openai"));
        assert!(!breaker.allow("openai"));
        assert!(!breaker.allow("openai"));
    }

    #[test]
    fn test_half_open_success_closes() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");
        clock.advance(COOLDOWN);
        assert!(breaker.allow("openai"));

        breaker.record_success("openai");

        let snapshot = breaker.snapshot("openai").unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.opened_at.is_none());
        assert!(breaker.allow("openai"));
        assert!(breaker.allow("openai"));
    }

    #[test]
    fn test_failed_trial_reopens_and_resets_cooldown() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");
        clock.advance(COOLDOWN);
        assert!(breaker.allow("openai"));

        clock.advance(Duration::from_secs(5));
        breaker.record_failure("openai");
        assert_eq!(breaker.state("openai"), Some(CircuitState::Open));

        clock.advance(COOLDOWN - Duration::from_millis(1));
        assert!(!breaker.allow("openai"));

        clock.advance(Duration::from_millis(1));
        assert!(breaker.allow("openai"));
    }

    #[test]
    fn test_abandoned_trial_lease_expires() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");
        clock.advance(COOLDOWN);
        assert!(breaker.allow("openai"));

        clock.advance(COOLDOWN - Duration::from_millis(1));
        assert!(!breaker.allow("openai"));

        clock.advance(Duration::from_millis(1));
        assert!(breaker.allow("openai"));
        assert_eq!(breaker.state("openai"), Some(CircuitState::HalfOpen));
    }

    #[test]
    fn test_late_outcomes_while_open_do_not_close_or_extend() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");

        breaker.record_success("openai");
        assert_eq!(breaker.state("openai"), Some(CircuitState::Open));

        clock.advance(Duration::from_secs(10));
        breaker.record_failure("openai");
        clock.advance(COOLDOWN - Duration::from_secs(10));
        assert!(breaker.allow("openai"));
    }

    #[test]
    fn test_is_available_does_not_transition() {
        let (clock, breaker) = breaker(1);
        breaker.record_failure("openai");
        assert!(!breaker.is_available("openai"));

        clock.advance(COOLDOWN);
        assert!(breaker.is_available("openai"));
        assert!(breaker.is_available("openai"));
        assert_eq!(breaker.state("openai"), Some(CircuitState::Open));
    }

    #[test]
    fn test_unknown_provider_is_never_allowed() {
        let (_, breaker) = breaker(1);
        assert!(!breaker.allow("bedrock"));
        assert!(!breaker.is_available("bedrock"));
        assert_eq!(breaker.state("bedrock"), None);
    }

    #[test]
    fn test_transitions_are_emitted() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_breaker_transition()
            .withf(|t| t.from == CircuitState::Closed && t.to == CircuitState::Open)
            .times(1)
            .return_const(());
        sink.expect_breaker_transition()
            .withf(|t| t.from == CircuitState::Open && t.to == CircuitState::HalfOpen)
            .times(1)
            .return_const(());
        sink.expect_breaker_transition()
            .withf(|t| t.from == CircuitState::HalfOpen && t.to == CircuitState::Closed)
            .times(1)
            .return_const(());

        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new(clock.clone(), Arc::new(sink))
            .with_provider("claude", BreakerSettings { failure_threshold: 2, cooldown: COOLDOWN });

        breaker.record_failure("claude");
        breaker.record_failure("claude");
        clock.advance(COOLDOWN);
        assert!(breaker.allow("claude"));
        breaker.record_success("claude");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_receive_single_trial() {
        let (clock, breaker) = breaker(1);
        let breaker = Arc::new(breaker);
        breaker.record_failure("openai");
        clock.advance(COOLDOWN);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let breaker = breaker.clone();
                tokio::spawn(async move { breaker.allow("openai") })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_open_once() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_breaker_transition().times(1).return_const(());

        let breaker = Arc::new(
            CircuitBreaker::new(Arc::new(ManualClock::new()), Arc::new(sink))
                .with_provider("openai", BreakerSettings { failure_threshold: 5, cooldown: COOLDOWN }),
        );

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let breaker = breaker.clone();
                tokio::spawn(async move { breaker.record_failure("openai") })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = breaker.snapshot("openai").unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.consecutive_failures, 20);
    }
}
