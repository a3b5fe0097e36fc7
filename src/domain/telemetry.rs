//! Discrete telemetry events emitted by the core for external aggregation

use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::domain::resilience::CircuitState;
use crate::domain::usage::UsageRecord;

/// A circuit breaker changed state for one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerTransition {
    pub provider_id: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub consecutive_failures: u32,
}

/// Sink for per-call usage and breaker transition events.
///
/// Called synchronously on the request path; implementations must not block.
#[cfg_attr(test, automock)]
pub trait TelemetrySink: Send + Sync {
    fn usage_recorded(&self, record: &UsageRecord);

    fn breaker_transition(&self, transition: &BreakerTransition);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn usage_recorded(&self, _record: &UsageRecord) {}

    fn breaker_transition(&self, _transition: &BreakerTransition) {}
}
