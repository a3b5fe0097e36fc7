//! Cost and latency accounting per provider

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{UsageLog, UsageRecord};
use crate::domain::DomainError;
use crate::domain::telemetry::TelemetrySink;

/// Default number of trailing records considered for efficiency
pub const DEFAULT_COST_WINDOW: usize = 50;

/// Running efficiency of a provider over the trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEfficiency {
    pub provider_id: String,
    pub calls: usize,
    pub successes: usize,
    pub total_cost_micros: i64,
    /// `None` until the provider has at least one success in the window
    pub cost_per_success_micros: Option<i64>,
    pub avg_latency_ms: f64,
}

impl ProviderEfficiency {
    fn from_window(provider_id: &str, records: &[UsageRecord]) -> Self {
        let calls = records.len();
        let successes = records.iter().filter(|r| r.succeeded()).count();
        let total_cost_micros: i64 = records.iter().map(UsageRecord::cost_micros).sum();
        let total_latency: u64 = records.iter().map(UsageRecord::latency_ms).sum();

        Self {
            provider_id: provider_id.to_string(),
            calls,
            successes,
            total_cost_micros,
            cost_per_success_micros: (successes > 0)
                .then(|| total_cost_micros / successes as i64),
            avg_latency_ms: if calls == 0 {
                0.0
            } else {
                total_latency as f64 / calls as f64
            },
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.successes as f64 / self.calls as f64
        }
    }
}

/// Records usage and answers cost-efficiency queries
pub struct CostTracker {
    log: Arc<dyn UsageLog>,
    telemetry: Arc<dyn TelemetrySink>,
    window: usize,
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("log", &self.log)
            .field("window", &self.window)
            .finish()
    }
}

impl CostTracker {
    pub fn new(log: Arc<dyn UsageLog>, telemetry: Arc<dyn TelemetrySink>, window: usize) -> Self {
        Self {
            log,
            telemetry,
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Append a record and emit it as a telemetry event.
    ///
    /// A failing log is reported but never fails the generation that produced the record.
    pub async fn record(&self, record: UsageRecord) {
        debug!(
            provider = %record.provider_id(),
            succeeded = record.succeeded(),
            tokens_in = record.tokens_in(),
            tokens_out = record.tokens_out(),
            latency_ms = record.latency_ms(),
            "Recording usage"
        );

        self.telemetry.usage_recorded(&record);

        let provider = record.provider_id().to_string();
        if let Err(e) = self.log.append(record).await {
            warn!(provider = %provider, error = %e, "Failed to append usage record");
        }
    }

    pub async fn records(&self) -> Result<Vec<UsageRecord>, DomainError> {
        self.log.all().await
    }

    pub async fn records_for(&self, provider_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        self.log.for_provider(provider_id).await
    }

    /// Efficiency over the trailing window for one provider
    pub async fn efficiency(&self, provider_id: &str) -> Result<ProviderEfficiency, DomainError> {
        let records = self.log.recent(provider_id, self.window).await?;
        Ok(ProviderEfficiency::from_window(provider_id, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderErrorKind;
    use crate::domain::telemetry::{MockTelemetrySink, NoopTelemetrySink};
    use crate::domain::usage::repository::mock::MockUsageLog;

    fn tracker(window: usize) -> CostTracker {
        CostTracker::new(Arc::new(MockUsageLog::new()), Arc::new(NoopTelemetrySink), window)
    }

    #[tokio::test]
    async fn test_efficiency_without_records() {
        let tracker = tracker(10);
        let efficiency = tracker.efficiency("openai").await.unwrap();

        assert_eq!(efficiency.calls, 0);
        assert_eq!(efficiency.cost_per_success_micros, None);
        assert_eq!(efficiency.success_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_efficiency_counts_cost_per_success() {
        let tracker = tracker(10);

        tracker
            .record(UsageRecord::success("openai", "gpt-4o", 100, 50, 3_000, 200))
            .await;
        tracker
            .record(UsageRecord::failure("openai", "gpt-4o", ProviderErrorKind::Timeout, 400))
            .await;
        tracker
            .record(UsageRecord::success("openai", "gpt-4o", 100, 50, 1_000, 300))
            .await;

        let efficiency = tracker.efficiency("openai").await.unwrap();
        assert_eq!(efficiency.calls, 3);
        assert_eq!(efficiency.successes, 2);
        assert_eq!(efficiency.total_cost_micros, 4_000);
        assert_eq!(efficiency.cost_per_success_micros, Some(2_000));
        assert!((efficiency.avg_latency_ms - 300.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_efficiency_uses_trailing_window() {
        let tracker = tracker(2);

        tracker
            .record(UsageRecord::success("claude", "sonnet", 0, 0, 90_000, 10))
            .await;
        tracker
            .record(UsageRecord::success("claude", "sonnet", 0, 0, 1_000, 10))
            .await;
        tracker
            .record(UsageRecord::success("claude", "sonnet", 0, 0, 3_000, 10))
            .await;

        let efficiency = tracker.efficiency("claude").await.unwrap();
        assert_eq!(efficiency.calls, 2);
        assert_eq!(efficiency.cost_per_success_micros, Some(2_000));
        assert_eq!(tracker.records_for("claude").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_record_emits_telemetry_even_when_log_fails() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_usage_recorded()
            .withf(|record| record.provider_id() == "openai" && !record.succeeded())
            .times(1)
            .return_const(());

        let tracker = CostTracker::new(Arc::new(MockUsageLog::failing()), Arc::new(sink), 10);

        tracker
            .record(UsageRecord::failure("openai", "gpt-4o", ProviderErrorKind::RateLimited, 5))
            .await;

        assert!(tracker.records().await.unwrap().is_empty());
    }
}
