//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use super::config::MetricsConfig;
use crate::domain::telemetry::{BreakerTransition, TelemetrySink};
use crate::domain::usage::UsageRecord;
use crate::domain::resilience::CircuitState;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("eservice_orchestrator_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.path.clone(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    let path = metrics.path.clone();
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Forwards telemetry events to tracing and the installed metrics recorder.
///
/// Without an installed recorder the metric calls are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetrySink;

impl TelemetrySink for MetricsTelemetrySink {
    fn usage_recorded(&self, record: &UsageRecord) {
        let labels = [
            ("provider", record.provider_id().to_string()),
            ("model", record.model().to_string()),
            (
                "status",
                if record.succeeded() { "success" } else { "error" }.to_string(),
            ),
        ];

        counter!("llm_requests_total", &labels).increment(1);
        histogram!("llm_request_duration_seconds", &labels)
            .record(Duration::from_millis(record.latency_ms()).as_secs_f64());

        if record.succeeded() {
            counter!("llm_input_tokens_total", &labels).increment(u64::from(record.tokens_in()));
            counter!("llm_output_tokens_total", &labels).increment(u64::from(record.tokens_out()));
            counter!("llm_cost_micros_total", &labels)
                .increment(u64::try_from(record.cost_micros()).unwrap_or(0));
        } else if let Some(kind) = record.error_kind() {
            counter!(
                "llm_errors_total",
                "provider" => record.provider_id().to_string(),
                "kind" => kind.as_str()
            )
            .increment(1);
        }

        tracing::debug!(
            target: "telemetry",
            provider = record.provider_id(),
            succeeded = record.succeeded(),
            attempts = record.attempts(),
            latency_ms = record.latency_ms(),
            cost_micros = record.cost_micros(),
            "usage event"
        );
    }

    fn breaker_transition(&self, transition: &BreakerTransition) {
        counter!(
            "circuit_breaker_transitions_total",
            "provider" => transition.provider_id.clone(),
            "from" => transition.from.as_str(),
            "to" => transition.to.as_str()
        )
        .increment(1);

        gauge!("circuit_breaker_open", "provider" => transition.provider_id.clone()).set(
            if transition.to == CircuitState::Closed { 0.0 } else { 1.0 },
        );

        if transition.to == CircuitState::Open {
            warn!(
                target: "telemetry",
                provider = %transition.provider_id,
                consecutive_failures = transition.consecutive_failures,
                "breaker event: opened"
            );
        } else {
            info!(
                target: "telemetry",
                provider = %transition.provider_id,
                from = %transition.from,
                to = %transition.to,
                "breaker event"
            );
        }
    }
}
