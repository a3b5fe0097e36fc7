//! Observability infrastructure - Metrics and the telemetry sink

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{MetricsTelemetrySink, PrometheusMetrics, create_metrics_router, init_metrics};
