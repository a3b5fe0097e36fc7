//! Usage tracking and cost accounting domain
//!
//! Provides the append-only usage record, pricing, and the cost tracker that
//! computes per-provider efficiency over a trailing window.

mod pricing;
mod record;
pub(crate) mod repository;
mod tracker;

pub use pricing::ProviderPricing;
pub use record::{UsageRecord, UsageRecordId};
pub use repository::UsageLog;
pub use tracker::{CostTracker, DEFAULT_COST_WINDOW, ProviderEfficiency};

#[cfg(test)]
pub use repository::mock::MockUsageLog;
