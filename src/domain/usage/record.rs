//! Usage record entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ProviderErrorKind;

/// Unique identifier for a usage record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageRecordId(String);

impl UsageRecordId {
    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("usage-{}", uuid::Uuid::new_v4()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UsageRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one provider candidate within a generation request.
///
/// Records are immutable once built; the log only ever appends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    id: UsageRecordId,
    provider_id: String,
    model: String,
    tokens_in: u32,
    tokens_out: u32,
    cost_micros: i64,
    latency_ms: u64,
    succeeded: bool,
    attempts: u32,
    error_kind: Option<ProviderErrorKind>,
    timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Successful call with token accounting
    pub fn success(
        provider_id: impl Into<String>,
        model: impl Into<String>,
        tokens_in: u32,
        tokens_out: u32,
        cost_micros: i64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: UsageRecordId::generate(),
            provider_id: provider_id.into(),
            model: model.into(),
            tokens_in,
            tokens_out,
            cost_micros,
            latency_ms,
            succeeded: true,
            attempts: 1,
            error_kind: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed candidate; no tokens are billed
    pub fn failure(
        provider_id: impl Into<String>,
        model: impl Into<String>,
        kind: ProviderErrorKind,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: UsageRecordId::generate(),
            provider_id: provider_id.into(),
            model: model.into(),
            tokens_in: 0,
            tokens_out: 0,
            cost_micros: 0,
            latency_ms,
            succeeded: false,
            attempts: 1,
            error_kind: Some(kind),
            timestamp: Utc::now(),
        }
    }

    /// Number of attempts the retry loop spent on this candidate
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn id(&self) -> &UsageRecordId {
        &self.id
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tokens_in(&self) -> u32 {
        self.tokens_in
    }

    pub fn tokens_out(&self) -> u32 {
        self.tokens_out
    }

    pub fn cost_micros(&self) -> i64 {
        self.cost_micros
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error_kind(&self) -> Option<ProviderErrorKind> {
        self.error_kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_record_id_generation() {
        let id1 = UsageRecordId::generate();
        let id2 = UsageRecordId::generate();

        assert!(id1.as_str().starts_with("usage-"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_success_record() {
        let record = UsageRecord::success("openai", "gpt-4o", 120, 80, 1_100, 340);

        assert!(record.succeeded());
        assert_eq!(record.provider_id(), "openai");
        assert_eq!(record.tokens_in(), 120);
        assert_eq!(record.tokens_out(), 80);
        assert_eq!(record.cost_micros(), 1_100);
        assert_eq!(record.attempts(), 1);
        assert!(record.error_kind().is_none());
    }

    #[test]
    fn test_failure_record() {
        let record = UsageRecord::failure("claude", "claude-3-5-sonnet", ProviderErrorKind::Timeout, 30_000)
            .with_attempts(3);

        assert!(!record.succeeded());
        assert_eq!(record.cost_micros(), 0);
        assert_eq!(record.attempts(), 3);
        assert_eq!(record.error_kind(), Some(ProviderErrorKind::Timeout));
    }
}
