//! Usage log trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::UsageRecord;
use crate::domain::DomainError;

/// Append-only store of usage records.
///
/// Implementations never mutate or delete a record once appended.
#[async_trait]
pub trait UsageLog: Send + Sync + Debug {
    /// Append a record
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError>;

    /// Every record in append order
    async fn all(&self) -> Result<Vec<UsageRecord>, DomainError>;

    /// Records for one provider in append order
    async fn for_provider(&self, provider_id: &str) -> Result<Vec<UsageRecord>, DomainError>;

    /// The most recent `limit` records for one provider, oldest first
    async fn recent(&self, provider_id: &str, limit: usize)
    -> Result<Vec<UsageRecord>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockUsageLog {
        records: RwLock<Vec<UsageRecord>>,
        fail_appends: bool,
    }

    impl MockUsageLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                records: RwLock::new(Vec::new()),
                fail_appends: true,
            }
        }
    }

    #[async_trait]
    impl UsageLog for MockUsageLog {
        async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
            if self.fail_appends {
                return Err(DomainError::internal("usage log unavailable"));
            }

            self.records.write().unwrap().push(record);
            Ok(())
        }

        async fn all(&self) -> Result<Vec<UsageRecord>, DomainError> {
            Ok(self.records.read().unwrap().clone())
        }

        async fn for_provider(&self, provider_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.provider_id() == provider_id)
                .cloned()
                .collect())
        }

        async fn recent(
            &self,
            provider_id: &str,
            limit: usize,
        ) -> Result<Vec<UsageRecord>, DomainError> {
            let records = self.for_provider(provider_id).await?;
            let skip = records.len().saturating_sub(limit);
            Ok(records.into_iter().skip(skip).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockUsageLog;
    use super::*;
    use crate::domain::ProviderErrorKind;

    #[tokio::test]
    async fn test_mock_usage_log_recent_window() {
        let log = MockUsageLog::new();

        for i in 0..5 {
            log.append(UsageRecord::success("openai", "gpt-4o", i, 0, 0, 10))
                .await
                .unwrap();
        }
        log.append(UsageRecord::failure("claude", "sonnet", ProviderErrorKind::Timeout, 5))
            .await
            .unwrap();

        let recent = log.recent("openai", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tokens_in(), 3);
        assert_eq!(recent[1].tokens_in(), 4);
        assert_eq!(log.all().await.unwrap().len(), 6);
    }
}
