//! In-memory usage log

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::usage::{UsageLog, UsageRecord};

/// Append-only log keeping one record list per provider behind a single lock.
///
/// A global sequence number keeps cross-provider append order for `all`.
#[derive(Debug, Default)]
pub struct InMemoryUsageLog {
    shards: RwLock<HashMap<String, Vec<(u64, UsageRecord)>>>,
    sequence: AtomicU64,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> DomainError {
    DomainError::internal(format!("Usage log lock poisoned: {}", e))
}

#[async_trait]
impl UsageLog for InMemoryUsageLog {
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
        let mut shards = self.shards.write().map_err(poisoned)?;
        // Taken under the write lock so sequence order matches append order
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        shards
            .entry(record.provider_id().to_string())
            .or_default()
            .push((seq, record));

        Ok(())
    }

    async fn all(&self) -> Result<Vec<UsageRecord>, DomainError> {
        let shards = self.shards.read().map_err(poisoned)?;

        let mut entries: Vec<&(u64, UsageRecord)> = shards.values().flatten().collect();
        entries.sort_by_key(|(seq, _)| *seq);

        Ok(entries.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn for_provider(&self, provider_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        let shards = self.shards.read().map_err(poisoned)?;

        Ok(shards
            .get(provider_id)
            .map(|shard| shard.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn recent(
        &self,
        provider_id: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let shards = self.shards.read().map_err(poisoned)?;

        Ok(shards
            .get(provider_id)
            .map(|shard| {
                let start = shard.len().saturating_sub(limit);
                shard[start..].iter().map(|(_, r)| r.clone()).collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderErrorKind;
    use std::sync::Arc;

    fn success(provider: &str, cost: i64) -> UsageRecord {
        UsageRecord::success(provider, "model", 10, 5, cost, 100)
    }

    #[tokio::test]
    async fn test_all_preserves_cross_provider_order() {
        let log = InMemoryUsageLog::new();
        log.append(success("a", 1)).await.unwrap();
        log.append(UsageRecord::failure("b", "model", ProviderErrorKind::Timeout, 30_000))
            .await
            .unwrap();
        log.append(success("a", 2)).await.unwrap();

        let providers: Vec<_> = log
            .all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.provider_id().to_string())
            .collect();
        assert_eq!(providers, vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_recent_returns_tail_oldest_first() {
        let log = InMemoryUsageLog::new();
        for cost in 1..=5 {
            log.append(success("a", cost)).await.unwrap();
        }

        let recent: Vec<_> = log
            .recent("a", 2)
            .await
            .unwrap()
            .iter()
            .map(UsageRecord::cost_micros)
            .collect();
        assert_eq!(recent, vec![4, 5]);
        assert_eq!(log.recent("a", 50).await.unwrap().len(), 5);
        assert!(log.recent("unknown", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_provider_filters() {
        let log = InMemoryUsageLog::new();
        log.append(success("a", 1)).await.unwrap();
        log.append(success("b", 2)).await.unwrap();

        let b = log.for_provider("b").await.unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].cost_micros(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let log = Arc::new(InMemoryUsageLog::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        let provider = if i % 2 == 0 { "a" } else { "b" };
                        log.append(success(provider, 1)).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(log.all().await.unwrap().len(), 200);
        assert_eq!(log.for_provider("a").await.unwrap().len(), 100);
    }
}
