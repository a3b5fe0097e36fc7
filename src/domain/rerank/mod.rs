//! Reranking domain
//!
//! A reranker recomputes a finer-grained relevance score for a small
//! candidate pool. How that score combines with the raw similarity is the
//! strategy's business; the pipeline only sorts by the final score.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::knowledge_base::RetrievalCandidate;

/// Second-pass relevance scorer
#[async_trait]
pub trait Reranker: Send + Sync + Debug {
    /// Score the candidates against the query.
    ///
    /// Returns every input candidate; those that could be scored carry a
    /// `rerank_score`. Output order is not significant.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalCandidate>,
    ) -> Result<Vec<RetrievalCandidate>, DomainError>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Weighted blend of raw similarity and a strategy's relevance, both in `[0, 1]`
pub fn blend(similarity: f32, relevance: f32, similarity_weight: f32) -> f32 {
    let weight = similarity_weight.clamp(0.0, 1.0);
    (weight * similarity + (1.0 - weight) * relevance).clamp(0.0, 1.0)
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reranker assigning fixed scores by document id
    #[derive(Debug, Default)]
    pub struct MockReranker {
        scores: HashMap<String, f32>,
        error: Option<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockReranker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_score(mut self, document_id: impl Into<String>, score: f32) -> Self {
            self.scores.insert(document_id.into(), score);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Reranker for MockReranker {
        async fn rerank(
            &self,
            _query: &str,
            candidates: Vec<RetrievalCandidate>,
        ) -> Result<Vec<RetrievalCandidate>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(ref error) = self.error {
                return Err(DomainError::internal(error.clone()));
            }

            Ok(candidates
                .into_iter()
                .map(|c| match self.scores.get(&c.document_id) {
                    Some(score) => c.with_rerank_score(*score),
                    None => c,
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }
}
