use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::rerank::Reranker;

/// Leaves candidates unscored so ranking falls back to raw similarity
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<RetrievalCandidate>,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
