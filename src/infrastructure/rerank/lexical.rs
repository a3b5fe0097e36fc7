use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::rerank::{Reranker, blend};
use crate::infrastructure::embedding::terms;

/// Terms this short carry no signal ("a", "is", "to")
const MIN_TERM_LEN: usize = 3;

/// Blends similarity with the share of query terms found in the passage
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    similarity_weight: f32,
}

impl LexicalReranker {
    pub fn new(similarity_weight: f32) -> Self {
        Self {
            similarity_weight: similarity_weight.clamp(0.0, 1.0),
        }
    }

    fn query_terms(query: &str) -> HashSet<String> {
        terms(query)
            .into_iter()
            .filter(|t| t.chars().count() >= MIN_TERM_LEN)
            .collect()
    }

    /// Fraction of query terms present in title or content
    fn coverage(query_terms: &HashSet<String>, candidate: &RetrievalCandidate) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }

        let passage: HashSet<String> = terms(&candidate.title)
            .into_iter()
            .chain(terms(&candidate.content))
            .collect();

        let hits = query_terms.iter().filter(|t| passage.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalCandidate>,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        let query_terms = Self::query_terms(query);

        Ok(candidates
            .into_iter()
            .map(|c| {
                let relevance = Self::coverage(&query_terms, &c);
                let score = blend(c.similarity_score, relevance, self.similarity_weight);
                c.with_rerank_score(score)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, content: &str, similarity: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            document_id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: None,
            similarity_score: similarity,
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn test_term_coverage_reorders_close_candidates() {
        let reranker = LexicalReranker::new(0.5);

        let mut ranked = reranker
            .rerank(
                "how long do refunds take",
                vec![
                    candidate("kb-1", "Shipping", "Orders ship within a day.", 0.72),
                    candidate("kb-2", "Refunds", "Refunds take five business days.", 0.70),
                ],
            )
            .await
            .unwrap();
        ranked.sort_by(RetrievalCandidate::ranking);

        assert_eq!(ranked[0].document_id, "kb-2");
        // query terms: how, long, refunds, take -> refunds, take matched
        assert!((ranked[0].rerank_score.unwrap() - (0.5 * 0.70 + 0.5 * 0.5)).abs() < 1e-6);
        assert!((ranked[1].rerank_score.unwrap() - 0.36).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_full_similarity_weight_keeps_similarity() {
        let reranker = LexicalReranker::new(1.0);

        let ranked = reranker
            .rerank("refunds", vec![candidate("kb-1", "Other", "nothing", 0.65)])
            .await
            .unwrap();

        assert!((ranked[0].final_score() - 0.65).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stopword_only_query_scores_zero_coverage() {
        let reranker = LexicalReranker::new(0.0);

        let ranked = reranker
            .rerank("is it", vec![candidate("kb-1", "It is", "it is", 0.9)])
            .await
            .unwrap();

        assert_eq!(ranked[0].rerank_score, Some(0.0));
    }
}
