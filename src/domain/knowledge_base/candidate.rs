use std::cmp::Ordering;

use serde::Serialize;

/// A passage produced by one retrieval call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalCandidate {
    pub document_id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl RetrievalCandidate {
    /// Rerank score when present, otherwise the raw similarity
    pub fn final_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.similarity_score)
    }

    pub fn with_rerank_score(mut self, score: f32) -> Self {
        self.rerank_score = Some(score);
        self
    }

    /// Final score descending, then similarity descending, then id ascending
    pub fn ranking(a: &Self, b: &Self) -> Ordering {
        b.final_score()
            .total_cmp(&a.final_score())
            .then_with(|| b.similarity_score.total_cmp(&a.similarity_score))
            .then_with(|| a.document_id.cmp(&b.document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, similarity: f32, rerank: Option<f32>) -> RetrievalCandidate {
        RetrievalCandidate {
            document_id: id.to_string(),
            title: id.to_string(),
            content: String::new(),
            category: None,
            similarity_score: similarity,
            rerank_score: rerank,
        }
    }

    #[test]
    fn test_final_score_prefers_rerank() {
        assert_eq!(candidate("a", 0.7, None).final_score(), 0.7);
        assert_eq!(candidate("a", 0.7, Some(0.2)).final_score(), 0.2);
    }

    #[test]
    fn test_ranking_is_total_and_deterministic() {
        let mut candidates = vec![
            candidate("c", 0.8, Some(0.5)),
            candidate("b", 0.9, Some(0.5)),
            candidate("a", 0.9, Some(0.5)),
            candidate("d", 0.6, Some(0.9)),
        ];
        candidates.sort_by(RetrievalCandidate::ranking);

        let ids: Vec<_> = candidates.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a", "b", "c"]);
    }
}
