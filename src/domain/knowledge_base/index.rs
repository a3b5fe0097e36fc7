//! Vector index trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::{Document, DocumentFilter, DocumentMetadata, RetrievalCandidate};
use crate::domain::DomainError;

/// A document returned by a nearest-neighbour query
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub document_id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub similarity: f32,
}

impl From<Neighbor> for RetrievalCandidate {
    fn from(neighbor: Neighbor) -> Self {
        Self {
            document_id: neighbor.document_id,
            title: neighbor.metadata.title,
            content: neighbor.content,
            category: neighbor.metadata.category,
            similarity_score: neighbor.similarity,
            rerank_score: None,
        }
    }
}

/// Stores embedded documents and answers similarity queries.
///
/// Reads never block on writes; a reader may observe the snapshot that was
/// current when its query started.
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// The `k` most similar documents matching `filter`, most similar first
    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<Neighbor>, DomainError>;

    /// Insert or replace documents by id
    async fn upsert(&self, documents: Vec<Document>) -> Result<(), DomainError>;

    /// Number of indexed documents
    async fn len(&self) -> Result<usize, DomainError>;

    async fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::embedding::cosine_similarity;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Brute-force index that records the `k` of every query
    #[derive(Debug, Default)]
    pub struct MockVectorIndex {
        documents: RwLock<Vec<Document>>,
        queries: RwLock<Vec<usize>>,
        calls: AtomicUsize,
    }

    impl MockVectorIndex {
        pub fn new(documents: Vec<Document>) -> Self {
            Self {
                documents: RwLock::new(documents),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requested_k(&self) -> Vec<usize> {
            self.queries.read().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorIndex for MockVectorIndex {
        async fn nearest(
            &self,
            query: &[f32],
            k: usize,
            filter: &DocumentFilter,
        ) -> Result<Vec<Neighbor>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.write().unwrap().push(k);

            let mut neighbors: Vec<Neighbor> = self
                .documents
                .read()
                .unwrap()
                .iter()
                .filter(|d| filter.matches(&d.metadata))
                .map(|d| Neighbor {
                    document_id: d.id.clone(),
                    content: d.content.clone(),
                    metadata: d.metadata.clone(),
                    similarity: cosine_similarity(query, &d.embedding),
                })
                .collect();

            neighbors.sort_by(|a, b| {
                b.similarity
                    .total_cmp(&a.similarity)
                    .then_with(|| a.document_id.cmp(&b.document_id))
            });
            neighbors.truncate(k);
            Ok(neighbors)
        }

        async fn upsert(&self, documents: Vec<Document>) -> Result<(), DomainError> {
            let mut stored = self.documents.write().unwrap();
            for document in documents {
                stored.retain(|d| d.id != document.id);
                stored.push(document);
            }
            Ok(())
        }

        async fn len(&self) -> Result<usize, DomainError> {
            Ok(self.documents.read().unwrap().len())
        }
    }
}
