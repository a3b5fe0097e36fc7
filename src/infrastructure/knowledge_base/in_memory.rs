//! In-memory vector index with snapshot reads

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::DomainError;
use crate::domain::embedding::{Embedder, cosine_similarity};
use crate::domain::knowledge_base::{
    Document, DocumentFilter, DocumentMetadata, Neighbor, VectorIndex,
};

/// Brute-force cosine index.
///
/// Writers take turns on `writer`, build the next document list off to the
/// side, and publish it with a pointer swap. A query works on the snapshot
/// it loaded and never waits for ingestion to finish.
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    documents: ArcSwap<Vec<Document>>,
    writer: Mutex<()>,
}

/// One record of a JSON seed corpus
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

impl SeedDocument {
    /// Text that gets embedded: title and body together
    fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }

    fn into_document(self, embedding: Vec<f32>) -> Document {
        let mut metadata = DocumentMetadata::new(self.title);
        if let Some(category) = self.category {
            metadata = metadata.with_category(category);
        }
        if !self.published {
            metadata = metadata.unpublished();
        }
        Document::new(self.id, self.content, embedding, metadata)
    }
}

impl InMemoryVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            documents: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn snapshot(&self) -> Arc<Vec<Document>> {
        self.documents.load_full()
    }

    /// Embed and index seed records
    pub async fn ingest(
        &self,
        seeds: Vec<SeedDocument>,
        embedder: &dyn Embedder,
    ) -> Result<usize, DomainError> {
        if seeds.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = seeds.iter().map(SeedDocument::embedding_text).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let documents: Vec<Document> = seeds
            .into_iter()
            .zip(vectors)
            .map(|(seed, vector)| seed.into_document(vector))
            .collect();

        let count = documents.len();
        self.upsert(documents).await?;
        Ok(count)
    }

    /// Load a JSON array of seed records from disk and index it
    pub async fn load_json(
        &self,
        path: impl AsRef<Path>,
        embedder: &dyn Embedder,
    ) -> Result<usize, DomainError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::knowledge_base(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let seeds: Vec<SeedDocument> = serde_json::from_str(&raw).map_err(|e| {
            DomainError::knowledge_base(format!("Invalid corpus {}: {}", path.display(), e))
        })?;

        let count = self.ingest(seeds, embedder).await?;
        info!(path = %path.display(), documents = count, "Knowledge base corpus loaded");
        Ok(count)
    }
}

/// Current documents with `incoming` applied: same id replaces in place, new ids append
fn merge(current: &[Document], incoming: Vec<Document>) -> Vec<Document> {
    let mut next = current.to_vec();
    let mut positions: HashMap<String, usize> = next
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.clone(), i))
        .collect();

    for document in incoming {
        match positions.get(&document.id) {
            Some(&i) => next[i] = document,
            None => {
                positions.insert(document.id.clone(), next.len());
                next.push(document);
            }
        }
    }

    next
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<Neighbor>, DomainError> {
        if query.len() != self.dimensions {
            return Err(DomainError::knowledge_base(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let snapshot = self.snapshot();

        let mut scored: Vec<(f32, &Document)> = snapshot
            .iter()
            .filter(|d| filter.matches(&d.metadata))
            .map(|d| (cosine_similarity(query, &d.embedding), d))
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(similarity, d)| Neighbor {
                document_id: d.id.clone(),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                similarity,
            })
            .collect())
    }

    async fn upsert(&self, documents: Vec<Document>) -> Result<(), DomainError> {
        if let Some(bad) = documents.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(DomainError::knowledge_base(format!(
                "Document {} has {} dimensions, index expects {}",
                bad.id,
                bad.embedding.len(),
                self.dimensions
            )));
        }

        let _writer = self.writer.lock().await;
        let next = merge(&self.snapshot(), documents);
        debug!(documents = next.len(), "Publishing index snapshot");
        self.documents.store(Arc::new(next));
        Ok(())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Ok(self.snapshot().len())
    }
}
