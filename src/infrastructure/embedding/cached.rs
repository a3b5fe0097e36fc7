//! Query-embedding cache

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;

use crate::domain::DomainError;
use crate::domain::embedding::Embedder;

/// Embedder wrapper memoising vectors by exact input text
#[derive(Debug)]
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).build();
        Self { inner, cache }
    }

    /// Get cache statistics
    pub fn cache_size(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        if let Some(cached) = self.cache.get(text).await {
            tracing::debug!(provider = self.inner.provider_name(), "Cache hit for embedding");
            return Ok((*cached).clone());
        }

        let vector = self.inner.embed(text).await?;
        self.cache
            .insert(text.to_string(), Arc::new(vector.clone()))
            .await;

        Ok(vector)
    }

    /// Batches are corpus ingestion; they bypass the query cache
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
