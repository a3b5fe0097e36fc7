//! Retrieval pipeline: embed → nearest neighbours → threshold → rerank → rank

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::DomainError;
use crate::domain::embedding::Embedder;
use crate::domain::knowledge_base::{DocumentFilter, RetrievalCandidate, VectorIndex};
use crate::domain::rerank::Reranker;

/// Retrieval defaults and limits
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub default_similarity_threshold: f32,
    /// Multiplier applied to `top_k` when querying the index
    pub overscan_factor: usize,
    pub max_top_k: usize,
    /// Never return unpublished documents
    pub published_only: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            default_similarity_threshold: 0.6,
            overscan_factor: 4,
            max_top_k: 20,
            published_only: true,
        }
    }
}

/// Per-call retrieval parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub category: Option<String>,
}

impl RetrievalOptions {
    pub fn new(top_k: usize, similarity_threshold: f32) -> Self {
        Self {
            top_k,
            similarity_threshold,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Composes embedder, index, and reranker into ranked passages
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    settings: RetrievalSettings,
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("embedder", &self.embedder.provider_name())
            .field("reranker", &self.reranker.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        self.retrieve_with(query, &RetrievalOptions::new(top_k, similarity_threshold))
            .await
    }

    /// Ranked passages for `query`. An empty result means nothing cleared the
    /// threshold and is not an error.
    #[instrument(skip(self, query), fields(top_k = options.top_k, threshold = options.similarity_threshold))]
    pub async fn retrieve_with(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        self.validate(query, options)?;

        let vector = self.embedder.embed(query).await?;

        let overscan = options
            .top_k
            .saturating_mul(self.settings.overscan_factor.max(1));
        let filter = DocumentFilter {
            published_only: self.settings.published_only,
            category: options.category.clone(),
        };

        let survivors: Vec<RetrievalCandidate> = self
            .index
            .nearest(&vector, overscan, &filter)
            .await?
            .into_iter()
            .filter(|n| n.similarity >= options.similarity_threshold)
            .map(RetrievalCandidate::from)
            .collect();

        debug!(requested = overscan, survivors = survivors.len(), "Index query complete");

        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked = match self.reranker.rerank(query, survivors.clone()).await {
            Ok(reranked) => reranked,
            Err(e) => {
                warn!(reranker = self.reranker.name(), error = %e, "Reranking failed, using similarity order");
                survivors
            }
        };

        ranked.sort_by(RetrievalCandidate::ranking);
        ranked.truncate(options.top_k);

        Ok(ranked)
    }

    fn validate(&self, query: &str, options: &RetrievalOptions) -> Result<(), DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }

        if options.top_k == 0 || options.top_k > self.settings.max_top_k {
            return Err(DomainError::validation(format!(
                "top_k must be between 1 and {}",
                self.settings.max_top_k
            )));
        }

        if !(0.0..=1.0).contains(&options.similarity_threshold) {
            return Err(DomainError::validation(
                "similarity_threshold must be between 0 and 1",
            ));
        }

        Ok(())
    }
}
