//! eService orchestrator
//!
//! Generation orchestration across multiple LLM providers with:
//! - Priority and cost-aware fallback behind per-provider circuit breakers
//! - Bounded retries with jittered exponential backoff
//! - Retrieval-augmented generation over an in-memory vector index

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::config::{EmbeddingConfig, EmbeddingKind, RerankStrategy};
use domain::resilience::{Clock, JitterSource, RandomJitter, SystemClock};
use domain::{
    CostTracker, Embedder, GenerationOrchestrator, ProviderEntry, ProviderRegistry,
    Reranker, RetrievalPipeline, RetryPolicy, TelemetrySink,
};
use infrastructure::embedding::{CachedEmbedder, HashingEmbedder, OpenAiEmbedder};
use infrastructure::knowledge_base::InMemoryVectorIndex;
use infrastructure::llm::{HttpClient, LlmProviderFactory};
use infrastructure::observability::MetricsTelemetrySink;
use infrastructure::rerank::{IdentityReranker, LexicalReranker, LlmReranker};
use infrastructure::usage::InMemoryUsageLog;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Every long-lived object, built once at process start
#[derive(Debug, Clone)]
pub struct Services {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub index: Arc<InMemoryVectorIndex>,
    pub embedder: Arc<dyn Embedder>,
}

impl Services {
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.orchestrator.registry()
    }

    pub fn costs(&self) -> &Arc<CostTracker> {
        self.registry().costs()
    }
}

/// Build services with the system clock and random jitter
pub async fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    build_services_with(config, Arc::new(SystemClock), Arc::new(RandomJitter)).await
}

/// Build services around the given time and jitter sources
pub async fn build_services_with(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
) -> anyhow::Result<Services> {
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(MetricsTelemetrySink);
    let client = HttpClient::with_connect_timeout(CONNECT_TIMEOUT)?;

    let mut entries = Vec::with_capacity(config.providers.len());
    for settings in &config.providers {
        let api_key = settings.api_key();
        if settings.kind.requires_credentials() && api_key.is_none() {
            tracing::warn!(
                provider = %settings.id,
                env = settings.api_key_env.as_deref().unwrap_or("<unset>"),
                "API key not found in environment"
            );
        }

        let adapter = LlmProviderFactory::create(
            &settings.kind,
            api_key.as_deref(),
            settings.base_url.as_deref(),
            client.clone(),
        )
        .with_context(|| format!("Failed to create provider '{}'", settings.id))?;

        entries.push(ProviderEntry::new(settings.to_provider_config(), adapter));
    }

    let costs = Arc::new(CostTracker::new(
        Arc::new(InMemoryUsageLog::new()),
        telemetry.clone(),
        config.orchestrator.cost_window,
    ));

    let mut registry = ProviderRegistry::new(entries, clock.clone(), telemetry, costs)?
        .with_cost_aware_ordering(config.orchestrator.cost_aware_ordering);
    if let Some(ref active) = config.orchestrator.active_provider {
        registry = registry.with_active_provider(active)?;
    }
    info!(providers = ?registry.ids(), "Provider registry ready");
    let registry = Arc::new(registry);

    let embedder = create_embedder(&config.embedding, &client)?;
    let index = Arc::new(InMemoryVectorIndex::new(config.embedding.dimensions));
    if let Some(ref path) = config.vector_index.seed_path {
        index
            .load_json(path, embedder.as_ref())
            .await
            .with_context(|| format!("Failed to seed knowledge base from {}", path.display()))?;
    }

    let reranker = create_reranker(config, &registry)?;
    info!(
        embedder = embedder.provider_name(),
        reranker = reranker.name(),
        "Retrieval pipeline ready"
    );

    let retrieval = Arc::new(RetrievalPipeline::new(
        embedder.clone(),
        index.clone(),
        reranker,
        config.retrieval.to_settings(),
    ));

    let retry = Arc::new(RetryPolicy::new(
        config.orchestrator.retry.clone(),
        clock.clone(),
        jitter,
    ));

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        registry,
        retry,
        retrieval,
        clock,
        config.orchestrator_settings(),
    ));

    Ok(Services {
        orchestrator,
        index,
        embedder,
    })
}

fn create_embedder(config: &EmbeddingConfig, client: &HttpClient) -> anyhow::Result<Arc<dyn Embedder>> {
    let base: Arc<dyn Embedder> = match config.kind {
        EmbeddingKind::Hashing => Arc::new(HashingEmbedder::new(config.dimensions)?),
        EmbeddingKind::OpenAi => {
            let api_key = config
                .api_key()
                .context("OpenAI embeddings require embedding.api_key_env to name a set variable")?;
            let embedder = match config.base_url {
                Some(ref url) => OpenAiEmbedder::with_base_url(
                    client.clone(),
                    api_key,
                    &config.model,
                    config.dimensions,
                    url,
                ),
                None => OpenAiEmbedder::new(client.clone(), api_key, &config.model, config.dimensions),
            };
            Arc::new(embedder.with_timeout(Duration::from_millis(config.timeout_ms)))
        }
    };

    if config.cache_capacity == 0 {
        return Ok(base);
    }
    Ok(Arc::new(CachedEmbedder::new(base, config.cache_capacity)))
}

fn create_reranker(
    config: &AppConfig,
    registry: &Arc<ProviderRegistry>,
) -> anyhow::Result<Arc<dyn Reranker>> {
    let weight = config.reranker.similarity_weight;

    let reranker: Arc<dyn Reranker> = match config.reranker.strategy {
        RerankStrategy::None => Arc::new(IdentityReranker),
        RerankStrategy::Lexical => Arc::new(LexicalReranker::new(weight)),
        RerankStrategy::Llm => {
            let provider_id = config
                .reranker
                .provider
                .as_deref()
                .context("reranker.provider is required for the llm strategy")?;
            Arc::new(LlmReranker::new(registry.clone(), provider_id, weight)?)
        }
    };

    Ok(reranker)
}
