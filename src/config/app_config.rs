use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::generation::{MAX_REQUEST_DEADLINE, OrchestratorSettings};
use crate::domain::provider::ProviderConfig;
use crate::domain::resilience::{BreakerSettings, RetryConfig};
use crate::domain::retrieval::RetrievalSettings;
use crate::domain::usage::{DEFAULT_COST_WINDOW, ProviderPricing};
use crate::infrastructure::llm::LlmProviderKind;
use crate::infrastructure::observability::MetricsConfig;

/// Why configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub providers: Vec<ProviderSettings>,
    pub orchestrator: OrchestratorConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexConfig,
    pub reranker: RerankerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// One configured generation backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub kind: LlmProviderKind,
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Lower runs first
    pub priority: u32,
    /// USD per 1K input tokens
    #[serde(default)]
    pub input_price_per_1k: f64,
    /// USD per 1K output tokens
    #[serde(default)]
    pub output_price_per_1k: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub cost_flexible: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    30_000
}

impl ProviderSettings {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(&self.id, &self.model, self.priority)
            .with_pricing(ProviderPricing::new(
                self.input_price_per_1k,
                self.output_price_per_1k,
            ))
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_retries(self.max_retries)
            .with_breaker(BreakerSettings {
                failure_threshold: self.failure_threshold,
                cooldown: Duration::from_millis(self.cooldown_ms),
            })
            .cost_flexible(self.cost_flexible);

        if let Some(ref name) = self.display_name {
            config = config.with_display_name(name);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Provider hoisted to the head of the candidate list
    pub active_provider: Option<String>,
    pub cost_aware_ordering: bool,
    pub request_deadline_ms: u64,
    pub default_confidence: f32,
    /// Successful calls per provider averaged for cost-aware ordering
    pub cost_window: usize,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            active_provider: None,
            cost_aware_ordering: false,
            request_deadline_ms: 60_000,
            default_confidence: 0.85,
            cost_window: DEFAULT_COST_WINDOW,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub overscan_factor: usize,
    pub max_top_k: usize,
    pub require_grounding: bool,
    pub published_only: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let defaults = RetrievalSettings::default();
        Self {
            top_k: defaults.default_top_k,
            similarity_threshold: defaults.default_similarity_threshold,
            overscan_factor: defaults.overscan_factor,
            max_top_k: defaults.max_top_k,
            require_grounding: false,
            published_only: defaults.published_only,
        }
    }
}

impl RetrievalConfig {
    pub fn to_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            default_top_k: self.top_k,
            default_similarity_threshold: self.similarity_threshold,
            overscan_factor: self.overscan_factor,
            max_top_k: self.max_top_k,
            published_only: self.published_only,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    OpenAi,
    #[default]
    Hashing,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub kind: EmbeddingKind,
    pub model: String,
    pub dimensions: usize,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    /// Query embeddings kept in memory; 0 disables the cache
    pub cache_capacity: u64,
    /// Budget for one call to a remote embedding backend
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::default(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 384,
            api_key_env: None,
            base_url: None,
            cache_capacity: 1_000,
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// JSON corpus loaded at startup
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    #[default]
    Lexical,
    Llm,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub strategy: RerankStrategy,
    pub similarity_weight: f32,
    /// Provider whose adapter judges relevance for the `llm` strategy
    pub provider: Option<String>,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::default(),
            similarity_weight: 0.5,
            provider: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let app: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::invalid("at least one provider must be configured"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::invalid("provider id must not be empty"));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::invalid(format!("duplicate provider id '{}'", provider.id)));
            }
            if provider.model.trim().is_empty() {
                return Err(ConfigError::invalid(format!("provider '{}' has no model", provider.id)));
            }
            if provider.failure_threshold == 0 {
                return Err(ConfigError::invalid(format!(
                    "provider '{}' failure_threshold must be positive",
                    provider.id
                )));
            }
            if provider.input_price_per_1k < 0.0 || provider.output_price_per_1k < 0.0 {
                return Err(ConfigError::invalid(format!(
                    "provider '{}' prices must not be negative",
                    provider.id
                )));
            }
        }

        for (field, reference) in [
            ("orchestrator.active_provider", &self.orchestrator.active_provider),
            ("reranker.provider", &self.reranker.provider),
        ] {
            if let Some(id) = reference {
                if !seen.contains(id.as_str()) {
                    return Err(ConfigError::invalid(format!(
                        "{} '{}' is not a configured provider",
                        field, id
                    )));
                }
            }
        }

        let deadline_ms = self.orchestrator.request_deadline_ms;
        if deadline_ms == 0 || u128::from(deadline_ms) > MAX_REQUEST_DEADLINE.as_millis() {
            return Err(ConfigError::invalid(format!(
                "orchestrator.request_deadline_ms must be between 1 and {}",
                MAX_REQUEST_DEADLINE.as_millis()
            )));
        }

        if self.reranker.strategy == RerankStrategy::Llm && self.reranker.provider.is_none() {
            return Err(ConfigError::invalid("reranker.strategy 'llm' requires reranker.provider"));
        }

        let retrieval = &self.retrieval;
        if retrieval.overscan_factor < 1 {
            return Err(ConfigError::invalid("retrieval.overscan_factor must be at least 1"));
        }
        if retrieval.top_k == 0 || retrieval.top_k > retrieval.max_top_k {
            return Err(ConfigError::invalid(format!(
                "retrieval.top_k must be between 1 and {}",
                retrieval.max_top_k
            )));
        }
        if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
            return Err(ConfigError::invalid("retrieval.similarity_threshold must be in [0, 1]"));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::invalid("embedding.dimensions must be positive"));
        }
        if self.embedding.timeout_ms == 0 {
            return Err(ConfigError::invalid("embedding.timeout_ms must be positive"));
        }

        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            request_deadline: Duration::from_millis(self.orchestrator.request_deadline_ms),
            default_confidence: self.orchestrator.default_confidence,
            require_grounding: self.retrieval.require_grounding,
        }
    }
}
