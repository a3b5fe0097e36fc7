//! Configuration module

mod app_config;

pub use app_config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingKind, LogFormat, LoggingConfig,
    OrchestratorConfig, ProviderSettings, RerankStrategy, RerankerConfig, RetrievalConfig,
    ServerConfig, VectorIndexConfig,
};
