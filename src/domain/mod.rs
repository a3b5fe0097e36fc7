//! Domain layer - Core business logic and entities

pub mod embedding;
pub mod error;
pub mod generation;
pub mod knowledge_base;
pub mod llm;
pub mod provider;
pub mod rerank;
pub mod resilience;
pub mod retrieval;
pub mod telemetry;
pub mod usage;

pub use embedding::Embedder;
pub use error::{DomainError, ProviderError, ProviderErrorKind};
pub use generation::{
    AttemptFailure, GenerationError, GenerationOrchestrator, GenerationRequest, GenerationResult,
    OrchestratorSettings,
};
pub use knowledge_base::{Document, DocumentMetadata, RetrievalCandidate, VectorIndex};
pub use llm::{
    FinishReason, FunctionCall, LlmOutput, LlmProvider, LlmRequest, LlmResponse, Message,
    MessageRole, ToolDefinition, Usage,
};
pub use provider::{ProviderConfig, ProviderEntry, ProviderRegistry};
pub use rerank::Reranker;
pub use resilience::{CircuitBreaker, CircuitState, RetryConfig, RetryPolicy};
pub use retrieval::{RetrievalOptions, RetrievalPipeline, RetrievalSettings};
pub use telemetry::TelemetrySink;
pub use usage::{CostTracker, ProviderPricing, UsageLog, UsageRecord};
