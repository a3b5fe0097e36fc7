use async_trait::async_trait;
use std::fmt::Debug;

use super::{LlmRequest, LlmResponse};
use crate::domain::ProviderError;

/// Trait for LLM provider adapters (OpenAI, Anthropic, etc.)
///
/// Adapters translate the uniform request into their backend's wire format and
/// classify every failure into a [`ProviderError`]. Adding a backend means adding
/// an implementation; the orchestration code never changes.
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Plain text generation
    async fn generate(&self, model: &str, request: LlmRequest)
    -> Result<LlmResponse, ProviderError>;

    /// Structured function-calling generation; `request.tools` is non-empty
    async fn generate_with_tools(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmResponse, ProviderError> {
        let _ = (model, request);
        Err(ProviderError::unsupported(
            self.provider_name(),
            "function calling is not supported by this provider",
        ))
    }

    /// Whether `generate_with_tools` is implemented
    fn supports_tools(&self) -> bool {
        false
    }

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
