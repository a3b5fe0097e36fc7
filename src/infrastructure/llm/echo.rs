use async_trait::async_trait;

use crate::domain::{
    FinishReason, FunctionCall, LlmProvider, LlmRequest, LlmResponse, MessageRole, ProviderError,
    Usage,
};

const PROVIDER: &str = "echo";

/// Offline provider for local dry runs: answers with the last user message
#[derive(Debug, Default)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }

    fn last_user_message(request: &LlmRequest) -> &str {
        request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    fn usage(request: &LlmRequest, completion: &str) -> Usage {
        let completion_tokens = (completion.chars().count() as u32).div_ceil(4);
        Usage::new(request.approximate_prompt_tokens(), completion_tokens)
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn generate(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let grounded = request.system_messages().count();
        let content = format!(
            "[echo] {} ({} system message(s) in context)",
            Self::last_user_message(&request),
            grounded
        );
        let usage = Self::usage(&request, &content);

        Ok(LlmResponse::text(uuid::Uuid::new_v4().to_string(), model, content)
            .with_finish_reason(FinishReason::Stop)
            .with_usage(usage))
    }

    async fn generate_with_tools(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmResponse, ProviderError> {
        let Some(tool) = request.tools.first() else {
            return self.generate(model, request).await;
        };

        let arguments = serde_json::json!({ "query": Self::last_user_message(&request) });
        let usage = Self::usage(&request, &arguments.to_string());

        Ok(LlmResponse::function_call(
            uuid::Uuid::new_v4().to_string(),
            model,
            FunctionCall::new(tool.name.clone(), arguments),
        )
        .with_usage(usage))
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
