use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::{
    FinishReason, FunctionCall, LlmProvider, LlmRequest, LlmResponse, Message, MessageRole,
    ProviderError, Usage,
};

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const PROVIDER: &str = "anthropic";

/// Anthropic API provider
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, model: &str, request: &LlmRequest, with_tools: bool) -> serde_json::Value {
        let system = request
            .system_messages()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let messages: Vec<AnthropicMessage> = request
            .conversation_messages()
            .map(AnthropicMessage::from_domain)
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if with_tools && request.uses_tools() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|tool| {
                    let mut spec = serde_json::json!({
                        "name": tool.name,
                        "input_schema": tool.parameters,
                    });
                    if let Some(ref description) = tool.description {
                        spec["description"] = serde_json::json!(description);
                    }
                    spec
                })
                .collect();
            body["tools"] = serde_json::json!(tools);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<LlmResponse, ProviderError> {
        let response: AnthropicResponse = serde_json::from_value(json).map_err(|e| {
            ProviderError::malformed(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let tool_use = response
            .content
            .iter()
            .find(|block| block.content_type == "tool_use");

        let mut llm_response = match tool_use {
            Some(block) => {
                let name = block.name.clone().ok_or_else(|| {
                    ProviderError::malformed(PROVIDER, "tool_use block without a name")
                })?;
                let arguments = block.input.clone().unwrap_or_else(|| serde_json::json!({}));
                LlmResponse::function_call(
                    response.id,
                    response.model,
                    FunctionCall::new(name, arguments),
                )
            }
            None => {
                let content = response
                    .content
                    .into_iter()
                    .filter(|block| block.content_type == "text")
                    .filter_map(|block| block.text)
                    .collect::<Vec<_>>()
                    .join("");
                LlmResponse::text(response.id, response.model, content)
            }
        };

        if let Some(reason) = response.stop_reason {
            llm_response = llm_response.with_finish_reason(FinishReason::from_wire(&reason));
        }

        Ok(llm_response.with_usage(Usage::new(
            response.usage.input_tokens,
            response.usage.output_tokens,
        )))
    }

    async fn complete(
        &self,
        model: &str,
        request: &LlmRequest,
        with_tools: bool,
    ) -> Result<LlmResponse, ProviderError> {
        let url = self.messages_url();
        let body = self.build_request(model, request, with_tools);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(|e| e.for_provider(PROVIDER))?;

        self.parse_response(response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AnthropicProvider<C> {
    async fn generate(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        self.complete(model, &request, false).await
    }

    async fn generate_with_tools(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmResponse, ProviderError> {
        self.complete(model, &request, true).await
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> AnthropicMessage<'a> {
    fn from_domain(message: &'a Message) -> Self {
        let role = match message.role {
            MessageRole::Assistant => "assistant",
            // System messages are lifted into the top-level `system` field
            MessageRole::User | MessageRole::System => "user",
        };

        Self {
            role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
    name: Option<String>,
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LlmOutput, ProviderErrorKind, ToolDefinition};
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;

    const TEST_URL: &str = "https://api.anthropic.com/v1/messages";

    #[tokio::test]
    async fn test_anthropic_generate() {
        let mock_response = serde_json::json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{
                "type": "text",
                "text": "Refunds take five business days."
            }],
            "stop_reason": "end_turn",
            "usage": {
                "input_tokens": 12,
                "output_tokens": 10
            }
        });

        let client = MockHttpClient::new().with_response(TEST_URL, mock_response);
        let provider = AnthropicProvider::new(client, "test-api-key");

        let request = LlmRequest::builder()
            .system("System prompt 1")
            .system("System prompt 2")
            .user("How long do refunds take?")
            .build();

        let response = provider
            .generate("claude-3-5-sonnet-20241022", request)
            .await
            .unwrap();

        assert_eq!(response.id, "msg_123");
        assert_eq!(response.content(), Some("Refunds take five business days."));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.total_tokens, 22);

        let body = provider.client.last_body().unwrap();
        assert_eq!(body["system"], "System prompt 1\nSystem prompt 2");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_anthropic_tool_use() {
        let mock_response = serde_json::json!({
            "id": "msg_456",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                { "type": "text", "text": "Escalating now." },
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "escalate_ticket",
                    "input": { "ticket_id": 42 }
                }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 40, "output_tokens": 15 }
        });

        let client = MockHttpClient::new().with_response(TEST_URL, mock_response);
        let provider = AnthropicProvider::new(client, "test-api-key");

        let request = LlmRequest::builder()
            .user("Escalate ticket 42")
            .tool(ToolDefinition::new(
                "escalate_ticket",
                serde_json::json!({ "type": "object" }),
            ))
            .build();

        let response = provider
            .generate_with_tools("claude-3-5-sonnet-20241022", request)
            .await
            .unwrap();

        match response.output {
            LlmOutput::FunctionCall(call) => {
                assert_eq!(call.name, "escalate_ticket");
                assert_eq!(call.arguments["ticket_id"], 42);
            }
            other => panic!("expected a function call, got {:?}", other),
        }

        let body = provider.client.last_body().unwrap();
        assert_eq!(body["tools"][0]["name"], "escalate_ticket");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[tokio::test]
    async fn test_anthropic_missing_usage_is_malformed() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            serde_json::json!({ "id": "msg", "model": "m", "content": [] }),
        );
        let provider = AnthropicProvider::new(client, "test-key");

        let error = provider
            .generate("claude", LlmRequest::builder().user("Hi").build())
            .await
            .unwrap_err();

        assert_eq!(error.provider, "anthropic");
        assert_eq!(error.kind, ProviderErrorKind::Malformed);
    }

    #[tokio::test]
    async fn test_anthropic_custom_base_url() {
        let custom_url = "http://localhost:8081/v1/messages";
        let mock_response = serde_json::json!({
            "id": "msg_custom",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "Custom response"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 2}
        });

        let client = MockHttpClient::new().with_response(custom_url, mock_response);
        let provider =
            AnthropicProvider::with_base_url(client, "test-key", "http://localhost:8081");

        let response = provider
            .generate("claude-3-5-sonnet-20241022", LlmRequest::builder().user("Test").build())
            .await
            .unwrap();

        assert_eq!(response.id, "msg_custom");
    }
}
