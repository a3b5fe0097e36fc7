use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::{
    FinishReason, FunctionCall, LlmProvider, LlmRequest, LlmResponse, Message, MessageRole,
    ProviderError, ToolDefinition, Usage,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";

/// OpenAI API provider
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    async fn complete(
        &self,
        model: &str,
        request: &LlmRequest,
        with_tools: bool,
    ) -> Result<LlmResponse, ProviderError> {
        let url = self.chat_completions_url();
        let body = build_chat_body(Some(model), request, with_tools);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(|e| e.for_provider(PROVIDER))?;

        parse_chat_response(PROVIDER, response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenAiProvider<C> {
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

/// Chat-completions request body, shared with the Azure deployment API.
///
/// Azure takes the model from the deployment URL, so `model` is optional.
pub(super) fn build_chat_body(
    model: Option<&str>,
    request: &LlmRequest,
    with_tools: bool,
) -> serde_json::Value {
    let messages: Vec<ChatMessage> = request.messages.iter().map(ChatMessage::from_domain).collect();

    let mut body = serde_json::json!({ "messages": messages });

    if let Some(model) = model {
        body["model"] = serde_json::json!(model);
    }

    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    if with_tools && request.uses_tools() {
        let tools: Vec<ChatTool> = request.tools.iter().map(ChatTool::from_domain).collect();
        body["tools"] = serde_json::json!(tools);
        body["tool_choice"] = serde_json::json!("auto");
    }

    body
}

/// Normalize a chat-completions response; the first tool call wins over text
pub(super) fn parse_chat_response(
    provider: &str,
    json: serde_json::Value,
) -> Result<LlmResponse, ProviderError> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| ProviderError::malformed(provider, format!("Failed to parse response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed(provider, "No choices in response"))?;

    let tool_call = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .next();

    let mut llm_response = match tool_call {
        Some(call) => LlmResponse::function_call(
            response.id,
            response.model,
            FunctionCall::from_encoded(call.function.name, &call.function.arguments),
        ),
        None => LlmResponse::text(
            response.id,
            response.model,
            choice.message.content.unwrap_or_default(),
        ),
    };

    if let Some(reason) = choice.finish_reason {
        llm_response = llm_response.with_finish_reason(FinishReason::from_wire(&reason));
    }

    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }

    Ok(llm_response)
}

// Chat-completions wire types

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatMessage<'a> {
    fn from_domain(message: &'a Message) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        Self {
            role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ChatFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ChatFunction<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    parameters: &'a serde_json::Value,
}

impl<'a> ChatTool<'a> {
    fn from_domain(tool: &'a ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            function: ChatFunction {
                name: &tool.name,
                description: tool.description.as_deref(),
                parameters: &tool.parameters,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
