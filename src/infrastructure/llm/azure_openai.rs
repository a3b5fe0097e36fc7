use async_trait::async_trait;

use super::http_client::HttpClientTrait;
use super::openai::{build_chat_body, parse_chat_response};
use crate::domain::{LlmProvider, LlmRequest, LlmResponse, ProviderError};

const PROVIDER: &str = "azure_openai";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Azure OpenAI API configuration
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl AzureOpenAiConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

/// Azure OpenAI API provider. The `model` argument names the deployment.
#[derive(Debug)]
pub struct AzureOpenAiProvider<C: HttpClientTrait> {
    client: C,
    config: AzureOpenAiConfig,
}

impl<C: HttpClientTrait> AzureOpenAiProvider<C> {
    pub fn new(client: C, config: AzureOpenAiConfig) -> Self {
        Self { client, config }
    }

    fn build_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            self.config.api_version
        )
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("api-key", self.config.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    async fn complete(
        &self,
        deployment: &str,
        request: &LlmRequest,
        with_tools: bool,
    ) -> Result<LlmResponse, ProviderError> {
        let url = self.build_url(deployment);
        let body = build_chat_body(None, request, with_tools);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(|e| e.for_provider(PROVIDER))?;

        parse_chat_response(PROVIDER, response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AzureOpenAiProvider<C> {
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
