use serde::Deserialize;
use std::sync::Arc;

use super::azure_openai::{AzureOpenAiConfig, DEFAULT_AZURE_API_VERSION};
use super::http_client::HttpClient;
use super::{AnthropicProvider, AzureOpenAiProvider, EchoProvider, OpenAiProvider};
use crate::domain::{DomainError, LlmProvider};

/// Backend behind a configured provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmProviderKind {
    OpenAi,
    Anthropic,
    AzureOpenAi {
        endpoint: String,
        #[serde(default = "default_api_version")]
        api_version: String,
    },
    /// Offline echo backend for local dry runs
    Mock,
}

fn default_api_version() -> String {
    DEFAULT_AZURE_API_VERSION.to_string()
}

impl LlmProviderKind {
    /// Whether the backend needs an API key
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Self::Mock)
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider adapter for `kind`
    pub fn create(
        kind: &LlmProviderKind,
        api_key: Option<&str>,
        base_url: Option<&str>,
        client: HttpClient,
    ) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let key = || {
            api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| DomainError::configuration(format!("{:?} provider requires an API key", kind)))
        };

        match kind {
            LlmProviderKind::OpenAi => {
                let provider = match base_url {
                    Some(url) => OpenAiProvider::with_base_url(client, key()?, url),
                    None => OpenAiProvider::new(client, key()?),
                };
                Ok(Arc::new(provider))
            }

            LlmProviderKind::Anthropic => {
                let provider = match base_url {
                    Some(url) => AnthropicProvider::with_base_url(client, key()?, url),
                    None => AnthropicProvider::new(client, key()?),
                };
                Ok(Arc::new(provider))
            }

            LlmProviderKind::AzureOpenAi {
                endpoint,
                api_version,
            } => {
                let config = AzureOpenAiConfig::new(endpoint, key()?).with_api_version(api_version);
                Ok(Arc::new(AzureOpenAiProvider::new(client, config)))
            }

            LlmProviderKind::Mock => Ok(Arc::new(EchoProvider::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_provider() {
        let provider =
            LlmProviderFactory::create(&LlmProviderKind::OpenAi, Some("sk-test"), None, HttpClient::new())
                .unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert!(provider.supports_tools());
    }

    #[test]
    fn test_create_anthropic_provider_with_base_url() {
        let provider = LlmProviderFactory::create(
            &LlmProviderKind::Anthropic,
            Some("sk-ant"),
            Some("http://localhost:8081"),
            HttpClient::new(),
        )
        .unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
    }

    #[test]
    fn test_create_azure_provider() {
        let kind = LlmProviderKind::AzureOpenAi {
            endpoint: "https://test.openai.azure.com".to_string(),
            api_version: default_api_version(),
        };
        let provider =
            LlmProviderFactory::create(&kind, Some("key"), None, HttpClient::new()).unwrap();
        assert_eq!(provider.provider_name(), "azure_openai");
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let result =
            LlmProviderFactory::create(&LlmProviderKind::OpenAi, Some("  "), None, HttpClient::new());
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_mock_needs_no_credentials() {
        assert!(!LlmProviderKind::Mock.requires_credentials());
        let provider =
            LlmProviderFactory::create(&LlmProviderKind::Mock, None, None, HttpClient::new()).unwrap();
        assert_eq!(provider.provider_name(), "echo");
    }

    #[test]
    fn test_kind_deserializes_from_tagged_table() {
        let kind: LlmProviderKind = serde_json::from_value(serde_json::json!({
            "type": "azure_open_ai",
            "endpoint": "https://x.openai.azure.com"
        }))
        .unwrap();

        assert_eq!(
            kind,
            LlmProviderKind::AzureOpenAi {
                endpoint: "https://x.openai.azure.com".to_string(),
                api_version: "2024-02-01".to_string(),
            }
        );
    }
}
