//! LLM provider implementations

mod anthropic;
mod azure_openai;
mod echo;
mod factory;
mod http_client;
mod openai;

pub use anthropic::AnthropicProvider;
pub use azure_openai::{AzureOpenAiConfig, AzureOpenAiProvider};
pub use echo::EchoProvider;
pub use factory::{LlmProviderFactory, LlmProviderKind};
pub use http_client::{HttpClient, HttpClientTrait, kind_for_status};
pub use openai::OpenAiProvider;

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
