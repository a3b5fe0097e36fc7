//! LLM provider domain models and traits

mod message;
mod provider;
mod request;
mod response;
mod tool;

pub use message::{Message, MessageRole};
pub use provider::LlmProvider;
pub use request::{LlmRequest, LlmRequestBuilder};
pub use response::{FinishReason, LlmOutput, LlmResponse, Usage};
pub use tool::{FunctionCall, ToolDefinition};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
