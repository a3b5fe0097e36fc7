use serde::{Deserialize, Serialize};

use super::FunctionCall;

/// Reason why the generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
}

impl FinishReason {
    /// Map the finish/stop reason strings used by the supported backends
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "stop_sequence" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            _ => Self::Error,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// What the model produced: free text or a structured function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmOutput {
    Text { content: String },
    FunctionCall(FunctionCall),
}

/// Normalized response from an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub id: String,
    pub model: String,
    pub output: LlmOutput,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(id: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            output: LlmOutput::Text {
                content: content.into(),
            },
            finish_reason: None,
            usage: Usage::default(),
        }
    }

    pub fn function_call(
        id: impl Into<String>,
        model: impl Into<String>,
        call: FunctionCall,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            output: LlmOutput::FunctionCall(call),
            finish_reason: Some(FinishReason::ToolCalls),
            usage: Usage::default(),
        }
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn content(&self) -> Option<&str> {
        match &self.output {
            LlmOutput::Text { content } => Some(content),
            LlmOutput::FunctionCall(_) => None,
        }
    }
}
