//! Chat and retrieval wire types

use serde::{Deserialize, Serialize};

use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::{AttemptFailure, FunctionCall, GenerationRequest, GenerationResult, ToolDefinition};

/// Longest accepted customer question or retrieval query, in characters
pub const MAX_QUESTION_CHARS: usize = 5_000;

/// POST /v1/chat body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub customer_question: String,
    /// Echoed into logs to correlate turns of one conversation
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    /// Restricts generation to one configured provider
    #[serde(default, alias = "model")]
    pub provider: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cost_aware: Option<bool>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

fn default_use_rag() -> bool {
    true
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        let chars = self.customer_question.trim().chars().count();
        if chars == 0 {
            return Err("customer_question cannot be empty".to_string());
        }
        if chars > MAX_QUESTION_CHARS {
            return Err(format!(
                "customer_question exceeds {} characters",
                MAX_QUESTION_CHARS
            ));
        }
        Ok(())
    }

    pub fn into_generation_request(self) -> GenerationRequest {
        let mut request = GenerationRequest::prompt(self.customer_question).with_tools(self.tools);
        request.use_rag = self.use_rag;
        request.top_k = self.top_k;
        request.similarity_threshold = self.similarity_threshold;
        request.category = self.category;
        request.provider_override = self.provider;
        request.cost_aware = self.cost_aware;
        request
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Answer text; empty when the model chose a function call
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    pub confidence_score: f32,
    pub sources: Vec<String>,
    pub provider_used: String,
    pub model_used: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_micros: i64,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_attempts: Vec<AttemptFailure>,
}

impl From<GenerationResult> for ChatResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            response: result.content().unwrap_or_default().to_string(),
            function_call: result.function_call().cloned(),
            confidence_score: result.confidence,
            sources: result.sources,
            provider_used: result.provider_used,
            model_used: result.model,
            tokens_in: result.tokens_in,
            tokens_out: result.tokens_out,
            cost_micros: result.cost_micros,
            processing_time_ms: result.latency_ms,
            failed_attempts: result.failed_attempts,
        }
    }
}

/// POST /v1/rag/retrieve body
#[derive(Debug, Clone, Deserialize)]
pub struct RagQuery {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagResult {
    pub results: Vec<RetrievalCandidate>,
    pub retrieval_time_ms: u64,
}
