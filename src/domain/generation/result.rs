use serde::Serialize;

use super::AttemptFailure;
use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::llm::{FunctionCall, LlmOutput};

/// Output of a successful generation with its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub output: LlmOutput,
    /// The provider that produced this result
    pub provider_used: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_micros: i64,
    pub latency_ms: u64,
    /// Ids of the documents used as context
    pub sources: Vec<String>,
    /// The passages behind `sources`, in rank order
    #[serde(skip)]
    pub passages: Vec<RetrievalCandidate>,
    pub confidence: f32,
    /// Candidates that failed before the successful one
    pub failed_attempts: Vec<AttemptFailure>,
}

impl GenerationResult {
    pub fn content(&self) -> Option<&str> {
        match &self.output {
            LlmOutput::Text { content } => Some(content),
            LlmOutput::FunctionCall(_) => None,
        }
    }

    pub fn function_call(&self) -> Option<&FunctionCall> {
        match &self.output {
            LlmOutput::FunctionCall(call) => Some(call),
            LlmOutput::Text { .. } => None,
        }
    }
}
