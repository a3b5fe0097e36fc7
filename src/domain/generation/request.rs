use std::time::Duration;

use crate::domain::llm::{Message, MessageRole, ToolDefinition};
use crate::domain::provider::CandidateSelection;

/// Input to one generation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub use_rag: bool,
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub category: Option<String>,
    pub provider_override: Option<String>,
    pub cost_aware: Option<bool>,
    pub deadline: Option<Duration>,
}

impl GenerationRequest {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            use_rag: false,
            top_k: None,
            similarity_threshold: None,
            category: None,
            provider_override: None,
            cost_aware: None,
            deadline: None,
        }
    }

    /// Single user prompt
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::from_messages(vec![Message::user(text)])
    }

    pub fn with_rag(mut self) -> Self {
        self.use_rag = true;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_override = Some(provider_id.into());
        self
    }

    pub fn with_cost_aware(mut self, enabled: bool) -> Self {
        self.cost_aware = Some(enabled);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The question retrieval runs against: the last user message
    pub fn query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .filter(|q| !q.trim().is_empty())
    }

    pub fn uses_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn selection(&self) -> CandidateSelection {
        CandidateSelection {
            provider_override: self.provider_override.clone(),
            cost_aware: self.cost_aware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_last_user_message() {
        let request = GenerationRequest::from_messages(vec![
            Message::system("be brief"),
            Message::user("first question"),
            Message::assistant("answer"),
            Message::user("follow-up question"),
        ]);

        assert_eq!(request.query(), Some("follow-up question"));
    }

    #[test]
    fn test_query_missing_or_blank() {
        assert_eq!(
            GenerationRequest::from_messages(vec![Message::system("x")]).query(),
            None
        );
        assert_eq!(GenerationRequest::prompt("   ").query(), None);
    }

    #[test]
    fn test_builder_sets_selection() {
        let request = GenerationRequest::prompt("hi")
            .with_provider("claude")
            .with_cost_aware(true);

        let selection = request.selection();
        assert_eq!(selection.provider_override.as_deref(), Some("claude"));
        assert_eq!(selection.cost_aware, Some(true));
        assert!(!request.use_rag);
    }
}
