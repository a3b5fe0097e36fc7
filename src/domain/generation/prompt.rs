//! Grounded prompt assembly

use std::fmt::Write;

use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::llm::Message;

const GROUNDED_INSTRUCTIONS: &str = "You are a customer service assistant. Answer the customer's \
question using only the knowledge base passages below. Cite passages by their number. If the \
passages do not contain the answer, say that you do not know and offer to escalate to a human agent.";

const NO_CONTEXT: &str = "No relevant knowledge base articles were found.";

/// Numbered passage block; a fixed notice when there are no passages
pub fn context_block(passages: &[RetrievalCandidate]) -> String {
    if passages.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut block = String::new();
    for (i, passage) in passages.iter().enumerate() {
        if i > 0 {
            block.push_str("\n\n");
        }
        let _ = write!(
            block,
            "[{}] {} (id: {})\n{}",
            i + 1,
            passage.title,
            passage.document_id,
            passage.content.trim()
        );
    }
    block
}

/// Prepend the grounding system message to the caller's conversation.
///
/// Caller system messages are kept after the grounding message.
pub fn grounded_messages(messages: &[Message], passages: &[RetrievalCandidate]) -> Vec<Message> {
    let system = format!(
        "{}\n\nKnowledge base passages:\n{}",
        GROUNDED_INSTRUCTIONS,
        context_block(passages)
    );

    std::iter::once(Message::system(system))
        .chain(messages.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MessageRole;

    fn passage(id: &str, title: &str, content: &str) -> RetrievalCandidate {
        RetrievalCandidate {
            document_id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: None,
            similarity_score: 0.9,
            rerank_score: None,
        }
    }

    #[test]
    fn test_context_block_numbers_passages() {
        let block = context_block(&[
            passage("kb-001", "Refunds", "Refunds take 5 days. "),
            passage("kb-002", "Shipping", "We ship worldwide."),
        ]);

        assert_eq!(
            block,
            "[1] Refunds (id: kb-001)\nRefunds take 5 days.\n\n[2] Shipping (id: kb-002)\nWe ship worldwide."
        );
    }

    #[test]
    fn test_empty_context_block() {
        assert_eq!(context_block(&[]), NO_CONTEXT);
    }

    #[test]
    fn test_grounded_messages_prepend_system() {
        let messages = grounded_messages(
            &[Message::user("How long do refunds take?")],
            &[passage("kb-001", "Refunds", "Refunds take 5 days.")],
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("[1] Refunds (id: kb-001)"));
        assert_eq!(messages[1].content, "How long do refunds take?");
    }
}
