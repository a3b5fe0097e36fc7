//! Reranking strategies

mod identity;
mod lexical;
mod llm;

pub use identity::IdentityReranker;
pub use lexical::LexicalReranker;
pub use llm::LlmReranker;
