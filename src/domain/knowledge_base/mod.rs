//! Knowledge corpus domain: documents, the vector index seam, and retrieval candidates

mod candidate;
mod document;
mod index;

pub use candidate::RetrievalCandidate;
pub use document::{Document, DocumentFilter, DocumentMetadata};
pub use index::{Neighbor, VectorIndex};

#[cfg(test)]
pub use index::mock::MockVectorIndex;
