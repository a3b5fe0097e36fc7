//! Vector index implementations

mod in_memory;

pub use in_memory::{InMemoryVectorIndex, SeedDocument};
