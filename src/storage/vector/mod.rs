//! Similarity index implementations.

mod memory;

pub use memory::MemorySimilarityIndex;
