//! Storage backend traits.

mod registry;
mod vector;

pub use registry::RegistryStore;
pub use vector::{CancelFlag, SimilarityIndex, SimilarityRecord};
