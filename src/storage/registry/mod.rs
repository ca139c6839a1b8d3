//! Registry store implementations.

mod memory;
mod sqlite;

pub use memory::MemoryRegistryStore;
pub use sqlite::SqliteRegistryStore;
