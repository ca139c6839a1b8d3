//! Registry persistence trait.

use crate::Result;
use crate::models::RegistryRecord;

/// Durable storage for registry records.
///
/// The store is the persistence boundary: records are flat, carry no vector
/// data, and are never deleted.
pub trait RegistryStore: Send + Sync {
    /// Returns a short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Loads every stored record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if the backend cannot be read.
    fn load_all(&self) -> Result<Vec<RegistryRecord>>;

    /// Inserts or replaces a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if the write fails.
    fn save(&self, record: &RegistryRecord) -> Result<()>;
}
