//! Storage backend that refuses everything.

use crate::storage::{StorageBackend, StorageError};
use tracing::trace;

/// Storage that is switched off.
///
/// Reads find nothing and writes fail with [`StorageError::Disabled`], the
/// way browser storage behaves in privacy mode. Used when no durable
/// location could be opened, and for exercising the fail-soft paths of
/// [`LocalStore`](crate::LocalStore).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

impl NoopStorage {
    /// Create a disabled backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StorageBackend for NoopStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        trace!("NoopStorage: get_item called, storage disabled");
        Err(StorageError::Disabled)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        trace!("NoopStorage: set_item called, storage disabled");
        Err(StorageError::Disabled)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        trace!("NoopStorage: remove_item called, storage disabled");
        Err(StorageError::Disabled)
    }
}
