#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/terminal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Cache key construction.
pub mod keys;
/// Typed durable store.
pub mod local;
/// In-memory TTL cache.
pub mod memory;
/// Disabled storage backend.
pub mod noop;
/// Storage backend trait and in-memory backend.
pub mod storage;

/// SQLite storage backend.
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use local::{CachedAnalysis, LocalStore, Loaded, MAX_COMMAND_HISTORY, Theme, UserPreferences};
pub use memory::{CacheEntry, CacheStats, CacheStore, CleanupTask, DEFAULT_TTL};
pub use noop::NoopStorage;
pub use storage::{MemoryStorage, StorageBackend, StorageError};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
