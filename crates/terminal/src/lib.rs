#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/terminal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Resilient client for the market terminal backend.
//!
//! This crate wires the resilience layer together and re-exports the core
//! types, the cache and the default transport. Most applications only need
//! [`TerminalClient`]:
//!
//! - [`HealthMonitor`] - Probes the backend and gates every request
//! - [`Api`] - One orchestrator per backend operation, with deadlines,
//!   cancellation and typed errors
//! - [`CachedApi`] - Cache-first reads with per-domain TTLs
//! - [`watchlist_with_local_fallback`] - Watchlist that survives outages
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed [`LocalStore`] (enabled by default)
//!
//! # Example
//!
//! ```rust,ignore
//! use terminal::{ClientConfig, Symbol, TerminalClient, Timeframe};
//!
//! #[tokio::main]
//! async fn main() -> terminal::Result<()> {
//!     let client = TerminalClient::new(ClientConfig::from_env());
//!     client.start_health_polling();
//!
//!     let history = client.history(&Symbol::new("AAPL"), Timeframe::OneYear).await?;
//!     println!("{} bars", history.bars.len());
//!
//!     let watchlist = client.watchlist().await?;
//!     if watchlist.is_offline {
//!         println!("showing watchlist from {:?}", watchlist.synced_at);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use terminal_core::*;

// Cache and local storage
#[cfg(feature = "sqlite")]
pub use terminal_cache::SqliteStorage;
pub use terminal_cache::{
    CacheEntry, CacheStats, CacheStore, CachedAnalysis, CleanupTask, DEFAULT_TTL, LocalStore,
    Loaded, MAX_COMMAND_HISTORY, MemoryStorage, NoopStorage, StorageBackend, StorageError, Theme,
    UserPreferences, keys,
};

// Transport
pub use terminal_http::ReqwestTransport;

mod api;
mod cached;
mod client;
mod health;
mod normalize;
mod offline;
mod request;
#[cfg(test)]
mod testing;

pub use cached::{CacheOptions, CachedApi, get_with_cache};
pub use client::{TerminalClient, TerminalClientBuilder};
pub use health::{HealthMonitor, Subscription};
pub use normalize::Normalize;
pub use offline::{WatchlistView, watchlist_with_local_fallback};
pub use request::Api;
