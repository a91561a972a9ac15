#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/terminal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the terminal client.
//!
//! This crate provides the foundational abstractions shared by the cache,
//! transport, and client crates:
//!
//! - [`ClientError`](error::ClientError) - Typed error taxonomy with stable codes
//! - [`HttpTransport`](transport::HttpTransport) - Seam between orchestrators and HTTP
//! - [`ClientConfig`](config::ClientConfig) - URLs, TTLs, and tunables
//! - [`Clock`](clock::Clock) - Time source for every expiry decision
//! - [`HealthSnapshot`](health::HealthSnapshot) - System health model

/// Time source abstraction.
pub mod clock;
/// Client configuration.
pub mod config;
/// Error types for backend operations.
pub mod error;
/// System health snapshot types.
pub mod health;
/// HTTP transport abstraction.
pub mod transport;
/// Core data types (Symbol, Quote, Watchlist, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheTtls, ClientConfig, ConfigError, HealthConfig, RequestTimeouts};
pub use error::{ClientError, Domain, ErrorCode, Result};
pub use health::{
    ApiHealth, BackendStatus, DatabaseHealth, HealthResponse, HealthSnapshot, ServiceHealth,
    ServiceStatus, StatusSummary,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
pub use types::{
    Analysis, AnalysisRequest, Fundamentals, InsiderActivity, InsiderTransaction,
    InstitutionalHolder, MacroCalendar, MacroEvent, NewWatchlistEntry, NewsArticle, NewsFeed,
    Ownership, PriceBar, PriceHistory, Quote, ScanCriteria, ScanMatch, ScanResult, Symbol,
    Timeframe, Watchlist, WatchlistEntry,
};
