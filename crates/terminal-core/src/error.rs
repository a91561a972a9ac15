//! Error types for backend operations.
//!
//! This module defines [`ClientError`], the only error type that escapes the
//! fetch orchestrators, together with the stable machine-readable
//! [`ErrorCode`] callers branch on instead of parsing messages.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Symbol;

/// Data domain a request belongs to.
///
/// Used as the prefix of domain-scoped error codes (`TICKER_NOT_FOUND`,
/// `WATCHLIST_ALREADY_EXISTS`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Quotes and price history.
    Ticker,
    /// AI analysis results.
    Analysis,
    /// The user's watchlist.
    Watchlist,
    /// Company news.
    News,
    /// Company fundamentals.
    Fundamentals,
    /// Institutional ownership and insider activity.
    Ownership,
    /// Macro-economic calendar.
    Macro,
    /// Market scanner.
    Scan,
    /// Backend health endpoint.
    Health,
}

impl Domain {
    /// Upper-case prefix used in error codes.
    #[must_use]
    pub const fn code_prefix(self) -> &'static str {
        match self {
            Self::Ticker => "TICKER",
            Self::Analysis => "ANALYSIS",
            Self::Watchlist => "WATCHLIST",
            Self::News => "NEWS",
            Self::Fundamentals => "FUNDAMENTALS",
            Self::Ownership => "OWNERSHIP",
            Self::Macro => "MACRO",
            Self::Scan => "SCAN",
            Self::Health => "HEALTH",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code_prefix().to_lowercase())
    }
}

/// Stable, machine-readable error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The last health probe reported the backend as unreachable.
    BackendUnavailable,
    /// HTTP 404 for the given domain.
    NotFound(Domain),
    /// HTTP 409 for the given domain.
    AlreadyExists(Domain),
    /// HTTP 503.
    ServiceUnavailable,
    /// Any other non-success HTTP status for the given domain.
    RequestFailed(Domain),
    /// The request ran past its internal deadline.
    RequestTimeout,
    /// The caller cancelled the request.
    RequestCancelled,
    /// Transport-level failure.
    NetworkError,
    /// Anything else, including undecodable responses.
    UnknownError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable => f.write_str("BACKEND_UNAVAILABLE"),
            Self::NotFound(d) => write!(f, "{}_NOT_FOUND", d.code_prefix()),
            Self::AlreadyExists(d) => write!(f, "{}_ALREADY_EXISTS", d.code_prefix()),
            Self::ServiceUnavailable => f.write_str("SERVICE_UNAVAILABLE"),
            Self::RequestFailed(d) => write!(f, "{}_REQUEST_FAILED", d.code_prefix()),
            Self::RequestTimeout => f.write_str("REQUEST_TIMEOUT"),
            Self::RequestCancelled => f.write_str("REQUEST_CANCELLED"),
            Self::NetworkError => f.write_str("NETWORK_ERROR"),
            Self::UnknownError => f.write_str("UNKNOWN_ERROR"),
        }
    }
}

impl PartialEq<&str> for ErrorCode {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Errors returned by backend operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The health monitor last saw the backend as unreachable.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The requested resource does not exist.
    #[error("{domain} not found{}", fmt_symbol(.symbol))]
    NotFound {
        /// Domain of the request.
        domain: Domain,
        /// Symbol the request was about, if any.
        symbol: Option<Symbol>,
    },

    /// The resource already exists (e.g. adding a ticker twice).
    #[error("{domain} already exists{}", fmt_symbol(.symbol))]
    AlreadyExists {
        /// Domain of the request.
        domain: Domain,
        /// Symbol the request was about, if any.
        symbol: Option<Symbol>,
    },

    /// The backend answered 503.
    #[error("Service unavailable ({domain})")]
    ServiceUnavailable {
        /// Domain of the request.
        domain: Domain,
    },

    /// The backend answered with an unexpected status.
    #[error("{domain} request failed with HTTP {status}")]
    RequestFailed {
        /// Domain of the request.
        domain: Domain,
        /// HTTP status code.
        status: u16,
        /// Symbol the request was about, if any.
        symbol: Option<Symbol>,
        /// Response body or other context.
        details: Option<String>,
    },

    /// The request ran past its deadline.
    #[error("{domain} request timed out after {after:?}")]
    Timeout {
        /// Domain of the request.
        domain: Domain,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The request was cancelled by the caller.
    #[error("{domain} request cancelled")]
    Cancelled {
        /// Domain of the request.
        domain: Domain,
    },

    /// Transport failure (DNS, connection refused, reset, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Any other error, e.g. a response body that could not be decoded.
    #[error("{0}")]
    Unknown(String),
}

fn fmt_symbol(symbol: &Option<Symbol>) -> String {
    symbol.as_ref().map(|s| format!(": {s}")).unwrap_or_default()
}

impl ClientError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BackendUnavailable(_) => ErrorCode::BackendUnavailable,
            Self::NotFound { domain, .. } => ErrorCode::NotFound(*domain),
            Self::AlreadyExists { domain, .. } => ErrorCode::AlreadyExists(*domain),
            Self::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            Self::RequestFailed { domain, .. } => ErrorCode::RequestFailed(*domain),
            Self::Timeout { .. } => ErrorCode::RequestTimeout,
            Self::Cancelled { .. } => ErrorCode::RequestCancelled,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    /// HTTP status associated with this error, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::AlreadyExists { .. } => Some(409),
            Self::ServiceUnavailable { .. } => Some(503),
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Symbol the failing request was about, if any.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::NotFound { symbol, .. }
            | Self::AlreadyExists { symbol, .. }
            | Self::RequestFailed { symbol, .. } => symbol.as_ref(),
            _ => None,
        }
    }

    /// Free-form details, if any were captured.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::RequestFailed { details, .. } => details.as_deref(),
            Self::BackendUnavailable(msg) | Self::Network(msg) | Self::Unknown(msg) => {
                Some(msg.as_str())
            }
            _ => None,
        }
    }

    /// True for "data temporarily unavailable, will retry" conditions.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_)
                | Self::ServiceUnavailable { .. }
                | Self::Network(_)
                | Self::Timeout { .. }
        )
    }

    /// True when the backend definitively has nothing for the request.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the write was already applied; callers treat it as a no-op.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;
