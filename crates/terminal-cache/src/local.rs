//! Durable local store.
//!
//! [`LocalStore`] is a typed JSON façade over a [`StorageBackend`]. Every
//! operation is total: reads fall back to a caller-supplied default and
//! writes report a success flag. A storage fault degrades the terminal to
//! "nothing cached" and is only ever logged.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "sqlite")]
use std::path::Path;
use std::sync::Arc;
use terminal_core::{Clock, Symbol, SystemClock, WatchlistEntry};
use tracing::{debug, warn};

#[cfg(feature = "sqlite")]
use crate::noop::NoopStorage;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteStorage;
use crate::storage::StorageBackend;

/// Names of the persisted records.
pub mod keys {
    /// Last synced watchlist.
    pub const WATCHLIST: &str = "watchlist";
    /// Time of the last watchlist sync.
    pub const WATCHLIST_SYNCED_AT: &str = "watchlist_synced_at";
    /// User preferences.
    pub const USER_PREFERENCES: &str = "user_preferences";
    /// Last viewed symbol.
    pub const LAST_SYMBOL: &str = "last_symbol";
    /// Command line history.
    pub const COMMAND_HISTORY: &str = "command_history";
    /// Colour theme.
    pub const THEME: &str = "theme";
    /// Panel layout.
    pub const LAYOUT_CONFIG: &str = "layout_config";
    /// Cached analyses, keyed by symbol.
    pub const ANALYSES_CACHE: &str = "analyses_cache";

    /// Every record, in the order they are cleared.
    pub const ALL: [&str; 8] = [
        WATCHLIST,
        WATCHLIST_SYNCED_AT,
        USER_PREFERENCES,
        LAST_SYMBOL,
        COMMAND_HISTORY,
        THEME,
        LAYOUT_CONFIG,
        ANALYSES_CACHE,
    ];

    /// Sentinel written by the availability probe.
    pub(crate) const PROBE: &str = "__storage_test__";
}

/// Maximum number of commands kept in history.
pub const MAX_COMMAND_HISTORY: usize = 50;

/// Outcome of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<T> {
    /// The value was read and decoded.
    Stored(T),
    /// Nothing usable was stored; this is the caller's default.
    Fallback(T),
}

impl<T> Loaded<T> {
    /// The value, regardless of where it came from.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Stored(v) | Self::Fallback(v) => v,
        }
    }

    /// True when the value came from storage.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

/// Colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark theme.
    #[default]
    Dark,
    /// Light theme.
    Light,
}

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
    /// Symbol opened on start.
    pub default_symbol: Option<Symbol>,
    /// Chart timeframe opened on start.
    pub default_timeframe: String,
    /// Quote refresh cadence in seconds.
    pub refresh_interval_secs: u64,
    /// Show extended-hours prices.
    pub show_extended_hours: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_symbol: None,
            default_timeframe: "1M".to_string(),
            refresh_interval_secs: 30,
            show_extended_hours: false,
        }
    }
}

/// An analysis persisted with its own expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAnalysis<T> {
    /// Symbol the analysis is for.
    pub symbol: Symbol,
    /// Analysis payload.
    pub data: T,
    /// When it was stored.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
    /// When it stops being served.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

type AnalysesRecord = HashMap<String, CachedAnalysis<serde_json::Value>>;

/// Typed, fail-soft persistence for the terminal's local state.
#[derive(Debug, Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Wrap a backend, using the system clock.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// Wrap a backend driven by `clock`.
    #[must_use]
    pub fn with_clock(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Open SQLite storage at `path`.
    ///
    /// If the database cannot be opened the store is created over
    /// [`NoopStorage`], so callers always get a usable (if empty) store.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        match SqliteStorage::new(path.as_ref()) {
            Ok(storage) => Self::new(Arc::new(storage)),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "Local storage unavailable");
                Self::new(Arc::new(NoopStorage::new()))
            }
        }
    }

    /// Probe the backend by writing and removing a sentinel key.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.set_item(keys::PROBE, keys::PROBE).is_ok()
            && self.backend.remove_item(keys::PROBE).is_ok()
    }

    /// Read and decode `key`, or fall back to `default`.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> Loaded<T> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Loaded::Fallback(default),
            Err(e) => {
                warn!(key, error = %e, "Failed to read local storage");
                return Loaded::Fallback(default);
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Loaded::Stored(value),
            Err(e) => {
                warn!(key, error = %e, "Failed to decode local storage value");
                Loaded::Fallback(default)
            }
        }
    }

    /// Read and decode `key`, or return `default`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.load(key, default).into_inner()
    }

    /// Encode and write `value`. Returns whether it was stored.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode local storage value");
                return false;
            }
        };

        match self.backend.set_item(key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to write local storage");
                false
            }
        }
    }

    /// Delete `key`. Returns whether the backend accepted the delete.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to remove local storage value");
                false
            }
        }
    }

    /// Remove every terminal record. Returns whether all removals succeeded.
    pub fn clear_all_storage(&self) -> bool {
        let cleared = keys::ALL
            .iter()
            .map(|key| self.remove(key))
            .fold(true, |acc, ok| acc && ok);
        debug!(cleared, "Cleared local storage");
        cleared
    }

    // ------------------------------------------------------------------
    // Watchlist mirror
    // ------------------------------------------------------------------

    /// The last synced watchlist; empty if none.
    #[must_use]
    pub fn watchlist(&self) -> Vec<WatchlistEntry> {
        self.get(keys::WATCHLIST, Vec::new())
    }

    /// Replace the mirrored watchlist and stamp the sync time.
    ///
    /// The mirror is overwritten wholesale, never merged.
    pub fn save_watchlist(&self, entries: &[WatchlistEntry]) -> bool {
        self.set(keys::WATCHLIST, entries)
            && self.set(keys::WATCHLIST_SYNCED_AT, &self.clock.now())
    }

    /// When the mirror was last written.
    #[must_use]
    pub fn watchlist_synced_at(&self) -> Option<DateTime<Utc>> {
        self.get(keys::WATCHLIST_SYNCED_AT, None)
    }

    /// Symbols in the mirrored watchlist.
    #[must_use]
    pub fn watchlist_symbols(&self) -> Vec<Symbol> {
        self.watchlist().into_iter().map(|e| e.symbol).collect()
    }

    /// Whether the mirrored watchlist contains `symbol`.
    #[must_use]
    pub fn is_in_watchlist(&self, symbol: &Symbol) -> bool {
        self.watchlist().iter().any(|e| &e.symbol == symbol)
    }

    // ------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------

    /// Stored preferences, or defaults.
    #[must_use]
    pub fn preferences(&self) -> UserPreferences {
        self.get(keys::USER_PREFERENCES, UserPreferences::default())
    }

    /// Persist preferences.
    pub fn save_preferences(&self, preferences: &UserPreferences) -> bool {
        self.set(keys::USER_PREFERENCES, preferences)
    }

    /// Last viewed symbol.
    #[must_use]
    pub fn last_symbol(&self) -> Option<Symbol> {
        self.get(keys::LAST_SYMBOL, None)
    }

    /// Remember the last viewed symbol.
    pub fn set_last_symbol(&self, symbol: &Symbol) -> bool {
        self.set(keys::LAST_SYMBOL, symbol)
    }

    /// Colour theme.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.get(keys::THEME, Theme::default())
    }

    /// Persist the colour theme.
    pub fn set_theme(&self, theme: Theme) -> bool {
        self.set(keys::THEME, &theme)
    }

    /// Opaque panel layout.
    #[must_use]
    pub fn layout_config(&self) -> Option<serde_json::Value> {
        self.get(keys::LAYOUT_CONFIG, None)
    }

    /// Persist the panel layout.
    pub fn set_layout_config(&self, layout: &serde_json::Value) -> bool {
        self.set(keys::LAYOUT_CONFIG, layout)
    }

    /// Command history, oldest first.
    #[must_use]
    pub fn command_history(&self) -> Vec<String> {
        self.get(keys::COMMAND_HISTORY, Vec::new())
    }

    /// Append a command, skipping blanks and immediate repeats and keeping
    /// the newest [`MAX_COMMAND_HISTORY`] entries.
    pub fn push_command(&self, command: &str) -> bool {
        let command = command.trim();
        if command.is_empty() {
            return false;
        }

        let mut history = self.command_history();
        if history.last().map(String::as_str) == Some(command) {
            return true;
        }
        history.push(command.to_string());
        if history.len() > MAX_COMMAND_HISTORY {
            let excess = history.len() - MAX_COMMAND_HISTORY;
            history.drain(..excess);
        }
        self.set(keys::COMMAND_HISTORY, &history)
    }

    // ------------------------------------------------------------------
    // Cached analyses
    // ------------------------------------------------------------------

    fn analyses(&self) -> AnalysesRecord {
        self.get(keys::ANALYSES_CACHE, HashMap::new())
    }

    /// A cached analysis that has not expired.
    ///
    /// An expired entry is deleted from storage by this read.
    #[must_use]
    pub fn cached_analysis<T: DeserializeOwned>(&self, symbol: &Symbol) -> Option<T> {
        let mut record = self.analyses();
        let entry = record.get(symbol.as_str())?;

        if self.clock.now() > entry.expires_at {
            record.remove(symbol.as_str());
            self.set(keys::ANALYSES_CACHE, &record);
            debug!(symbol = %symbol, "Dropped expired cached analysis");
            return None;
        }

        match serde_json::from_value(entry.data.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to decode cached analysis");
                None
            }
        }
    }

    /// Persist an analysis for `ttl_minutes`.
    pub fn cache_analysis<T: Serialize>(
        &self,
        symbol: &Symbol,
        data: &T,
        ttl_minutes: u32,
    ) -> bool {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to encode analysis");
                return false;
            }
        };

        let now = self.clock.now();
        let ttl = TimeDelta::milliseconds(i64::from(ttl_minutes) * 60_000);
        let mut record = self.analyses();
        record.insert(
            symbol.as_str().to_string(),
            CachedAnalysis {
                symbol: symbol.clone(),
                data,
                cached_at: now,
                expires_at: now + ttl,
            },
        );
        self.set(keys::ANALYSES_CACHE, &record)
    }

    /// Drop one cached analysis.
    pub fn remove_cached_analysis(&self, symbol: &Symbol) -> bool {
        let mut record = self.analyses();
        if record.remove(symbol.as_str()).is_none() {
            return true;
        }
        self.set(keys::ANALYSES_CACHE, &record)
    }

    /// Symbols with a cached analysis, expired or not, sorted.
    #[must_use]
    pub fn cached_analysis_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.analyses().into_keys().map(Symbol::new).collect();
        symbols.sort();
        symbols
    }

    /// Delete every expired analysis. Returns how many were removed.
    pub fn purge_expired_analyses(&self) -> usize {
        let now = self.clock.now();
        let mut record = self.analyses();
        let before = record.len();
        record.retain(|_, entry| now <= entry.expires_at);
        let removed = before - record.len();
        if removed > 0 {
            self.set(keys::ANALYSES_CACHE, &record);
        }
        removed
    }
}
