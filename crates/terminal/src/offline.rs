//! Offline continuity for the watchlist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use terminal_cache::LocalStore;
use terminal_core::{Result, Watchlist, WatchlistEntry};
use tracing::{debug, warn};

/// Watchlist as shown to the user, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistView {
    /// Entries in display order.
    pub tickers: Vec<WatchlistEntry>,
    /// Number of entries.
    pub count: usize,
    /// True when served from the local mirror because the backend failed.
    pub is_offline: bool,
    /// When the mirror was last written, for offline views.
    pub synced_at: Option<DateTime<Utc>>,
}

impl WatchlistView {
    /// An online view of `list`, stamped with the mirror's last sync time.
    pub(crate) fn online(list: Watchlist, store: &LocalStore) -> Self {
        Self {
            count: list.tickers.len(),
            tickers: list.tickers,
            is_offline: false,
            synced_at: store.watchlist_synced_at(),
        }
    }
}

/// Fetch the watchlist, falling back to the last synced copy.
///
/// A successful fetch replaces the local mirror wholesale. When the fetch
/// fails and the mirror holds entries, those are returned flagged
/// `is_offline`. Nothing is fabricated: with an empty mirror the fetch
/// error is returned.
///
/// # Errors
/// The fetch error, when there is no local copy to fall back to.
pub async fn watchlist_with_local_fallback<F, Fut>(
    store: &LocalStore,
    fetch: F,
) -> Result<WatchlistView>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Watchlist>>,
{
    match fetch().await {
        Ok(list) => {
            if !store.save_watchlist(&list.tickers) {
                debug!("Watchlist mirror not updated");
            }
            Ok(WatchlistView::online(list, store))
        }
        Err(e) => {
            let mirror = store.watchlist();
            if mirror.is_empty() {
                return Err(e);
            }
            warn!(error = %e, entries = mirror.len(), "Serving watchlist from local mirror");
            Ok(WatchlistView {
                count: mirror.len(),
                tickers: mirror,
                is_offline: true,
                synced_at: store.watchlist_synced_at(),
            })
        }
    }
}
