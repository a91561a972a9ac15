use terminal_core::{
    Domain, HttpRequest, NewWatchlistEntry, Result, Symbol, Watchlist, WatchlistEntry,
};
use tokio_util::sync::CancellationToken;

use crate::request::{Api, Deadline, json_body};

impl Api {
    /// The user's watchlist.
    ///
    /// # Errors
    /// Any shared failure.
    pub async fn watchlist(&self, cancel: Option<&CancellationToken>) -> Result<Watchlist> {
        let url = self.endpoint(&["watchlist"], &[])?;
        self.fetch(Domain::Watchlist, None, HttpRequest::get(url), Deadline::Quick, cancel)
            .await
    }

    /// Add a symbol to the watchlist.
    ///
    /// # Errors
    /// `WATCHLIST_ALREADY_EXISTS` if the symbol is already listed, or any
    /// shared failure.
    pub async fn add_to_watchlist(
        &self,
        entry: &NewWatchlistEntry,
        cancel: Option<&CancellationToken>,
    ) -> Result<WatchlistEntry> {
        let url = self.endpoint(&["watchlist"], &[])?;
        let body = json_body(Domain::Watchlist, entry)?;
        let response = self
            .execute(
                Domain::Watchlist,
                Some(&entry.symbol),
                HttpRequest::post(url, body),
                Deadline::Quick,
                cancel,
            )
            .await?;

        // Some backends only acknowledge the write.
        Ok(response.json().unwrap_or_else(|_| WatchlistEntry {
            symbol: entry.symbol.clone(),
            group: entry.group.clone(),
            added_at: None,
            notes: entry.notes.clone(),
        }))
    }

    /// Remove a symbol from the watchlist.
    ///
    /// # Errors
    /// `WATCHLIST_NOT_FOUND` if the symbol is not listed, or any shared
    /// failure.
    pub async fn remove_from_watchlist(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let url = self.endpoint(&["watchlist", symbol.as_str()], &[])?;
        self.execute(
            Domain::Watchlist,
            Some(symbol),
            HttpRequest::delete(url),
            Deadline::Quick,
            cancel,
        )
        .await?;
        Ok(())
    }
}
