use terminal_core::{Domain, HttpRequest, NewsFeed, Result, Symbol};
use tokio_util::sync::CancellationToken;

use super::fill_symbol;
use crate::request::{Api, Deadline};

impl Api {
    /// Up to `limit` recent articles about `symbol`.
    ///
    /// # Errors
    /// `NEWS_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn news(
        &self,
        symbol: &Symbol,
        limit: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<NewsFeed> {
        let url = self.endpoint(&["news", symbol.as_str()], &[("limit", limit.to_string())])?;
        let mut feed: NewsFeed = self
            .fetch(Domain::News, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut feed.symbol, symbol);
        Ok(feed)
    }
}
