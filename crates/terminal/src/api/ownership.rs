use terminal_core::{Domain, HttpRequest, InsiderActivity, Ownership, Result, Symbol};
use tokio_util::sync::CancellationToken;

use super::fill_symbol;
use crate::request::{Api, Deadline};

impl Api {
    /// Institutional ownership of `symbol`.
    ///
    /// # Errors
    /// `OWNERSHIP_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn ownership(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<Ownership> {
        let url = self.endpoint(&["ownership", symbol.as_str()], &[])?;
        let mut ownership: Ownership = self
            .fetch(Domain::Ownership, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut ownership.symbol, symbol);
        Ok(ownership)
    }

    /// Insider transactions in `symbol`.
    ///
    /// # Errors
    /// `OWNERSHIP_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn insider_activity(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<InsiderActivity> {
        let url = self.endpoint(&["ownership", symbol.as_str(), "insider"], &[])?;
        let mut activity: InsiderActivity = self
            .fetch(Domain::Ownership, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut activity.symbol, symbol);
        Ok(activity)
    }
}
