use terminal_core::{Domain, Fundamentals, HttpRequest, Result, Symbol};
use tokio_util::sync::CancellationToken;

use super::fill_symbol;
use crate::request::{Api, Deadline};

impl Api {
    /// Company profile and key ratios for `symbol`.
    ///
    /// # Errors
    /// `FUNDAMENTALS_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn fundamentals(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<Fundamentals> {
        let url = self.endpoint(&["fundamentals", symbol.as_str()], &[])?;
        let mut fundamentals: Fundamentals = self
            .fetch(
                Domain::Fundamentals,
                Some(symbol),
                HttpRequest::get(url),
                Deadline::Read,
                cancel,
            )
            .await?;
        fill_symbol(&mut fundamentals.symbol, symbol);
        Ok(fundamentals)
    }
}
