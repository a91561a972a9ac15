use terminal_core::{Analysis, AnalysisRequest, Domain, HttpRequest, Result, Symbol};
use tokio_util::sync::CancellationToken;

use super::fill_symbol;
use crate::request::{Api, Deadline, json_body};

impl Api {
    /// The backend's stored analysis for `symbol`.
    ///
    /// # Errors
    /// `ANALYSIS_NOT_FOUND` when no analysis has been run, or any shared
    /// failure.
    pub async fn analysis(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<Analysis> {
        let url = self.endpoint(&["analysis", symbol.as_str()], &[])?;
        let mut analysis: Analysis = self
            .fetch(Domain::Analysis, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut analysis.symbol, symbol);
        Ok(analysis)
    }

    /// Run a fresh analysis for `symbol`.
    ///
    /// Runs under the long analysis deadline.
    ///
    /// # Errors
    /// Any shared failure.
    pub async fn trigger_analysis(
        &self,
        symbol: &Symbol,
        request: &AnalysisRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Analysis> {
        let url = self.endpoint(&["analysis", symbol.as_str()], &[])?;
        let body = json_body(Domain::Analysis, request)?;
        let mut analysis: Analysis = self
            .fetch(
                Domain::Analysis,
                Some(symbol),
                HttpRequest::post(url, body),
                Deadline::Analysis,
                cancel,
            )
            .await?;
        fill_symbol(&mut analysis.symbol, symbol);
        Ok(analysis)
    }
}
