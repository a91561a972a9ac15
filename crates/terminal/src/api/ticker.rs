use terminal_core::{Domain, HttpRequest, PriceHistory, Quote, Result, Symbol, Timeframe};
use tokio_util::sync::CancellationToken;

use super::fill_symbol;
use crate::request::{Api, Deadline};

impl Api {
    /// Latest quote for `symbol`.
    ///
    /// # Errors
    /// `TICKER_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn quote(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<Quote> {
        let url = self.endpoint(&["ticker", symbol.as_str()], &[])?;
        let mut quote: Quote = self
            .fetch(Domain::Ticker, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut quote.symbol, symbol);
        Ok(quote)
    }

    /// Price history for `symbol` over `timeframe`.
    ///
    /// # Errors
    /// `TICKER_NOT_FOUND` for an unknown symbol, or any shared failure.
    pub async fn history(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        cancel: Option<&CancellationToken>,
    ) -> Result<PriceHistory> {
        let url = self.endpoint(
            &["ticker", symbol.as_str(), "history"],
            &[("timeframe", timeframe.as_str().to_string())],
        )?;
        let mut history: PriceHistory = self
            .fetch(Domain::Ticker, Some(symbol), HttpRequest::get(url), Deadline::Read, cancel)
            .await?;
        fill_symbol(&mut history.symbol, symbol);
        history.timeframe = timeframe;
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{ScriptedTransport, api_with};
    use terminal_core::{Method, Symbol, Timeframe};

    #[tokio::test]
    async fn test_quote_request_and_decode() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"symbol":"aapl","price":190.5,"change":1.5}"#);
        let (api, _) = api_with(transport.clone());

        let quote = api.quote(&Symbol::new("aapl"), None).await.unwrap();
        assert_eq!(quote.symbol.as_str(), "AAPL");
        assert_eq!(quote.price, 190.5);

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "http://localhost:8000/api/ticker/AAPL");
    }

    #[tokio::test]
    async fn test_unknown_ticker() {
        let transport = ScriptedTransport::new();
        transport.reply(404, r#"{"detail":"not found"}"#);
        let (api, _) = api_with(transport);

        let err = api.quote(&Symbol::new("zzzz"), None).await.unwrap_err();
        assert_eq!(err.code(), "TICKER_NOT_FOUND");
        assert_eq!(err.symbol(), Some(&Symbol::new("ZZZZ")));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_history_fills_symbol_and_timeframe() {
        let transport = ScriptedTransport::new();
        transport.reply(
            200,
            r#"{"data":[{"date":"2024-06-03","open":1,"high":2,"low":0.5,"close":1.5,"volume":100}]}"#,
        );
        let (api, _) = api_with(transport.clone());

        let history = api
            .history(&Symbol::new("msft"), Timeframe::ThreeMonths, None)
            .await
            .unwrap();
        assert_eq!(history.symbol.as_str(), "MSFT");
        assert_eq!(history.timeframe, Timeframe::ThreeMonths);
        assert_eq!(history.bars.len(), 1);
        assert_eq!(
            transport.requests()[0].url,
            "http://localhost:8000/api/ticker/MSFT/history?timeframe=3M"
        );
    }
}
