use terminal_core::{Domain, HttpRequest, Result, ScanCriteria, ScanResult};
use tokio_util::sync::CancellationToken;

use crate::request::{Api, Deadline, json_body};

impl Api {
    /// Run the market scanner.
    ///
    /// # Errors
    /// Any shared failure.
    pub async fn scan(
        &self,
        criteria: &ScanCriteria,
        cancel: Option<&CancellationToken>,
    ) -> Result<ScanResult> {
        let url = self.endpoint(&["scan"], &[])?;
        let body = json_body(Domain::Scan, criteria)?;
        self.fetch(Domain::Scan, None, HttpRequest::post(url, body), Deadline::Read, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{ScriptedTransport, api_with};
    use terminal_core::{Method, ScanCriteria};

    #[tokio::test]
    async fn test_scan_posts_criteria() {
        let transport = ScriptedTransport::new();
        transport.reply(
            200,
            r#"{"results":[{"symbol":"smci","score":9.1}],"count":1}"#,
        );
        let (api, _) = api_with(transport.clone());

        let criteria = ScanCriteria {
            preset: Some("gainers".into()),
            min_price: Some(5.0),
            ..Default::default()
        };
        let result = api.scan(&criteria, None).await.unwrap();
        assert_eq!(result.matches[0].symbol.as_str(), "SMCI");

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(
            sent.body,
            Some(serde_json::json!({"preset": "gainers", "min_price": 5.0}))
        );
    }

    #[tokio::test]
    async fn test_scan_cancelled_before_send() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"results":[]}"#);
        let (api, _) = api_with(transport);

        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let err = api
            .scan(&ScanCriteria::default(), Some(&token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "REQUEST_CANCELLED");
    }
}
