use chrono::NaiveDate;
use terminal_core::{Domain, HttpRequest, MacroCalendar, Result};
use tokio_util::sync::CancellationToken;

use crate::request::{Api, Deadline};

impl Api {
    /// Macro-economic events between `from` and `to`, inclusive.
    ///
    /// # Errors
    /// Any shared failure.
    pub async fn macro_calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        cancel: Option<&CancellationToken>,
    ) -> Result<MacroCalendar> {
        let url = self.endpoint(
            &["macro", "calendar"],
            &[("from", from.to_string()), ("to", to.to_string())],
        )?;
        self.fetch(Domain::Macro, None, HttpRequest::get(url), Deadline::Read, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{ScriptedTransport, api_with};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_calendar_range_query() {
        let transport = ScriptedTransport::new();
        transport.reply(
            200,
            r#"{"events":[{"date":"2024-06-12","event":"CPI","country":"US"}]}"#,
        );
        let (api, _) = api_with(transport.clone());

        let from = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let calendar = api.macro_calendar(from, to, None).await.unwrap();
        assert_eq!(calendar.events[0].event, "CPI");
        assert_eq!(
            transport.requests()[0].url,
            "http://localhost:8000/api/macro/calendar?from=2024-06-01&to=2024-06-30"
        );
    }
}
