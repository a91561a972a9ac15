//! Canonical shapes for cached payloads.
//!
//! Backends are loose about ordering and derived fields. Everything stored
//! in the cache goes through [`Normalize`] first so every reader sees the
//! same shape.

use std::cmp::Ordering;
use terminal_core::{
    Analysis, Fundamentals, InsiderActivity, MacroCalendar, NewsFeed, Ownership, PriceHistory,
    Quote, ScanResult, Watchlist,
};

/// Bring a payload into its canonical shape.
pub trait Normalize: Sized {
    /// Consume and return the normalized payload.
    #[must_use]
    fn normalize(self) -> Self;
}

/// `None` sorts after every value.
fn desc_nones_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Normalize for Quote {
    fn normalize(mut self) -> Self {
        if self.change.is_none() {
            self.change = self.previous_close.map(|prev| self.price - prev);
        }
        if self.change_percent.is_none() {
            self.change_percent = match (self.change, self.previous_close) {
                (Some(change), Some(prev)) if prev != 0.0 => Some(change / prev * 100.0),
                _ => None,
            };
        }
        self
    }
}

impl Normalize for PriceHistory {
    /// Oldest bar first, one bar per date.
    fn normalize(mut self) -> Self {
        self.bars.sort_by(|a, b| a.date.cmp(&b.date));
        self.bars.dedup_by(|later, earlier| later.date == earlier.date);
        self
    }
}

impl Normalize for NewsFeed {
    /// Newest article first; undated articles last.
    fn normalize(mut self) -> Self {
        self.articles
            .sort_by(|a, b| desc_nones_last(a.published_at, b.published_at));
        self
    }
}

impl Normalize for Fundamentals {
    fn normalize(self) -> Self {
        self
    }
}

impl Normalize for Ownership {
    /// Largest holder first.
    fn normalize(mut self) -> Self {
        self.holders
            .sort_by(|a, b| b.shares.partial_cmp(&a.shares).unwrap_or(Ordering::Equal));
        self
    }
}

impl Normalize for InsiderActivity {
    /// Newest transaction first.
    fn normalize(mut self) -> Self {
        self.transactions
            .sort_by(|a, b| desc_nones_last(a.date, b.date));
        self
    }
}

impl Normalize for Analysis {
    fn normalize(self) -> Self {
        self
    }
}

impl Normalize for Watchlist {
    fn normalize(mut self) -> Self {
        self.count = self.tickers.len();
        self
    }
}

impl Normalize for MacroCalendar {
    /// Chronological; events without a time sort first within a day.
    fn normalize(mut self) -> Self {
        self.events
            .sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        self
    }
}

impl Normalize for ScanResult {
    /// Best score first.
    fn normalize(mut self) -> Self {
        self.matches
            .sort_by(|a, b| desc_nones_last(a.score, b.score));
        self.count = self.matches.len();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use terminal_core::{MacroEvent, NewsArticle, PriceBar, ScanMatch, Symbol, WatchlistEntry};

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: date.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_quote_derives_change() {
        let mut quote = Quote::new("AAPL", 110.0);
        quote.previous_close = Some(100.0);
        let quote = quote.normalize();
        assert_eq!(quote.change, Some(10.0));
        assert_eq!(quote.change_percent, Some(10.0));

        // Reported values win.
        let mut quote = Quote::new("AAPL", 110.0);
        quote.previous_close = Some(100.0);
        quote.change_percent = Some(9.5);
        assert_eq!(quote.normalize().change_percent, Some(9.5));
    }

    #[test]
    fn test_history_sorted_and_deduplicated() {
        let history = PriceHistory {
            symbol: Symbol::new("AAPL"),
            timeframe: Default::default(),
            bars: vec![bar("2024-06-05", 3.0), bar("2024-06-03", 1.0), bar("2024-06-05", 3.0)],
        }
        .normalize();
        let dates: Vec<_> = history.bars.iter().map(|b| b.date.as_str()).collect();
        assert_eq!(dates, ["2024-06-03", "2024-06-05"]);
    }

    #[test]
    fn test_news_newest_first() {
        let article = |title: &str, day: Option<u32>| NewsArticle {
            title: title.to_string(),
            url: None,
            source: None,
            published_at: day.map(|d| Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()),
            summary: None,
            sentiment: None,
        };
        let feed = NewsFeed {
            symbol: Symbol::new("AAPL"),
            articles: vec![
                article("old", Some(1)),
                article("undated", None),
                article("new", Some(9)),
            ],
        }
        .normalize();
        let titles: Vec<_> = feed.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["new", "old", "undated"]);
    }

    #[test]
    fn test_macro_chronological() {
        let event = |day: u32, name: &str| MacroEvent {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            time: None,
            country: None,
            event: name.to_string(),
            importance: None,
            actual: None,
            forecast: None,
            previous: None,
        };
        let calendar = MacroCalendar {
            events: vec![event(14, "FOMC"), event(12, "CPI")],
        }
        .normalize();
        assert_eq!(calendar.events[0].event, "CPI");
    }

    #[test]
    fn test_scan_sorted_with_count() {
        let hit = |symbol: &str, score: Option<f64>| ScanMatch {
            symbol: Symbol::new(symbol),
            price: None,
            change_percent: None,
            volume: None,
            score,
        };
        let result = ScanResult {
            matches: vec![hit("A", Some(1.0)), hit("B", None), hit("C", Some(5.0))],
            count: 0,
        }
        .normalize();
        let order: Vec<_> = result.matches.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(order, ["C", "A", "B"]);
        assert_eq!(result.count, 3);
    }

    #[test]
    fn test_watchlist_count_matches_entries() {
        let list = Watchlist {
            tickers: vec![WatchlistEntry::new("MSFT"), WatchlistEntry::new("AAPL")],
            count: 7,
        }
        .normalize();
        assert_eq!(list.count, 2);
    }
}
