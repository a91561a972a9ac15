//! Core data types exchanged with the terminal backend.
//!
//! This module defines the domain payloads the orchestrators decode:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`Quote`] and [`PriceHistory`] - Ticker quotes and bars per [`Timeframe`]
//! - [`NewsFeed`] - Company news
//! - [`Fundamentals`] - Key metrics and company profile
//! - [`Ownership`] and [`InsiderActivity`] - Holder and insider data
//! - [`Analysis`] - AI analysis results
//! - [`WatchlistEntry`] and [`Watchlist`] - The user's watchlist
//! - [`MacroCalendar`] - Economic calendar events
//! - [`ScanCriteria`] and [`ScanResult`] - Market scanner
//!
//! Field names accept both the backend's snake_case and camelCase spellings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trading symbol/ticker.
///
/// Symbols are trimmed and uppercased on creation, so every cache key and
/// storage key derived from a symbol is byte-identical regardless of how the
/// caller typed it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty symbol a payload gets when the backend omits it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Real-time quote for a ticker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Last traded price.
    pub price: f64,
    /// Absolute change versus the previous close.
    #[serde(default)]
    pub change: Option<f64>,
    /// Percentage change versus the previous close.
    #[serde(default, alias = "changePercent")]
    pub change_percent: Option<f64>,
    /// Session volume.
    #[serde(default)]
    pub volume: Option<f64>,
    /// Market capitalization.
    #[serde(default, alias = "marketCap")]
    pub market_cap: Option<f64>,
    /// Session open.
    #[serde(default)]
    pub open: Option<f64>,
    /// Session high.
    #[serde(default)]
    pub high: Option<f64>,
    /// Session low.
    #[serde(default)]
    pub low: Option<f64>,
    /// Previous session close.
    #[serde(default, alias = "previousClose")]
    pub previous_close: Option<f64>,
    /// Company name, if the backend includes it.
    #[serde(default)]
    pub name: Option<String>,
    /// Quote time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Quote {
    /// Creates a quote with only the required fields set.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            ..Default::default()
        }
    }
}

/// Chart timeframe for price history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// One trading day.
    #[serde(rename = "1D")]
    OneDay,
    /// Five trading days.
    #[serde(rename = "5D")]
    FiveDays,
    /// One month.
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    /// Three months.
    #[serde(rename = "3M")]
    ThreeMonths,
    /// Six months.
    #[serde(rename = "6M")]
    SixMonths,
    /// Year to date.
    #[serde(rename = "YTD")]
    YearToDate,
    /// One year.
    #[serde(rename = "1Y")]
    OneYear,
    /// Five years.
    #[serde(rename = "5Y")]
    FiveYears,
}

impl Timeframe {
    /// Every timeframe, used for symbol-wide cache invalidation.
    pub const ALL: [Self; 8] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::YearToDate,
        Self::OneYear,
        Self::FiveYears,
    ];

    /// Wire representation used in query strings and cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::FiveDays => "5D",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::YearToDate => "YTD",
            Self::OneYear => "1Y",
            Self::FiveYears => "5Y",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Bar date or timestamp as reported by the backend.
    #[serde(alias = "timestamp", alias = "time")]
    pub date: String,
    /// Opening price.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Trading volume.
    #[serde(default)]
    pub volume: f64,
}

/// Price history for one symbol and timeframe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Requested timeframe.
    #[serde(default)]
    pub timeframe: Timeframe,
    /// Bars, oldest first once normalized.
    #[serde(default, alias = "data", alias = "history")]
    pub bars: Vec<PriceBar>,
}

/// A news article.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Headline.
    pub title: String,
    /// Link to the article.
    #[serde(default)]
    pub url: Option<String>,
    /// Publisher.
    #[serde(default)]
    pub source: Option<String>,
    /// Publication time.
    #[serde(default, alias = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    /// Short summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Sentiment label, if scored.
    #[serde(default)]
    pub sentiment: Option<String>,
}

/// News for one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsFeed {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Articles, newest first once normalized.
    #[serde(default, alias = "news", alias = "items")]
    pub articles: Vec<NewsArticle>,
}

/// Key fundamentals and company profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Company name.
    #[serde(default, alias = "companyName")]
    pub company_name: Option<String>,
    /// GICS sector.
    #[serde(default)]
    pub sector: Option<String>,
    /// Industry classification.
    #[serde(default)]
    pub industry: Option<String>,
    /// Market capitalization.
    #[serde(default, alias = "marketCap")]
    pub market_cap: Option<f64>,
    /// Price-to-earnings ratio.
    #[serde(default, alias = "peRatio")]
    pub pe_ratio: Option<f64>,
    /// Earnings per share (trailing twelve months).
    #[serde(default)]
    pub eps: Option<f64>,
    /// Trailing revenue.
    #[serde(default)]
    pub revenue: Option<f64>,
    /// Dividend yield.
    #[serde(default, alias = "dividendYield")]
    pub dividend_yield: Option<f64>,
    /// Beta versus the market.
    #[serde(default)]
    pub beta: Option<f64>,
    /// 52-week high.
    #[serde(default, alias = "fiftyTwoWeekHigh")]
    pub fifty_two_week_high: Option<f64>,
    /// 52-week low.
    #[serde(default, alias = "fiftyTwoWeekLow")]
    pub fifty_two_week_low: Option<f64>,
}

/// An institutional holder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalHolder {
    /// Holder name.
    #[serde(alias = "holder")]
    pub name: String,
    /// Shares held.
    #[serde(default)]
    pub shares: f64,
    /// Market value of the position.
    #[serde(default)]
    pub value: Option<f64>,
    /// Percentage of shares outstanding.
    #[serde(default, alias = "pctHeld")]
    pub percent: Option<f64>,
}

/// Institutional ownership for one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Share of float held by institutions.
    #[serde(default, alias = "institutionalPercent")]
    pub institutional_percent: Option<f64>,
    /// Largest holders.
    #[serde(default, alias = "institutions")]
    pub holders: Vec<InstitutionalHolder>,
}

/// A single insider transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsiderTransaction {
    /// Insider name.
    pub insider: String,
    /// Role at the company.
    #[serde(default)]
    pub title: Option<String>,
    /// Buy, sell, grant, ...
    #[serde(alias = "transactionType", alias = "type")]
    pub transaction_type: String,
    /// Number of shares.
    #[serde(default)]
    pub shares: f64,
    /// Transaction price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Transaction date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Insider activity for one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InsiderActivity {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Transactions, newest first once normalized.
    #[serde(default)]
    pub transactions: Vec<InsiderTransaction>,
}

/// Result of an AI analysis run.
///
/// The backend's analysis payload is open-ended; the fields the terminal
/// renders directly are typed and everything else is kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: Symbol,
    /// Buy / hold / sell style recommendation.
    #[serde(default)]
    pub recommendation: Option<String>,
    /// Confidence in the recommendation, 0..1.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Narrative summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// When the analysis was produced.
    #[serde(default, alias = "createdAt", alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Parameters for triggering a fresh analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Agents to run; empty means the backend default set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

/// A watchlist entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Optional user-defined group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// When the symbol was added.
    #[serde(default, alias = "addedAt", skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WatchlistEntry {
    /// Creates an entry with only the symbol set.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            group: None,
            added_at: None,
            notes: None,
        }
    }
}

/// The watchlist as returned by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    /// Entries in display order.
    #[serde(default, alias = "items")]
    pub tickers: Vec<WatchlistEntry>,
    /// Number of entries.
    #[serde(default)]
    pub count: usize,
}

/// Body of a watchlist add request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWatchlistEntry {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Optional group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Optional notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewWatchlistEntry {
    /// Creates an add request for a symbol.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            group: None,
            notes: None,
        }
    }

    /// Sets the group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A macro-economic calendar event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroEvent {
    /// Event date.
    pub date: NaiveDate,
    /// Local release time, if known.
    #[serde(default)]
    pub time: Option<String>,
    /// Country code.
    #[serde(default)]
    pub country: Option<String>,
    /// Event name.
    #[serde(alias = "name")]
    pub event: String,
    /// Importance (low / medium / high).
    #[serde(default, alias = "impact")]
    pub importance: Option<String>,
    /// Actual value.
    #[serde(default)]
    pub actual: Option<String>,
    /// Consensus forecast.
    #[serde(default)]
    pub forecast: Option<String>,
    /// Previous value.
    #[serde(default)]
    pub previous: Option<String>,
}

/// Macro calendar for a date range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroCalendar {
    /// Events, in chronological order once normalized.
    #[serde(default)]
    pub events: Vec<MacroEvent>,
}

/// Market scanner criteria.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanCriteria {
    /// Named preset (e.g. `"gainers"`, `"unusual_volume"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Minimum last price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    /// Maximum last price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// Minimum session volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
    /// Restrict to these sectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<String>,
    /// Maximum number of matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// A single scanner match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanMatch {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Last price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Percentage change.
    #[serde(default, alias = "changePercent")]
    pub change_percent: Option<f64>,
    /// Session volume.
    #[serde(default)]
    pub volume: Option<f64>,
    /// Scanner score, higher is better.
    #[serde(default)]
    pub score: Option<f64>,
}

/// Scanner output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Matches, best score first once normalized.
    #[serde(default, alias = "results")]
    pub matches: Vec<ScanMatch>,
    /// Number of matches.
    #[serde(default)]
    pub count: usize,
}
