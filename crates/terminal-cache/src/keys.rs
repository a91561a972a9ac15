//! Cache key construction.
//!
//! Every cache key is built here so the same logical resource maps to the
//! same byte string at every call site. Symbols are already upper-cased by
//! [`Symbol`], which keeps `aapl` and `AAPL` on one key.

use chrono::NaiveDate;
use terminal_core::{ScanCriteria, Symbol, Timeframe};

/// Quote for a symbol.
#[must_use]
pub fn ticker(symbol: &Symbol) -> String {
    format!("ticker:{symbol}")
}

/// Price history for a symbol and timeframe.
#[must_use]
pub fn history(symbol: &Symbol, timeframe: Timeframe) -> String {
    format!("history:{symbol}:{timeframe}")
}

/// Fundamentals for a symbol.
#[must_use]
pub fn fundamentals(symbol: &Symbol) -> String {
    format!("fundamentals:{symbol}")
}

/// News for a symbol at a given page size.
#[must_use]
pub fn news(symbol: &Symbol, limit: usize) -> String {
    format!("news:{symbol}:{limit}")
}

/// Institutional ownership for a symbol.
#[must_use]
pub fn ownership(symbol: &Symbol) -> String {
    format!("ownership:{symbol}")
}

/// Insider transactions for a symbol.
#[must_use]
pub fn insider(symbol: &Symbol) -> String {
    format!("insider:{symbol}")
}

/// Analysis result for a symbol.
#[must_use]
pub fn analysis(symbol: &Symbol) -> String {
    format!("analysis:{symbol}")
}

/// Per-symbol watchlist membership.
#[must_use]
pub fn watchlist_item(symbol: &Symbol) -> String {
    format!("watchlist:{symbol}")
}

/// The whole watchlist.
pub const WATCHLIST: &str = "watchlist";

/// Macro calendar for an inclusive date range.
#[must_use]
pub fn macro_calendar(from: NaiveDate, to: NaiveDate) -> String {
    format!("macro:calendar:{from}:{to}")
}

/// Scanner results for a set of criteria.
///
/// Criteria serialize with a fixed field order, so equal criteria give equal
/// keys.
#[must_use]
pub fn scan(criteria: &ScanCriteria) -> String {
    let encoded = serde_json::to_string(criteria).unwrap_or_default();
    format!("scan:{encoded}")
}

/// Every key and key prefix derived from one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolScope {
    /// Keys to delete exactly.
    pub keys: Vec<String>,
    /// Prefixes to clear (parameterised resources).
    pub prefixes: Vec<String>,
}

/// The invalidation scope of a symbol: quote, every history timeframe,
/// fundamentals, news, ownership, insider, analysis and watchlist item.
#[must_use]
pub fn symbol_scope(symbol: &Symbol) -> SymbolScope {
    let mut keys = vec![
        ticker(symbol),
        fundamentals(symbol),
        ownership(symbol),
        insider(symbol),
        analysis(symbol),
        watchlist_item(symbol),
    ];
    keys.extend(Timeframe::ALL.iter().map(|tf| history(symbol, *tf)));

    SymbolScope {
        keys,
        prefixes: vec![format!("news:{symbol}:")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_normalized() {
        assert_eq!(ticker(&Symbol::new("aapl")), "ticker:AAPL");
        assert_eq!(
            history(&Symbol::new("msft"), Timeframe::OneYear),
            "history:MSFT:1Y"
        );
        assert_eq!(news(&Symbol::new("nvda"), 20), "news:NVDA:20");
    }

    #[test]
    fn test_macro_key() {
        let from = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            macro_calendar(from, to),
            "macro:calendar:2024-06-01:2024-06-30"
        );
    }

    #[test]
    fn test_scan_key_is_stable() {
        let criteria = ScanCriteria {
            preset: Some("gainers".into()),
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(scan(&criteria), scan(&criteria.clone()));
        assert_eq!(scan(&criteria), r#"scan:{"preset":"gainers","limit":25}"#);
    }

    #[test]
    fn test_symbol_scope_covers_all_domains() {
        let scope = symbol_scope(&Symbol::new("aapl"));
        assert_eq!(scope.keys.len(), 6 + Timeframe::ALL.len());
        assert!(scope.keys.contains(&"history:AAPL:5Y".to_string()));
        assert!(scope.keys.contains(&"watchlist:AAPL".to_string()));
        assert_eq!(scope.prefixes, vec!["news:AAPL:".to_string()]);
    }
}
