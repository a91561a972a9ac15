//! Cache-aware wrappers over [`Api`].

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use terminal_cache::{CacheStore, keys};
use terminal_core::{
    Analysis, CacheTtls, Fundamentals, InsiderActivity, MacroCalendar, NewsFeed, Ownership,
    PriceHistory, Quote, Result, ScanCriteria, ScanResult, Symbol, Timeframe, Watchlist,
};
use tracing::{debug, instrument, trace};

use crate::normalize::Normalize;
use crate::request::Api;

/// How a cached read behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Lifetime of the stored value; the store default when `None`.
    pub ttl: Option<Duration>,
    /// Skip the lookup and always fetch.
    pub force_refresh: bool,
}

impl CacheOptions {
    /// Cache for `ttl`.
    #[must_use]
    pub const fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            force_refresh: false,
        }
    }

    /// Set whether the lookup is skipped.
    #[must_use]
    pub const fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// Return the cached value for `key`, or fetch, normalize and cache it.
///
/// Nothing is written unless both `fetch` and `normalize` succeed, so a
/// failed call never replaces a good entry.
///
/// # Errors
/// Whatever `fetch` or `normalize` returns.
pub async fn get_with_cache<T, R, F, Fut, N>(
    cache: &CacheStore,
    key: &str,
    fetch: F,
    normalize: N,
    options: CacheOptions,
) -> Result<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
    N: FnOnce(R) -> Result<T>,
{
    if options.force_refresh {
        trace!(key, "Cache bypassed");
    } else if let Some(hit) = cache.get::<T>(key) {
        trace!(key, "Serving from cache");
        return Ok(hit);
    }

    let value = normalize(fetch().await?)?;
    cache.set(key, value.clone(), options.ttl);
    debug!(key, "Cached fresh value");
    Ok(value)
}

/// [`Api`] with every read going through a shared [`CacheStore`].
#[derive(Debug, Clone)]
pub struct CachedApi {
    api: Api,
    cache: Arc<CacheStore>,
    ttls: CacheTtls,
}

impl CachedApi {
    /// Wrap `api` with `cache`, using `ttls` per domain.
    #[must_use]
    pub const fn new(api: Api, cache: Arc<CacheStore>, ttls: CacheTtls) -> Self {
        Self { api, cache, ttls }
    }

    /// The uncached client.
    #[must_use]
    pub const fn api(&self) -> &Api {
        &self.api
    }

    /// The shared cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    async fn cached<T, Fut>(
        &self,
        key: String,
        ttl: Duration,
        force_refresh: bool,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<T>
    where
        T: Normalize + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T>>,
    {
        let options = CacheOptions::ttl(ttl).force_refresh(force_refresh);
        get_with_cache(&self.cache, &key, fetch, |raw: T| Ok(raw.normalize()), options).await
    }

    /// Quote, cached for the ticker TTL.
    ///
    /// # Errors
    /// See [`Api::quote`].
    pub async fn quote(&self, symbol: &Symbol, force_refresh: bool) -> Result<Quote> {
        self.cached(keys::ticker(symbol), self.ttls.ticker, force_refresh, || {
            self.api.quote(symbol, None)
        })
        .await
    }

    /// Price history, cached per timeframe.
    ///
    /// # Errors
    /// See [`Api::history`].
    pub async fn history(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        force_refresh: bool,
    ) -> Result<PriceHistory> {
        self.cached(
            keys::history(symbol, timeframe),
            self.ttls.history,
            force_refresh,
            || self.api.history(symbol, timeframe, None),
        )
        .await
    }

    /// Fundamentals.
    ///
    /// # Errors
    /// See [`Api::fundamentals`].
    pub async fn fundamentals(&self, symbol: &Symbol, force_refresh: bool) -> Result<Fundamentals> {
        self.cached(
            keys::fundamentals(symbol),
            self.ttls.fundamentals,
            force_refresh,
            || self.api.fundamentals(symbol, None),
        )
        .await
    }

    /// News, cached per page size.
    ///
    /// # Errors
    /// See [`Api::news`].
    pub async fn news(
        &self,
        symbol: &Symbol,
        limit: usize,
        force_refresh: bool,
    ) -> Result<NewsFeed> {
        self.cached(keys::news(symbol, limit), self.ttls.news, force_refresh, || {
            self.api.news(symbol, limit, None)
        })
        .await
    }

    /// Institutional ownership.
    ///
    /// # Errors
    /// See [`Api::ownership`].
    pub async fn ownership(&self, symbol: &Symbol, force_refresh: bool) -> Result<Ownership> {
        self.cached(
            keys::ownership(symbol),
            self.ttls.ownership,
            force_refresh,
            || self.api.ownership(symbol, None),
        )
        .await
    }

    /// Insider transactions.
    ///
    /// # Errors
    /// See [`Api::insider_activity`].
    pub async fn insider_activity(
        &self,
        symbol: &Symbol,
        force_refresh: bool,
    ) -> Result<InsiderActivity> {
        self.cached(keys::insider(symbol), self.ttls.insider, force_refresh, || {
            self.api.insider_activity(symbol, None)
        })
        .await
    }

    /// Stored analysis.
    ///
    /// # Errors
    /// See [`Api::analysis`].
    pub async fn analysis(&self, symbol: &Symbol, force_refresh: bool) -> Result<Analysis> {
        self.cached(keys::analysis(symbol), self.ttls.analysis, force_refresh, || {
            self.api.analysis(symbol, None)
        })
        .await
    }

    /// Macro calendar for an inclusive date range.
    ///
    /// # Errors
    /// See [`Api::macro_calendar`].
    pub async fn macro_calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        force_refresh: bool,
    ) -> Result<MacroCalendar> {
        self.cached(
            keys::macro_calendar(from, to),
            self.ttls.macro_calendar,
            force_refresh,
            || self.api.macro_calendar(from, to, None),
        )
        .await
    }

    /// Scanner results, cached per criteria.
    ///
    /// # Errors
    /// See [`Api::scan`].
    pub async fn scan(&self, criteria: &ScanCriteria, force_refresh: bool) -> Result<ScanResult> {
        self.cached(keys::scan(criteria), self.ttls.scan, force_refresh, || {
            self.api.scan(criteria, None)
        })
        .await
    }

    /// Watchlist.
    ///
    /// # Errors
    /// See [`Api::watchlist`].
    pub async fn watchlist(&self, force_refresh: bool) -> Result<Watchlist> {
        self.cached(
            keys::WATCHLIST.to_string(),
            self.ttls.watchlist,
            force_refresh,
            || self.api.watchlist(None),
        )
        .await
    }

    /// Drop every cached entry derived from `symbol`.
    ///
    /// The symbol is case-normalized first, so `"aapl"` and `"AAPL"` clear
    /// the same entries. Returns the number of entries removed.
    #[instrument(skip(self, symbol))]
    pub fn invalidate_symbol_cache(&self, symbol: impl Into<Symbol>) -> usize {
        let symbol = symbol.into();
        let scope = keys::symbol_scope(&symbol);
        let exact = scope
            .keys
            .iter()
            .filter(|key| self.cache.delete(key))
            .count();
        let prefixed: usize = scope
            .prefixes
            .iter()
            .map(|prefix| self.cache.clear_prefix(prefix))
            .sum();
        debug!(symbol = %symbol, removed = exact + prefixed, "Invalidated symbol cache");
        exact + prefixed
    }

    /// Drop the cached watchlist.
    pub fn invalidate_watchlist(&self) -> bool {
        self.cache.delete(keys::WATCHLIST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, api_with};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use terminal_core::{ClientError, ManualClock};

    fn cached_api(transport: Arc<ScriptedTransport>) -> (CachedApi, Arc<ManualClock>) {
        let (api, clock) = api_with(transport);
        let cache = Arc::new(CacheStore::with_clock(clock.clone()));
        (CachedApi::new(api, cache, CacheTtls::default()), clock)
    }

    #[tokio::test]
    async fn test_quote_ttl_scenario() {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::with_clock(clock.clone());
        let counter = AtomicUsize::new(0);
        let (cache, calls) = (&store, &counter);
        let read = move || {
            get_with_cache(
                cache,
                "ticker:AAPL",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Quote::new("AAPL", 190.0))
                },
                |q: Quote| Ok(q),
                CacheOptions::ttl(Duration::from_secs(30)),
            )
        };

        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(10));
        let quote = read().await.unwrap();
        assert_eq!(quote.price, 190.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(21));
        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_poison_cache() {
        let cache = CacheStore::new();
        cache.set("news:AAPL:20", 1_u32, None);

        let failed = get_with_cache(
            &cache,
            "news:AAPL:20",
            || async { Err::<u32, _>(ClientError::Network("reset".into())) },
            Ok,
            CacheOptions::default().force_refresh(true),
        )
        .await;
        assert!(failed.is_err());

        let bad_shape = get_with_cache(
            &cache,
            "news:AAPL:20",
            || async { Ok(2_u32) },
            |_| Err::<u32, _>(ClientError::Unknown("unexpected shape".into())),
            CacheOptions::default().force_refresh(true),
        )
        .await;
        assert!(bad_shape.is_err());

        assert_eq!(cache.get::<u32>("news:AAPL:20"), Some(1));
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"symbol":"AAPL","price":1.0}"#);
        transport.reply(200, r#"{"symbol":"AAPL","price":2.0}"#);
        let (cached, _) = cached_api(transport.clone());
        let aapl = Symbol::new("AAPL");

        assert_eq!(cached.quote(&aapl, false).await.unwrap().price, 1.0);
        assert_eq!(cached.quote(&aapl, false).await.unwrap().price, 1.0);
        assert_eq!(cached.quote(&aapl, true).await.unwrap().price, 2.0);
        assert_eq!(cached.quote(&aapl, false).await.unwrap().price, 2.0);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_cached_values_are_normalized() {
        let transport = ScriptedTransport::new();
        transport.reply(
            200,
            r#"{"results":[{"symbol":"a","score":1},{"symbol":"b","score":3}],"count":0}"#,
        );
        let (cached, _) = cached_api(transport);

        let result = cached.scan(&ScanCriteria::default(), false).await.unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.matches[0].symbol.as_str(), "B");

        let again = cached.scan(&ScanCriteria::default(), false).await.unwrap();
        assert_eq!(again, result);
    }

    #[tokio::test]
    async fn test_invalidation_is_case_insensitive() {
        let (cached, _) = cached_api(ScriptedTransport::new());
        let populate = |cache: &CacheStore| {
            let aapl = Symbol::new("AAPL");
            cache.set(keys::ticker(&aapl), 1_u8, None);
            cache.set(keys::history(&aapl, Timeframe::OneYear), 1_u8, None);
            cache.set(keys::news(&aapl, 20), 1_u8, None);
            cache.set(keys::news(&aapl, 50), 1_u8, None);
            cache.set(keys::analysis(&aapl), 1_u8, None);
            cache.set(keys::watchlist_item(&aapl), 1_u8, None);
            cache.set(keys::ticker(&Symbol::new("AAPLX")), 1_u8, None);
            cache.set(keys::WATCHLIST, 1_u8, None);
        };

        populate(cached.cache().as_ref());
        let lower = cached.invalidate_symbol_cache("aapl");
        let remaining_lower = cached.cache().len();

        cached.cache().clear();
        populate(cached.cache().as_ref());
        let upper = cached.invalidate_symbol_cache("AAPL");

        assert_eq!(lower, 6);
        assert_eq!(lower, upper);
        assert_eq!(remaining_lower, 2);
        assert_eq!(cached.cache().len(), 2);
        assert!(cached.cache().has("ticker:AAPLX"));
        assert!(cached.cache().has(keys::WATCHLIST));
    }

    #[tokio::test]
    async fn test_errors_propagate_from_wrappers() {
        let transport = ScriptedTransport::new();
        transport.reply(404, "");
        let (cached, _) = cached_api(transport);
        let err = cached
            .fundamentals(&Symbol::new("nope"), false)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FUNDAMENTALS_NOT_FOUND");
        assert!(cached.cache().is_empty());
    }
}
