//! The terminal client façade.

use chrono::NaiveDate;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use terminal_cache::{CacheStats, CacheStore, CleanupTask, LocalStore, MemoryStorage, keys};
use terminal_core::{
    Analysis, AnalysisRequest, ClientConfig, Clock, Fundamentals, HealthSnapshot, HttpTransport,
    InsiderActivity, MacroCalendar, NewWatchlistEntry, NewsFeed, Ownership, PriceHistory, Quote,
    Result, ScanCriteria, ScanResult, StatusSummary, Symbol, SystemClock, Timeframe, Watchlist,
    WatchlistEntry,
};
use terminal_http::ReqwestTransport;
use tracing::{debug, instrument, warn};

use crate::cached::CachedApi;
use crate::health::{HealthMonitor, Subscription};
use crate::offline::{WatchlistView, watchlist_with_local_fallback};
use crate::request::Api;

/// One instance of every resilience component, wired together.
///
/// Reads go cache first, then through the health gate to the backend.
/// Mutations invalidate every cached entry they could make stale. The
/// watchlist and analyses are mirrored to the [`LocalStore`] so they stay
/// viewable while the backend is down.
///
/// # Example
///
/// ```rust,ignore
/// use terminal::{ClientConfig, Symbol, TerminalClient};
///
/// #[tokio::main]
/// async fn main() -> terminal::Result<()> {
///     let client = TerminalClient::builder(ClientConfig::from_env())
///         .local_store(terminal::LocalStore::open("terminal.db"))
///         .build();
///     client.start_health_polling();
///
///     let quote = client.quote(&Symbol::new("AAPL")).await?;
///     println!("{} {}", quote.symbol, quote.price);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TerminalClient {
    config: ClientConfig,
    cached: CachedApi,
    local: LocalStore,
}

impl fmt::Debug for TerminalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalClient")
            .field("base_url", &self.base_url())
            .field("cache", &self.stats())
            .field("health", &self.status_summary())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TerminalClient`].
#[derive(Debug)]
pub struct TerminalClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    local: Option<LocalStore>,
    clock: Option<Arc<dyn Clock>>,
}

impl TerminalClientBuilder {
    /// Use a custom transport instead of `reqwest`.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist to `store` instead of process memory.
    #[must_use]
    pub fn local_store(mut self, store: LocalStore) -> Self {
        self.local = Some(store);
        self
    }

    /// Drive cache expiry and snapshot timestamps from `clock`.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Wire the components.
    #[must_use]
    pub fn build(self) -> TerminalClient {
        let config = self.config.validated();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let local = self.local.unwrap_or_else(|| {
            LocalStore::with_clock(Arc::new(MemoryStorage::new()), Arc::clone(&clock))
        });

        let cache = Arc::new(
            CacheStore::with_clock(Arc::clone(&clock)).with_default_ttl(config.cache_ttls.default),
        );
        let health = HealthMonitor::with_clock(Arc::clone(&transport), &config, clock);
        let api = Api::new(transport, &config, health);
        let cached = CachedApi::new(api, cache, config.cache_ttls.clone());

        debug!(base_url = config.base_url(), "Terminal client ready");
        TerminalClient {
            config,
            cached,
            local,
        }
    }
}

impl TerminalClient {
    /// A client with default transport and in-memory local storage.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start configuring a client.
    #[must_use]
    pub const fn builder(config: ClientConfig) -> TerminalClientBuilder {
        TerminalClientBuilder {
            config,
            transport: None,
            local: None,
            clock: None,
        }
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// API base URL, ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// WebSocket URL for streaming clients.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        self.config.websocket_url()
    }

    /// Uncached API, for calls that need a [`CancellationToken`].
    ///
    /// [`CancellationToken`]: tokio_util::sync::CancellationToken
    #[must_use]
    pub const fn api(&self) -> &Api {
        self.cached.api()
    }

    /// Cache-aware API.
    #[must_use]
    pub const fn cached(&self) -> &CachedApi {
        &self.cached
    }

    /// Durable local store.
    #[must_use]
    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Health monitor.
    #[must_use]
    pub const fn health_monitor(&self) -> &HealthMonitor {
        self.cached.api().health()
    }

    /// In-memory cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<CacheStore> {
        self.cached.cache()
    }

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache().stats()
    }

    /// Evict expired cache entries every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start_cache_cleanup(&self, interval: Duration) -> CleanupTask {
        self.cache().spawn_cleanup(interval)
    }

    /// Drop every cached entry derived from `symbol`, in any case.
    pub fn invalidate_symbol_cache(&self, symbol: impl Into<Symbol>) -> usize {
        self.cached.invalidate_symbol_cache(symbol)
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Latest health snapshot.
    #[must_use]
    pub fn health(&self) -> Option<Arc<HealthSnapshot>> {
        self.health_monitor().health()
    }

    /// Backend status, database connectivity and API reachability.
    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        self.health_monitor().status_summary()
    }

    /// Probe the backend now.
    ///
    /// # Errors
    /// See [`HealthMonitor::check_health`].
    pub async fn check_health(&self) -> Result<HealthSnapshot> {
        self.health_monitor().check_health().await
    }

    /// Start polling health at the configured interval.
    pub fn start_health_polling(&self) {
        self.health_monitor().start_polling();
    }

    /// Stop polling health.
    pub fn stop_health_polling(&self) {
        self.health_monitor().stop_polling();
    }

    /// Listen for health snapshots.
    pub fn subscribe_health<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HealthSnapshot) + Send + Sync + 'static,
    {
        self.health_monitor().subscribe(listener)
    }

    // ------------------------------------------------------------------
    // Market data
    // ------------------------------------------------------------------

    /// Quote for `symbol`.
    ///
    /// # Errors
    /// See [`Api::quote`].
    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote> {
        self.cached.quote(symbol, false).await
    }

    /// Price history for `symbol`.
    ///
    /// # Errors
    /// See [`Api::history`].
    pub async fn history(&self, symbol: &Symbol, timeframe: Timeframe) -> Result<PriceHistory> {
        self.cached.history(symbol, timeframe, false).await
    }

    /// Fundamentals for `symbol`.
    ///
    /// # Errors
    /// See [`Api::fundamentals`].
    pub async fn fundamentals(&self, symbol: &Symbol) -> Result<Fundamentals> {
        self.cached.fundamentals(symbol, false).await
    }

    /// Recent news for `symbol`.
    ///
    /// # Errors
    /// See [`Api::news`].
    pub async fn news(&self, symbol: &Symbol, limit: usize) -> Result<NewsFeed> {
        self.cached.news(symbol, limit, false).await
    }

    /// Institutional ownership of `symbol`.
    ///
    /// # Errors
    /// See [`Api::ownership`].
    pub async fn ownership(&self, symbol: &Symbol) -> Result<Ownership> {
        self.cached.ownership(symbol, false).await
    }

    /// Insider transactions in `symbol`.
    ///
    /// # Errors
    /// See [`Api::insider_activity`].
    pub async fn insider_activity(&self, symbol: &Symbol) -> Result<InsiderActivity> {
        self.cached.insider_activity(symbol, false).await
    }

    /// Macro calendar between two dates, inclusive.
    ///
    /// # Errors
    /// See [`Api::macro_calendar`].
    pub async fn macro_calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<MacroCalendar> {
        self.cached.macro_calendar(from, to, false).await
    }

    /// Run the market scanner.
    ///
    /// # Errors
    /// See [`Api::scan`].
    pub async fn scan(&self, criteria: &ScanCriteria) -> Result<ScanResult> {
        self.cached.scan(criteria, false).await
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    fn analysis_ttl_minutes(&self) -> u32 {
        let minutes = self.config.cache_ttls.analysis.as_secs().div_ceil(60);
        u32::try_from(minutes).unwrap_or(u32::MAX)
    }

    /// Stored analysis for `symbol`.
    ///
    /// Fresh fetches are persisted locally; cache hits leave the local
    /// copy's expiry alone. When the backend is temporarily unreachable an
    /// unexpired local copy is returned instead.
    ///
    /// # Errors
    /// See [`Api::analysis`]; transient errors only when no local copy exists.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn analysis(&self, symbol: &Symbol) -> Result<Analysis> {
        if let Some(hit) = self.cache().get::<Analysis>(&keys::analysis(symbol)) {
            return Ok(hit);
        }
        match self.cached.analysis(symbol, true).await {
            Ok(analysis) => {
                self.persist_analysis(symbol, &analysis);
                Ok(analysis)
            }
            Err(e) if e.is_transient() => match self.local.cached_analysis(symbol) {
                Some(analysis) => {
                    warn!(error = %e, "Serving analysis from local storage");
                    Ok(analysis)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Run a fresh analysis for `symbol`.
    ///
    /// Everything cached about the symbol is dropped and the new result is
    /// cached in memory and locally.
    ///
    /// # Errors
    /// See [`Api::trigger_analysis`].
    #[instrument(skip(self, request), fields(symbol = %symbol))]
    pub async fn trigger_analysis(
        &self,
        symbol: &Symbol,
        request: &AnalysisRequest,
    ) -> Result<Analysis> {
        let analysis = self.api().trigger_analysis(symbol, request, None).await?;
        self.invalidate_symbol_cache(symbol.clone());
        self.cache().set(
            keys::analysis(symbol),
            analysis.clone(),
            Some(self.config.cache_ttls.analysis),
        );
        self.persist_analysis(symbol, &analysis);
        Ok(analysis)
    }

    fn persist_analysis(&self, symbol: &Symbol, analysis: &Analysis) {
        if !self
            .local
            .cache_analysis(symbol, analysis, self.analysis_ttl_minutes())
        {
            debug!("Analysis not persisted locally");
        }
    }

    // ------------------------------------------------------------------
    // Watchlist
    // ------------------------------------------------------------------

    /// The watchlist, or its last synced copy when the backend fails.
    ///
    /// Only a network fetch rewrites the mirror and its sync time.
    ///
    /// # Errors
    /// The fetch error when nothing has ever been synced.
    pub async fn watchlist(&self) -> Result<WatchlistView> {
        if let Some(list) = self.cache().get::<Watchlist>(keys::WATCHLIST) {
            return Ok(WatchlistView::online(list, &self.local));
        }
        watchlist_with_local_fallback(&self.local, || self.cached.watchlist(true)).await
    }

    /// Add a symbol to the watchlist.
    ///
    /// # Errors
    /// See [`Api::add_to_watchlist`].
    #[instrument(skip(self, entry), fields(symbol = %entry.symbol))]
    pub async fn add_to_watchlist(&self, entry: &NewWatchlistEntry) -> Result<WatchlistEntry> {
        let added = self.api().add_to_watchlist(entry, None).await?;
        self.invalidate_watchlist_and(&entry.symbol);
        Ok(added)
    }

    /// Remove a symbol from the watchlist.
    ///
    /// # Errors
    /// See [`Api::remove_from_watchlist`].
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn remove_from_watchlist(&self, symbol: &Symbol) -> Result<()> {
        self.api().remove_from_watchlist(symbol, None).await?;
        self.invalidate_watchlist_and(symbol);
        Ok(())
    }

    fn invalidate_watchlist_and(&self, symbol: &Symbol) {
        self.cached.invalidate_watchlist();
        self.invalidate_symbol_cache(symbol.clone());
    }

    /// Quotes for every watchlist symbol, fetched concurrently.
    ///
    /// One symbol failing does not fail the others; each result is
    /// reported next to its symbol, in watchlist order.
    ///
    /// # Errors
    /// The watchlist error when no watchlist is available at all.
    pub async fn watchlist_quotes(&self) -> Result<Vec<(Symbol, Result<Quote>)>> {
        let view = self.watchlist().await?;
        let symbols: Vec<Symbol> = view.tickers.into_iter().map(|e| e.symbol).collect();
        let quotes = join_all(symbols.iter().map(|symbol| self.quote(symbol))).await;
        Ok(symbols.into_iter().zip(quotes).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, test_config};
    use std::collections::HashMap;
    use terminal_cache::{CachedAnalysis, local};
    use terminal_core::{ManualClock, ServiceStatus};

    const API: &str = "http://localhost:8000/api/";

    fn stored_analysis(
        client: &TerminalClient,
        symbol: &Symbol,
    ) -> Option<CachedAnalysis<serde_json::Value>> {
        let record: HashMap<String, CachedAnalysis<serde_json::Value>> =
            client.local().get(local::keys::ANALYSES_CACHE, HashMap::new());
        record.get(symbol.as_str()).cloned()
    }

    fn client(transport: &Arc<ScriptedTransport>) -> (TerminalClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let client = TerminalClient::builder(test_config())
            .transport(transport.clone())
            .clock(clock.clone())
            .build();
        (client, clock)
    }

    #[test]
    fn test_accessors() {
        let (client, _) = client(&ScriptedTransport::new());
        assert_eq!(client.base_url(), API);
        assert_eq!(client.websocket_url(), "ws://localhost:8000/ws");
        assert_eq!(client.stats().hits, 0);
        assert_eq!(client.status_summary().backend, ServiceStatus::Stopped);
        assert!(format!("{client:?}").contains("TerminalClient"));
    }

    #[tokio::test]
    async fn test_watchlist_offline_scenario() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"tickers":[{"symbol":"MSFT"}],"count":1}"#);
        transport.fail("connection refused");
        let (client, clock) = client(&transport);

        let online = client.watchlist().await.unwrap();
        assert!(!online.is_offline);
        assert_eq!(client.local().watchlist_symbols(), vec![Symbol::new("MSFT")]);

        // Past the watchlist TTL so the next read goes to the network.
        clock.advance(Duration::from_secs(61));
        let offline = client.watchlist().await.unwrap();
        assert!(offline.is_offline);
        assert_eq!(offline.tickers, vec![WatchlistEntry::new("MSFT")]);
    }

    #[tokio::test]
    async fn test_watchlist_mutations_invalidate() {
        let transport = ScriptedTransport::new();
        transport.reply(201, r#"{"symbol":"AAPL","group":"core"}"#);
        transport.reply(204, "");
        let (client, _) = client(&transport);

        let aapl = Symbol::new("AAPL");
        client.cache().set(keys::ticker(&aapl), 1_u8, None);
        client.cache().set(keys::WATCHLIST, 1_u8, None);
        client.cache().set(keys::ticker(&Symbol::new("MSFT")), 1_u8, None);

        let added = client
            .add_to_watchlist(&NewWatchlistEntry::new("aapl").with_group("core"))
            .await
            .unwrap();
        assert_eq!(added.group.as_deref(), Some("core"));
        assert!(!client.cache().has(&keys::ticker(&aapl)));
        assert!(!client.cache().has(keys::WATCHLIST));
        assert!(client.cache().has(&keys::ticker(&Symbol::new("MSFT"))));

        client.cache().set(keys::watchlist_item(&aapl), 1_u8, None);
        client.remove_from_watchlist(&aapl).await.unwrap();
        assert!(!client.cache().has(&keys::watchlist_item(&aapl)));
    }

    #[tokio::test]
    async fn test_trigger_analysis_refreshes_caches() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"symbol":"AAPL","recommendation":"buy"}"#);
        let (client, _) = client(&transport);

        let aapl = Symbol::new("AAPL");
        client.cache().set(keys::ticker(&aapl), 1_u8, None);

        let analysis = client
            .trigger_analysis(&aapl, &AnalysisRequest::default())
            .await
            .unwrap();
        assert!(!client.cache().has(&keys::ticker(&aapl)));
        assert_eq!(
            client.cache().get::<Analysis>(&keys::analysis(&aapl)),
            Some(analysis.clone())
        );
        assert_eq!(client.local().cached_analysis::<Analysis>(&aapl), Some(analysis));
    }

    #[tokio::test]
    async fn test_analysis_served_locally_when_backend_down() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"symbol":"AAPL","recommendation":"hold"}"#);
        transport.fail("connection refused");
        let (client, clock) = client(&transport);
        let aapl = Symbol::new("AAPL");

        client.analysis(&aapl).await.unwrap();
        client.check_health().await.unwrap_err();
        assert!(!client.health_monitor().is_backend_reachable());

        client.cache().clear();
        let analysis = client.analysis(&aapl).await.unwrap();
        assert_eq!(analysis.recommendation.as_deref(), Some("hold"));
        assert_eq!(transport.calls(), 2);

        // Nothing stored locally for MSFT.
        let err = client.analysis(&Symbol::new("MSFT")).await.unwrap_err();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");

        // The durable copy expires with the analysis TTL.
        clock.advance(Duration::from_secs(1801));
        let err = client.analysis(&aapl).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_cache_hits_keep_local_analysis_expiry() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"symbol":"AAPL","recommendation":"hold"}"#);
        transport.fail("connection refused");
        let (client, clock) = client(&transport);
        let aapl = Symbol::new("AAPL");

        client.analysis(&aapl).await.unwrap();
        let fetched_at = stored_analysis(&client, &aapl).unwrap();

        clock.advance(Duration::from_secs(29 * 60));
        client.analysis(&aapl).await.unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(stored_analysis(&client, &aapl).unwrap(), fetched_at);

        client.check_health().await.unwrap_err();
        clock.advance(Duration::from_secs(16 * 60));
        let err = client.analysis(&aapl).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_watchlist_cache_hit_keeps_sync_time() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"tickers":[{"symbol":"MSFT"}]}"#);
        let (client, clock) = client(&transport);

        let first = client.watchlist().await.unwrap();
        assert!(first.synced_at.is_some());

        clock.advance(Duration::from_secs(30));
        let second = client.watchlist().await.unwrap();
        assert_eq!(transport.calls(), 1);
        assert!(!second.is_offline);
        assert_eq!(second.tickers, first.tickers);
        assert_eq!(second.synced_at, first.synced_at);
        assert_eq!(client.local().watchlist_synced_at(), first.synced_at);
    }

    #[tokio::test]
    async fn test_watchlist_quotes_tolerates_failures() {
        let transport = ScriptedTransport::new();
        transport.route(
            &format!("{API}watchlist"),
            200,
            r#"{"tickers":[{"symbol":"AAPL"},{"symbol":"GONE"},{"symbol":"MSFT"}]}"#,
        );
        transport.route(&format!("{API}ticker/AAPL"), 200, r#"{"price":190.0}"#);
        transport.route(&format!("{API}ticker/GONE"), 404, "");
        transport.route(&format!("{API}ticker/MSFT"), 200, r#"{"price":420.0}"#);
        let (client, _) = client(&transport);

        let quotes = client.watchlist_quotes().await.unwrap();
        let symbols: Vec<_> = quotes.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, ["AAPL", "GONE", "MSFT"]);
        assert_eq!(quotes[0].1.as_ref().unwrap().price, 190.0);
        assert_eq!(quotes[0].1.as_ref().unwrap().symbol.as_str(), "AAPL");
        assert!(quotes[1].1.as_ref().unwrap_err().is_not_found());
        assert_eq!(quotes[2].1.as_ref().unwrap().price, 420.0);
    }
}
