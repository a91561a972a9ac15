//! Client configuration.
//!
//! [`ClientConfig`] carries the backend URLs, per-domain cache TTLs, health
//! monitor tunables, and request timeouts. Configuration can come from
//! defaults, a JSON document, or environment variables; in every case
//! [`ClientConfig::validated`] replaces out-of-range values with defaults
//! instead of failing.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

const TTL_RANGE: RangeInclusive<u64> = 1..=86_400;
const POLL_INTERVAL_RANGE: RangeInclusive<u64> = 5..=600;
const PROBE_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;
const FAILURE_THRESHOLD_RANGE: RangeInclusive<u32> = 1..=20;
const REQUEST_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=600;

/// Errors loading a configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON for [`ClientConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serde helpers for durations expressed in whole seconds.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Time-to-live per cached resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    /// Fallback TTL when a resource has no specific one.
    #[serde(with = "secs")]
    pub default: Duration,
    /// Quotes.
    #[serde(with = "secs")]
    pub ticker: Duration,
    /// Price history.
    #[serde(with = "secs")]
    pub history: Duration,
    /// Fundamentals.
    #[serde(with = "secs")]
    pub fundamentals: Duration,
    /// News.
    #[serde(with = "secs")]
    pub news: Duration,
    /// Institutional ownership.
    #[serde(with = "secs")]
    pub ownership: Duration,
    /// Insider transactions.
    #[serde(with = "secs")]
    pub insider: Duration,
    /// Analysis results.
    #[serde(with = "secs")]
    pub analysis: Duration,
    /// Macro calendar.
    #[serde(with = "secs")]
    pub macro_calendar: Duration,
    /// Scanner results.
    #[serde(with = "secs")]
    pub scan: Duration,
    /// Watchlist.
    #[serde(with = "secs")]
    pub watchlist: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(300),
            ticker: Duration::from_secs(30),
            history: Duration::from_secs(300),
            fundamentals: Duration::from_secs(3600),
            news: Duration::from_secs(300),
            ownership: Duration::from_secs(3600),
            insider: Duration::from_secs(1800),
            analysis: Duration::from_secs(1800),
            macro_calendar: Duration::from_secs(3600),
            scan: Duration::from_secs(120),
            watchlist: Duration::from_secs(60),
        }
    }
}

impl CacheTtls {
    fn fields_mut(&mut self) -> [(&'static str, &mut Duration); 11] {
        [
            ("default", &mut self.default),
            ("ticker", &mut self.ticker),
            ("history", &mut self.history),
            ("fundamentals", &mut self.fundamentals),
            ("news", &mut self.news),
            ("ownership", &mut self.ownership),
            ("insider", &mut self.insider),
            ("analysis", &mut self.analysis),
            ("macro_calendar", &mut self.macro_calendar),
            ("scan", &mut self.scan),
            ("watchlist", &mut self.watchlist),
        ]
    }
}

/// Health monitor tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Delay between polling probes.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Deadline for a single probe.
    #[serde(with = "secs")]
    pub probe_timeout: Duration,
    /// Consecutive failures before the backend is reported as `error`.
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            failure_threshold: 3,
        }
    }
}

/// Per-call deadlines for orchestrator requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTimeouts {
    /// Cheap reads and writes (watchlist).
    #[serde(with = "secs")]
    pub quick: Duration,
    /// Data reads (quotes, news, fundamentals, ...).
    #[serde(with = "secs")]
    pub read: Duration,
    /// Endpoints that trigger expensive backend computation.
    #[serde(with = "secs")]
    pub analysis: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            quick: Duration::from_secs(15),
            read: Duration::from_secs(30),
            analysis: Duration::from_secs(120),
        }
    }
}

/// Complete client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every API path is resolved against.
    pub api_base_url: String,
    /// WebSocket URL; derived from the API URL when absent.
    pub ws_url: Option<String>,
    /// Cache TTLs.
    pub cache_ttls: CacheTtls,
    /// Health monitor tunables.
    pub health: HealthConfig,
    /// Request deadlines.
    pub timeouts: RequestTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: None,
            cache_ttls: CacheTtls::default(),
            health: HealthConfig::default(),
            timeouts: RequestTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Create a default configuration pointing at `api_base_url`.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Default::default()
        }
        .validated()
    }

    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Build from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Recognised variables: `TERMINAL_API_URL`, `TERMINAL_WS_URL`,
    /// `TERMINAL_HEALTH_INTERVAL_SECS`, `TERMINAL_HEALTH_TIMEOUT_SECS`,
    /// `TERMINAL_FAILURE_THRESHOLD`, `TERMINAL_QUICK_TIMEOUT_SECS`,
    /// `TERMINAL_READ_TIMEOUT_SECS`, `TERMINAL_ANALYSIS_TIMEOUT_SECS` and
    /// `TERMINAL_CACHE_TTL_<RESOURCE>` (e.g. `TERMINAL_CACHE_TTL_TICKER`).
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let mut config = Self::default();
        if let Some(url) = lookup("TERMINAL_API_URL") {
            config.api_base_url = url;
        }
        config.ws_url = lookup("TERMINAL_WS_URL");

        if let Some(d) = secs("TERMINAL_HEALTH_INTERVAL_SECS") {
            config.health.poll_interval = d;
        }
        if let Some(d) = secs("TERMINAL_HEALTH_TIMEOUT_SECS") {
            config.health.probe_timeout = d;
        }
        if let Some(n) = lookup("TERMINAL_FAILURE_THRESHOLD").and_then(|v| v.trim().parse().ok())
        {
            config.health.failure_threshold = n;
        }
        if let Some(d) = secs("TERMINAL_QUICK_TIMEOUT_SECS") {
            config.timeouts.quick = d;
        }
        if let Some(d) = secs("TERMINAL_READ_TIMEOUT_SECS") {
            config.timeouts.read = d;
        }
        if let Some(d) = secs("TERMINAL_ANALYSIS_TIMEOUT_SECS") {
            config.timeouts.analysis = d;
        }
        for (name, ttl) in config.cache_ttls.fields_mut() {
            let key = format!("TERMINAL_CACHE_TTL_{}", name.to_uppercase());
            if let Some(d) = secs(&key) {
                *ttl = d;
            }
        }

        config.validated()
    }

    /// Replace every out-of-range value with its default.
    #[must_use]
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        self.api_base_url = match normalize_base_url(&self.api_base_url) {
            Some(url) => url,
            None => {
                warn!(value = %self.api_base_url, "Invalid API base URL, using default");
                defaults.api_base_url
            }
        };

        if let Some(ws) = self.ws_url.take() {
            match Url::parse(&ws) {
                Ok(url) if matches!(url.scheme(), "ws" | "wss") => self.ws_url = Some(ws),
                _ => warn!(value = %ws, "Invalid WebSocket URL, deriving from API URL"),
            }
        }

        let mut fallback = CacheTtls::default();
        for ((name, ttl), (_, default)) in self
            .cache_ttls
            .fields_mut()
            .into_iter()
            .zip(fallback.fields_mut())
        {
            *ttl = clamp_secs(name, *ttl, &TTL_RANGE, *default);
        }

        self.health.poll_interval = clamp_secs(
            "health.poll_interval",
            self.health.poll_interval,
            &POLL_INTERVAL_RANGE,
            defaults.health.poll_interval,
        );
        self.health.probe_timeout = clamp_secs(
            "health.probe_timeout",
            self.health.probe_timeout,
            &PROBE_TIMEOUT_RANGE,
            defaults.health.probe_timeout,
        );
        if !FAILURE_THRESHOLD_RANGE.contains(&self.health.failure_threshold) {
            warn!(
                value = self.health.failure_threshold,
                "Failure threshold out of range, using default"
            );
            self.health.failure_threshold = defaults.health.failure_threshold;
        }

        self.timeouts.quick = clamp_secs(
            "timeouts.quick",
            self.timeouts.quick,
            &REQUEST_TIMEOUT_RANGE,
            defaults.timeouts.quick,
        );
        self.timeouts.read = clamp_secs(
            "timeouts.read",
            self.timeouts.read,
            &REQUEST_TIMEOUT_RANGE,
            defaults.timeouts.read,
        );
        self.timeouts.analysis = clamp_secs(
            "timeouts.analysis",
            self.timeouts.analysis,
            &REQUEST_TIMEOUT_RANGE,
            defaults.timeouts.analysis,
        );

        self
    }

    /// Resolved API base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Resolved WebSocket URL.
    ///
    /// When none was configured, the API URL's scheme is switched to
    /// `ws`/`wss` and its path replaced with `/ws`.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.clone();
        }
        match Url::parse(&self.api_base_url) {
            Ok(mut url) => {
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                // Both schemes are "special", so the switch cannot fail.
                let _ = url.set_scheme(scheme);
                url.set_path("/ws");
                url.set_query(None);
                url.to_string()
            }
            Err(_) => "ws://localhost:8000/ws".to_string(),
        }
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return None;
    }
    let mut s = url.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Some(s)
}

fn clamp_secs(
    name: &str,
    value: Duration,
    range: &RangeInclusive<u64>,
    default: Duration,
) -> Duration {
    if range.contains(&value.as_secs()) {
        value
    } else {
        warn!(
            setting = name,
            value = value.as_secs(),
            "Setting out of range, using default"
        );
        default
    }
}
