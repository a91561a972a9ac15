//! Shared request path for every backend call.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use terminal_core::{
    ClientConfig, ClientError, Domain, HttpRequest, HttpResponse, HttpTransport, RequestTimeouts,
    Result, Symbol,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::health::HealthMonitor;

/// Typed access to the backend REST API.
///
/// Each domain method checks the [`HealthMonitor`] before doing any I/O,
/// bounds the exchange with a per-endpoint deadline and an optional
/// caller-supplied [`CancellationToken`], and maps every failure to a
/// [`ClientError`].
#[derive(Debug, Clone)]
pub struct Api {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeouts: RequestTimeouts,
    health: HealthMonitor,
}

/// Which configured deadline a call runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    /// Watchlist reads and writes.
    Quick,
    /// Ordinary reads.
    Read,
    /// Analysis runs.
    Analysis,
}

impl Api {
    /// Create an API client gated by `health`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &ClientConfig,
        health: HealthMonitor,
    ) -> Self {
        Self {
            transport,
            base_url: config.base_url().to_string(),
            timeouts: config.timeouts.clone(),
            health,
        }
    }

    /// API base URL, ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The monitor gating this client.
    #[must_use]
    pub const fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Fail fast when the last probe found the backend unreachable.
    ///
    /// Reads the latest snapshot only; never touches the network.
    ///
    /// # Errors
    /// Returns [`ClientError::BackendUnavailable`] when the backend is down.
    pub fn ensure_backend_available(&self) -> Result<()> {
        if self.health.is_backend_reachable() {
            return Ok(());
        }
        let reason = self
            .health
            .health()
            .and_then(|snapshot| snapshot.backend.error.clone())
            .unwrap_or_else(|| "backend is not reachable".to_string());
        Err(ClientError::BackendUnavailable(reason))
    }

    /// Build an absolute endpoint URL from path segments and query pairs.
    ///
    /// Segments are percent-encoded individually.
    pub(crate) fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Unknown(format!("Invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Unknown(format!("API base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url.into())
    }

    const fn deadline(&self, deadline: Deadline) -> Duration {
        match deadline {
            Deadline::Quick => self.timeouts.quick,
            Deadline::Read => self.timeouts.read,
            Deadline::Analysis => self.timeouts.analysis,
        }
    }

    /// Send `request` and return the successful response.
    #[instrument(
        skip(self, request, cancel),
        fields(domain = %domain, method = %request.method, url = %request.url)
    )]
    pub(crate) async fn execute(
        &self,
        domain: Domain,
        symbol: Option<&Symbol>,
        request: HttpRequest,
        deadline: Deadline,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse> {
        self.ensure_backend_available()?;

        let timeout = self.deadline(deadline);
        let exchange = tokio::time::timeout(timeout, self.transport.send(request));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("Request cancelled by caller");
                    return Err(ClientError::Cancelled { domain });
                }
                outcome = exchange => outcome,
            },
            None => exchange.await,
        };

        let response = match outcome {
            Err(_) => {
                warn!(after = ?timeout, "Request timed out");
                return Err(ClientError::Timeout {
                    domain,
                    after: timeout,
                });
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Request failed");
                return Err(ClientError::Network(e.0));
            }
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            debug!(status = response.status, "Backend returned an error status");
            return Err(status_error(domain, symbol, &response));
        }
        Ok(response)
    }

    /// [`execute`](Self::execute) then decode the body as `T`.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        domain: Domain,
        symbol: Option<&Symbol>,
        request: HttpRequest,
        deadline: Deadline,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        let response = self
            .execute(domain, symbol, request, deadline, cancel)
            .await?;
        response
            .json()
            .map_err(|e| ClientError::Unknown(format!("Invalid {domain} response: {e}")))
    }
}

/// Encode a request body.
pub(crate) fn json_body<T: Serialize>(domain: Domain, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::Unknown(format!("Failed to encode {domain} request: {e}")))
}

/// Map a non-2xx response to the domain's error.
pub(crate) fn status_error(
    domain: Domain,
    symbol: Option<&Symbol>,
    response: &HttpResponse,
) -> ClientError {
    let symbol = symbol.cloned();
    match response.status {
        404 => ClientError::NotFound { domain, symbol },
        409 => ClientError::AlreadyExists { domain, symbol },
        503 => ClientError::ServiceUnavailable { domain },
        status => ClientError::RequestFailed {
            domain,
            status,
            symbol,
            details: (!response.body.is_empty()).then(|| response.body.clone()),
        },
    }
}
