//! Backend health monitor.

use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use terminal_core::{
    ApiHealth, ClientConfig, ClientError, Clock, DatabaseHealth, Domain, HealthConfig,
    HealthResponse, HealthSnapshot, HttpRequest, HttpTransport, Result, ServiceHealth,
    ServiceStatus, StatusSummary, SystemClock,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::request::status_error;

type Listener = Arc<dyn Fn(&HealthSnapshot) + Send + Sync>;

/// Tracks whether the backend is reachable.
///
/// Every probe, successful or not, produces a fresh [`HealthSnapshot`] that
/// replaces the previous one and is pushed to subscribers. Failures are
/// counted; the backend is reported as [`ServiceStatus::Starting`] until
/// `failure_threshold` probes in a row have failed, then as
/// [`ServiceStatus::Error`]. A single successful probe resets the count.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    health_url: String,
    config: HealthConfig,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Arc<HealthSnapshot>>>,
    failures: AtomicU32,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    polling: Mutex<Option<PollTask>>,
}

struct PollTask {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("health_url", &self.inner.health_url)
            .field("failures", &self.consecutive_failures())
            .field("polling", &self.is_polling())
            .field("listeners", &lock(&self.inner.listeners).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HealthMonitor {
    /// Create a monitor probing `health` under the configured API base URL.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    /// Create a monitor whose snapshots are stamped by `clock`.
    #[must_use]
    pub fn with_clock(
        transport: Arc<dyn HttpTransport>,
        config: &ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                health_url: format!("{}health", config.base_url()),
                config: config.health.clone(),
                clock,
                snapshot: RwLock::new(None),
                failures: AtomicU32::new(0),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                polling: Mutex::new(None),
            }),
        }
    }

    /// Probe the backend once.
    ///
    /// The resulting snapshot is stored and published whether or not the
    /// probe succeeded.
    ///
    /// # Errors
    /// Returns the probe failure: timeout, transport error, non-2xx status
    /// or an undecodable body.
    pub async fn check_health(&self) -> Result<HealthSnapshot> {
        self.inner.check_health().await
    }

    /// Start polling with the configured interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self) {
        self.start_polling_every(self.inner.config.poll_interval);
    }

    /// Probe now and then every `interval` until [`stop_polling`] is called.
    ///
    /// Does nothing if already polling. Each tick runs its probe on its own
    /// task, so a slow probe never delays the next tick. Must be called
    /// from within a tokio runtime.
    ///
    /// [`stop_polling`]: Self::stop_polling
    pub fn start_polling_every(&self, interval: Duration) {
        let mut polling = lock(&self.inner.polling);
        if polling.is_some() {
            debug!("Health polling already running");
            return;
        }

        let token = CancellationToken::new();
        let cancel = token.clone();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        tokio::spawn(async move {
                            // Failures are already recorded in the snapshot.
                            let _ = inner.check_health().await;
                        });
                    }
                }
            }
            debug!("Health polling stopped");
        });

        debug!(interval = ?interval, "Health polling started");
        *polling = Some(PollTask {
            token,
            _handle: handle,
        });
    }

    /// Stop polling. Idempotent.
    pub fn stop_polling(&self) {
        if let Some(task) = lock(&self.inner.polling).take() {
            task.token.cancel();
        }
    }

    /// Whether the polling task is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        lock(&self.inner.polling).is_some()
    }

    /// Register a listener for new snapshots.
    ///
    /// The listener is called right away with the current snapshot, if any,
    /// then after every probe. A panicking listener is logged and skipped;
    /// it never affects other listeners or the monitor.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HealthSnapshot) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        lock(&self.inner.listeners).push((id, Arc::clone(&listener)));

        if let Some(snapshot) = self.health() {
            notify(id, &listener, &snapshot);
        }

        Subscription {
            id,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    /// The most recently completed snapshot, if any probe has finished.
    #[must_use]
    pub fn health(&self) -> Option<Arc<HealthSnapshot>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Backend status, database connectivity and API reachability.
    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        self.health()
            .map(|snapshot| snapshot.summary())
            .unwrap_or_default()
    }

    /// Whether the backend should be called at all.
    ///
    /// True until a probe has completed, then the last probe's reachability.
    #[must_use]
    pub fn is_backend_reachable(&self) -> bool {
        self.health().is_none_or(|snapshot| snapshot.api.reachable)
    }

    /// Probes failed in a row.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.failures.load(Ordering::Relaxed)
    }
}

impl Inner {
    #[instrument(skip(self), fields(url = %self.health_url))]
    async fn check_health(&self) -> Result<HealthSnapshot> {
        let started = Instant::now();
        let outcome = self.probe().await;
        let now = self.clock.now();

        let (snapshot, result) = match outcome {
            Ok(body) => {
                self.failures.store(0, Ordering::Relaxed);
                let snapshot = self.healthy_snapshot(&body, started.elapsed(), now);
                debug!(status = %snapshot.backend.status, "Health probe succeeded");
                (snapshot.clone(), Ok(snapshot))
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                let snapshot = self.failed_snapshot(failures, &e, now);
                warn!(failures, error = %e, "Health probe failed");
                (snapshot, Err(e))
            }
        };

        self.publish(snapshot);
        result
    }

    async fn probe(&self) -> Result<HealthResponse> {
        let timeout = self.config.probe_timeout;
        let request = HttpRequest::get(self.health_url.as_str());

        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_) => {
                return Err(ClientError::Timeout {
                    domain: Domain::Health,
                    after: timeout,
                });
            }
            Ok(Err(e)) => return Err(ClientError::Network(e.0)),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return Err(status_error(Domain::Health, None, &response));
        }
        response
            .json()
            .map_err(|e| ClientError::Unknown(format!("Invalid health response: {e}")))
    }

    fn frontend(now: DateTime<Utc>) -> ServiceHealth {
        ServiceHealth {
            status: ServiceStatus::Running,
            last_check: Some(now),
            ..Default::default()
        }
    }

    fn healthy_snapshot(
        &self,
        body: &HealthResponse,
        latency: Duration,
        now: DateTime<Utc>,
    ) -> HealthSnapshot {
        HealthSnapshot {
            backend: ServiceHealth {
                status: body.status.service_status(),
                uptime: body.uptime,
                last_check: Some(now),
                error: None,
            },
            frontend: Self::frontend(now),
            database: DatabaseHealth {
                connected: body.services.database,
                last_check: Some(now),
            },
            api: ApiHealth {
                reachable: true,
                latency: Some(latency),
                last_check: Some(now),
            },
            timestamp: Some(now),
        }
    }

    fn failed_snapshot(
        &self,
        failures: u32,
        error: &ClientError,
        now: DateTime<Utc>,
    ) -> HealthSnapshot {
        let status = if failures >= self.config.failure_threshold {
            ServiceStatus::Error
        } else {
            ServiceStatus::Starting
        };

        HealthSnapshot {
            backend: ServiceHealth {
                status,
                uptime: None,
                last_check: Some(now),
                error: Some(error.to_string()),
            },
            frontend: Self::frontend(now),
            database: DatabaseHealth {
                connected: false,
                last_check: Some(now),
            },
            api: ApiHealth {
                reachable: false,
                latency: None,
                last_check: Some(now),
            },
            timestamp: Some(now),
        }
    }

    fn publish(&self, snapshot: HealthSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        // Call listeners without holding the lock so they may (un)subscribe.
        let listeners = lock(&self.listeners).clone();
        for (id, listener) in &listeners {
            notify(*id, listener, &snapshot);
        }
    }
}

fn notify(id: u64, listener: &Listener, snapshot: &HealthSnapshot) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        warn!(listener = id, "Health listener panicked");
    }
}

/// Handle returned by [`HealthMonitor::subscribe`].
#[derive(Debug)]
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Subscription {
    id: u64,
    monitor: Weak<Inner>,
}

impl Subscription {
    /// Remove the listener. Later snapshots are not delivered to it.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.monitor.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use std::sync::atomic::AtomicUsize;
    use terminal_core::ManualClock;

    const HEALTHY: &str = r#"{"status":"healthy","uptime":1234.5,"services":{"database":true}}"#;

    fn monitor(transport: &Arc<ScriptedTransport>) -> HealthMonitor {
        let config = ClientConfig::new("http://localhost:8000/api/");
        HealthMonitor::with_clock(
            transport.clone(),
            &config,
            Arc::new(ManualClock::default()),
        )
    }

    #[tokio::test]
    async fn test_reachable_before_first_probe() {
        let transport = ScriptedTransport::new();
        let monitor = monitor(&transport);

        assert!(monitor.health().is_none());
        assert!(monitor.is_backend_reachable());
        assert_eq!(monitor.status_summary().backend, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_successful_probe_maps_body() {
        let transport = ScriptedTransport::new();
        transport.reply(200, HEALTHY);
        let monitor = monitor(&transport);

        let snapshot = monitor.check_health().await.unwrap();
        assert_eq!(snapshot.backend.status, ServiceStatus::Running);
        assert_eq!(snapshot.backend.uptime, Some(1234.5));
        assert!(snapshot.database.connected);
        assert!(snapshot.api.reachable);
        assert!(snapshot.api.latency.is_some());
        assert_eq!(snapshot.frontend.status, ServiceStatus::Running);

        assert_eq!(
            transport.requests()[0].url,
            "http://localhost:8000/api/health"
        );
    }

    #[tokio::test]
    async fn test_degraded_and_unhealthy_bodies() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"status":"degraded","services":{"database":false}}"#);
        transport.reply(200, r#"{"status":"unhealthy","services":{"database":true}}"#);
        let monitor = monitor(&transport);

        let degraded = monitor.check_health().await.unwrap();
        assert_eq!(degraded.backend.status, ServiceStatus::Starting);
        assert!(!degraded.database.connected);
        assert!(degraded.api.reachable);

        let unhealthy = monitor.check_health().await.unwrap();
        assert_eq!(unhealthy.backend.status, ServiceStatus::Error);
    }

    #[tokio::test]
    async fn test_three_failures_then_one_success() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.reply(500, "internal error");
        }
        transport.reply(200, HEALTHY);
        let monitor = monitor(&transport);

        for expected in ["starting", "starting", "error"] {
            let err = monitor.check_health().await.unwrap_err();
            assert_eq!(err.code(), "HEALTH_REQUEST_FAILED");
            assert_eq!(err.status(), Some(500));
            assert_eq!(monitor.status_summary().backend, expected);
        }

        let summary = monitor.status_summary();
        assert!(!summary.api);
        assert!(!summary.database);
        assert!(!monitor.is_backend_reachable());
        assert_eq!(monitor.consecutive_failures(), 3);

        monitor.check_health().await.unwrap();
        let summary = monitor.status_summary();
        assert_eq!(summary.backend, "running");
        assert!(summary.api);
        assert!(summary.database);
        assert_eq!(monitor.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_isolated_failure_stays_starting() {
        let transport = ScriptedTransport::new();
        transport.reply(200, HEALTHY);
        transport.fail("connection reset");
        transport.reply(200, HEALTHY);
        transport.fail("connection reset");
        let monitor = monitor(&transport);

        monitor.check_health().await.unwrap();
        let err = monitor.check_health().await.unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert_eq!(monitor.status_summary().backend, ServiceStatus::Starting);

        monitor.check_health().await.unwrap();
        monitor.check_health().await.unwrap_err();
        let snapshot = monitor.health().unwrap();
        assert_eq!(snapshot.backend.status, ServiceStatus::Starting);
        assert!(snapshot.backend.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout() {
        let transport = ScriptedTransport::new();
        transport.reply(200, HEALTHY);
        transport.set_delay(Duration::from_secs(10));
        let monitor = monitor(&transport);

        let err = monitor.check_health().await.unwrap_err();
        assert_eq!(err.code(), "REQUEST_TIMEOUT");
        assert!(!monitor.is_backend_reachable());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_a_failure() {
        let transport = ScriptedTransport::new();
        transport.reply(200, "<html>proxy</html>");
        let monitor = monitor(&transport);

        let err = monitor.check_health().await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_ERROR");
        assert_eq!(monitor.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_and_panicking_listener() {
        let transport = ScriptedTransport::new();
        transport.reply(200, HEALTHY);
        transport.reply(503, "");
        transport.reply(200, HEALTHY);
        let monitor = monitor(&transport);

        let panics = monitor.subscribe(|_| panic!("listener bug"));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let subscription = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.check_health().await.unwrap();
        monitor.check_health().await.unwrap_err();
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        panics.unsubscribe();
        monitor.check_health().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_snapshot() {
        let transport = ScriptedTransport::new();
        transport.reply(200, HEALTHY);
        let monitor = monitor(&transport);
        monitor.check_health().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = monitor.subscribe(move |snapshot| {
            lock(&sink).push(snapshot.backend.status);
        });
        assert_eq!(*lock(&seen), vec![ServiceStatus::Running]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_is_idempotent_and_stoppable() {
        let transport = ScriptedTransport::new();
        transport.repeat(200, HEALTHY);
        let monitor = monitor(&transport);

        monitor.start_polling_every(Duration::from_secs(30));
        monitor.start_polling_every(Duration::from_secs(30));
        assert!(monitor.is_polling());

        // Immediate probe.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.calls(), 2);

        monitor.stop_polling();
        monitor.stop_polling();
        assert!(!monitor.is_polling());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(monitor.status_summary().backend, ServiceStatus::Running);
    }
}
