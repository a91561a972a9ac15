//! System health snapshot types.
//!
//! A [`HealthSnapshot`] is produced by the health monitor on every probe and
//! replaced wholesale; nothing mutates a published snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle status of a service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Never polled.
    #[default]
    Stopped,
    /// Degraded, or failing but below the failure threshold.
    Starting,
    /// Last probe succeeded.
    Running,
    /// Unhealthy, or failed at least the threshold number of times in a row.
    Error,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        })
    }
}

impl PartialEq<&str> for ServiceStatus {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Health of a single service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Current status.
    pub status: ServiceStatus,
    /// Uptime reported by the service, in seconds.
    pub uptime: Option<f64>,
    /// Time of the check that produced this value.
    pub last_check: Option<DateTime<Utc>>,
    /// Failure description when the check failed.
    pub error: Option<String>,
}

/// Database connectivity as reported by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// Whether the backend can reach its database.
    pub connected: bool,
    /// Time of the check that produced this value.
    pub last_check: Option<DateTime<Utc>>,
}

/// Reachability of the backend API from this client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the last probe got a successful response.
    pub reachable: bool,
    /// Round-trip time of the last successful probe.
    pub latency: Option<Duration>,
    /// Time of the check that produced this value.
    pub last_check: Option<DateTime<Utc>>,
}

/// Complete system health at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Backend service.
    pub backend: ServiceHealth,
    /// This client.
    pub frontend: ServiceHealth,
    /// Backend database.
    pub database: DatabaseHealth,
    /// API reachability.
    pub api: ApiHealth,
    /// When the snapshot was produced.
    pub timestamp: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// Projects the snapshot to the fields the UI polls.
    #[must_use]
    pub const fn summary(&self) -> StatusSummary {
        StatusSummary {
            backend: self.backend.status,
            database: self.database.connected,
            api: self.api.reachable,
        }
    }
}

/// Cheap projection of a [`HealthSnapshot`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Backend status.
    pub backend: ServiceStatus,
    /// Whether the database is connected.
    pub database: bool,
    /// Whether the API is reachable.
    pub api: bool,
}

/// Self-reported status in the backend health body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability.
    Degraded,
    /// Not operational.
    Unhealthy,
}

impl BackendStatus {
    /// Maps the self-reported status onto the client's service status.
    #[must_use]
    pub const fn service_status(self) -> ServiceStatus {
        match self {
            Self::Healthy => ServiceStatus::Running,
            Self::Degraded => ServiceStatus::Starting,
            Self::Unhealthy => ServiceStatus::Error,
        }
    }
}

/// Dependent services in the backend health body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendServices {
    /// Database connectivity.
    #[serde(default)]
    pub database: bool,
}

/// Body of the backend health endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Self-reported status.
    pub status: BackendStatus,
    /// Backend uptime in seconds.
    #[serde(default)]
    pub uptime: Option<f64>,
    /// Dependent services.
    #[serde(default)]
    pub services: BackendServices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_status_mapping() {
        assert_eq!(
            BackendStatus::Healthy.service_status(),
            ServiceStatus::Running
        );
        assert_eq!(
            BackendStatus::Degraded.service_status(),
            ServiceStatus::Starting
        );
        assert_eq!(
            BackendStatus::Unhealthy.service_status(),
            ServiceStatus::Error
        );
    }

    #[test]
    fn test_health_body_decodes() {
        let body: HealthResponse = serde_json::from_str(
            r#"{"status":"degraded","uptime":12.5,"services":{"database":false}}"#,
        )
        .unwrap();
        assert_eq!(body.status, BackendStatus::Degraded);
        assert!(!body.services.database);

        let minimal: HealthResponse = serde_json::from_str(r#"{"status":"healthy"}"#).unwrap();
        assert_eq!(minimal.uptime, None);
    }

    #[test]
    fn test_summary_projection() {
        let mut snapshot = HealthSnapshot::default();
        assert_eq!(snapshot.summary().backend, "stopped");
        snapshot.backend.status = ServiceStatus::Running;
        snapshot.api.reachable = true;
        let summary = snapshot.summary();
        assert_eq!(summary.backend, ServiceStatus::Running);
        assert!(summary.api);
        assert!(!summary.database);
    }
}
