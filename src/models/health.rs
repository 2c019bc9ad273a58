use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, ServiceHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: DependencyStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: DependencyStatus::Healthy,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            status: DependencyStatus::Unhealthy,
            response_time_ms: None,
            error: Some(error),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == DependencyStatus::Healthy
    }
}

impl HealthCheckResponse {
    /// Overall status is `Ok` only when every dependency is healthy; the first
    /// failing check (by name) becomes the top-level error.
    pub fn from_checks(checks: BTreeMap<String, ServiceHealth>) -> Self {
        let error = checks
            .iter()
            .find(|(_, health)| !health.is_healthy())
            .map(|(name, health)| {
                format!(
                    "{}: {}",
                    name,
                    health.error.as_deref().unwrap_or("unhealthy")
                )
            });

        Self {
            status: if error.is_none() {
                HealthStatus::Ok
            } else {
                HealthStatus::Error
            },
            error,
            timestamp: Utc::now(),
            checks,
        }
    }
}
