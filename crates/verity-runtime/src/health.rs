//! Dependency health probing
//!
//! Probes never fail: each dependency reports healthy, unhealthy, or unknown
//! when it does not answer within the probe timeout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

impl ServiceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHealth::Healthy => "healthy",
            ServiceHealth::Unhealthy => "unhealthy",
            ServiceHealth::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesHealth {
    pub database: ServiceHealth,
    pub blockchain: ServiceHealth,
}

/// Body of the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub services: ServicesHealth,
}

impl HealthReport {
    pub fn new(database: ServiceHealth, blockchain: ServiceHealth) -> Self {
        let status = if database == ServiceHealth::Healthy && blockchain == ServiceHealth::Healthy
        {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };
        Self {
            status,
            timestamp: Utc::now(),
            services: ServicesHealth {
                database,
                blockchain,
            },
        }
    }
}

/// Run one probe under `timeout`
pub async fn probe<F>(check: F, timeout: Duration) -> ServiceHealth
where
    F: Future<Output = bool>,
{
    match tokio::time::timeout(timeout, check).await {
        Ok(true) => ServiceHealth::Healthy,
        Ok(false) => ServiceHealth::Unhealthy,
        Err(_) => ServiceHealth::Unknown,
    }
}
