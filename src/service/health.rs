//! Health check for the orchestration service
//!
//! Component checks cover the shared cache, the AMQP transport, and the
//! local registries; the aggregate status backs the health endpoints.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Games currently owned by this instance
    pub owned_games: usize,
    /// Games with at least one tracked disconnected player
    pub tracked_disconnects: usize,
    /// Games in the live discovery view
    pub live_games: usize,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let running_check = Self::check_service_running(&app_state).await;
        if running_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(running_check);

        let cache_check = Self::check_cache(&app_state).await;
        if cache_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(cache_check);

        let stats = ServiceStats {
            owned_games: app_state.manager().game_count(),
            tracked_disconnects: app_state.tracker().tracked_game_count(),
            live_games: app_state.live_games().len(),
        };

        debug!(
            "Health check completed - status: {}, owned_games: {}",
            overall_status, stats.owned_games
        );

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    async fn check_service_running(app_state: &Arc<AppState>) -> ComponentCheck {
        let start = std::time::Instant::now();
        let running = app_state.is_running().await;

        ComponentCheck {
            name: "service".to_string(),
            status: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: (!running).then(|| "service is not running".to_string()),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_cache(app_state: &Arc<AppState>) -> ComponentCheck {
        let start = std::time::Instant::now();

        match app_state.cache().ping().await {
            Ok(()) => ComponentCheck {
                name: "cache".to_string(),
                status: HealthStatus::Healthy,
                message: None,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => ComponentCheck {
                name: "cache".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "unhealthy");
    }
}
