//! Metrics and monitoring for the orchestration service
//!
//! Prometheus metrics collection plus the HTTP server exposing health and
//! metrics endpoints.

pub mod collector;
pub mod health;

pub use collector::{CacheMetrics, GameMetrics, MetricsCollector, ServiceMetrics, SweepMetrics};
pub use health::{HealthServer, HealthServerConfig};

use std::sync::Arc;

/// Unified metrics service combining collection and the HTTP endpoints
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// Get the metrics collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Start the metrics service (health endpoints)
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    /// Stop the metrics service
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
