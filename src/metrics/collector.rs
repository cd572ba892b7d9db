//! Metrics collection using Prometheus

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;

use crate::types::EndReason;

/// Main metrics collector for the orchestration service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Game lifecycle metrics
    game_metrics: GameMetrics,

    /// Disconnect sweep metrics
    sweep_metrics: SweepMetrics,

    /// Cache and gateway backend metrics
    cache_metrics: CacheMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Game lifecycle metrics
#[derive(Clone)]
pub struct GameMetrics {
    /// Total games created on this instance
    pub games_created_total: IntCounter,

    /// Total games ended, labelled by end reason
    pub games_ended_total: IntCounterVec,

    /// Duplicate creations observed and skipped
    pub duplicate_creations_total: IntCounter,

    /// Games currently owned by this instance
    pub owned_games: IntGauge,

    /// Total moves approved and applied
    pub moves_approved_total: IntCounter,

    /// Moves dropped, labelled by rejection reason
    pub moves_rejected_total: IntCounterVec,

    /// Games in the live ranked view
    pub live_ranked_games: IntGauge,
}

/// Disconnect sweep metrics
#[derive(Clone)]
pub struct SweepMetrics {
    /// Games terminated by the disconnect sweep
    pub sweep_terminations_total: IntCounter,

    /// Games with at least one tracked disconnected player
    pub tracked_disconnects: IntGauge,

    /// Sweep tick duration
    pub sweep_duration_seconds: Histogram,
}

/// Backend metrics
#[derive(Clone)]
pub struct CacheMetrics {
    /// Cache operation failures, labelled by operation
    pub cache_failures_total: IntCounterVec,

    /// Viewer gateway refresh failures
    pub gateway_failures_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let game_metrics = GameMetrics::new(&registry)?;
        let sweep_metrics = SweepMetrics::new(&registry)?;
        let cache_metrics = CacheMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            game_metrics,
            sweep_metrics,
            cache_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn game(&self) -> &GameMetrics {
        &self.game_metrics
    }

    pub fn sweep(&self) -> &SweepMetrics {
        &self.sweep_metrics
    }

    pub fn cache(&self) -> &CacheMetrics {
        &self.cache_metrics
    }

    /// Record a game creation
    pub fn record_game_created(&self) {
        self.game_metrics.games_created_total.inc();
        self.game_metrics.owned_games.inc();
    }

    /// Record a game ending for the given reason
    pub fn record_game_ended(&self, reason: EndReason) {
        let label = match reason {
            EndReason::PlayerResigned => "player_resigned",
            EndReason::PlayerLeft => "player_left",
            EndReason::PlayerTimeout => "player_timeout",
            EndReason::GameTimeout => "game_timeout",
            EndReason::Empty => "outcome",
        };
        self.game_metrics
            .games_ended_total
            .with_label_values(&[label])
            .inc();
        self.game_metrics.owned_games.dec();
    }

    /// Record an approved move
    pub fn record_move_approved(&self) {
        self.game_metrics.moves_approved_total.inc();
    }

    /// Record a dropped move
    pub fn record_move_rejected(&self, reason: &str) {
        self.game_metrics
            .moves_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a cache operation failure
    pub fn record_cache_failure(&self, operation: &str) {
        self.cache_metrics
            .cache_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("arbiter_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "arbiter_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("arbiter_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl GameMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let games_created_total = IntCounter::new(
            "arbiter_games_created_total",
            "Total games created on this instance",
        )?;
        registry.register(Box::new(games_created_total.clone()))?;

        let games_ended_total = IntCounterVec::new(
            Opts::new("arbiter_games_ended_total", "Total games ended"),
            &["reason"],
        )?;
        registry.register(Box::new(games_ended_total.clone()))?;

        let duplicate_creations_total = IntCounter::new(
            "arbiter_duplicate_creations_total",
            "Duplicate game creations skipped",
        )?;
        registry.register(Box::new(duplicate_creations_total.clone()))?;

        let owned_games = IntGauge::new(
            "arbiter_owned_games",
            "Games currently owned by this instance",
        )?;
        registry.register(Box::new(owned_games.clone()))?;

        let moves_approved_total =
            IntCounter::new("arbiter_moves_approved_total", "Total moves approved")?;
        registry.register(Box::new(moves_approved_total.clone()))?;

        let moves_rejected_total = IntCounterVec::new(
            Opts::new("arbiter_moves_rejected_total", "Moves dropped"),
            &["reason"],
        )?;
        registry.register(Box::new(moves_rejected_total.clone()))?;

        let live_ranked_games = IntGauge::new(
            "arbiter_live_ranked_games",
            "Games in the live ranked view",
        )?;
        registry.register(Box::new(live_ranked_games.clone()))?;

        Ok(Self {
            games_created_total,
            games_ended_total,
            duplicate_creations_total,
            owned_games,
            moves_approved_total,
            moves_rejected_total,
            live_ranked_games,
        })
    }
}

impl SweepMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sweep_terminations_total = IntCounter::new(
            "arbiter_sweep_terminations_total",
            "Games terminated by the disconnect sweep",
        )?;
        registry.register(Box::new(sweep_terminations_total.clone()))?;

        let tracked_disconnects = IntGauge::new(
            "arbiter_tracked_disconnects",
            "Games with at least one disconnected player",
        )?;
        registry.register(Box::new(tracked_disconnects.clone()))?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("arbiter_sweep_duration_seconds", "Sweep tick duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            sweep_terminations_total,
            tracked_disconnects,
            sweep_duration_seconds,
        })
    }
}

impl CacheMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let cache_failures_total = IntCounterVec::new(
            Opts::new("arbiter_cache_failures_total", "Cache operation failures"),
            &["operation"],
        )?;
        registry.register(Box::new(cache_failures_total.clone()))?;

        let gateway_failures_total = IntCounter::new(
            "arbiter_gateway_failures_total",
            "Viewer gateway refresh failures",
        )?;
        registry.register(Box::new(gateway_failures_total.clone()))?;

        Ok(Self {
            cache_failures_total,
            gateway_failures_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _game = collector.game();
        let _sweep = collector.sweep();
        let _cache = collector.cache();
    }

    #[test]
    fn test_game_lifecycle_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_game_created();
        collector.record_game_created();
        assert_eq!(collector.game().owned_games.get(), 2);

        collector.record_game_ended(EndReason::PlayerLeft);
        assert_eq!(collector.game().owned_games.get(), 1);

        collector.record_move_approved();
        collector.record_move_rejected("not_turn");
        collector.record_cache_failure("add_game");
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().unwrap();

        collector.update_health_status(2);
        collector.update_component_health("cache", true);
        collector.update_component_health("amqp", false);
    }

    #[test]
    fn test_registry_gathers_registered_metrics() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_game_created();

        let families = collector.registry().gather();
        assert!(families
            .iter()
            .any(|mf| mf.get_name() == "arbiter_games_created_total"));
    }
}
