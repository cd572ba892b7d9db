//! Main application state and service coordination
//!
//! Constructs every component once at startup with explicit injection — no
//! globals — wires the AMQP subscriptions to their dedicated fact workers,
//! and runs the background tickers for the disconnect sweep and the
//! live-list refresh.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::consumer::{spawn_fact_worker, FactConsumer};
use crate::amqp::messages::{
    GAME_EVENTS_EXCHANGE, GAME_EVENTS_QUEUE, GAME_FACT_BINDINGS, MATCH_EVENTS_EXCHANGE,
    USERS_MATCHED_QUEUE, USERS_MATCHED_ROUTING_KEY,
};
use crate::amqp::publisher::{AmqpEventPublisher, PublisherConfig};
use crate::cache::{GameCache, RedisGameCache};
use crate::config::AppConfig;
use crate::game::{ConnectionTracker, GameManager};
use crate::live::{HttpViewerGateway, LiveGamesService};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::service::dispatcher::GameService;
use amqprs::channel::{
    Channel, ExchangeDeclareArguments, QueueBindArguments, QueueDeclareArguments,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of each subscription's fact channel
const FACT_CHANNEL_CAPACITY: usize = 1024;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Cache connection error: {message}")]
    CacheConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// The event dispatcher
    service: Arc<GameService>,

    /// Registry of games owned by this instance
    manager: Arc<GameManager>,

    /// Disconnect tracking
    tracker: Arc<ConnectionTracker>,

    /// Shared game cache
    cache: Arc<dyn GameCache>,

    /// Live-games discovery view
    live_games: Arc<LiveGamesService>,

    /// AMQP connection
    amqp_connection: Arc<AmqpConnection>,

    /// Metrics and health endpoints
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Active queue consumers
    consumers: Vec<FactConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies. Failure to reach
    /// the cache or the AMQP broker here means the process must not start
    /// serving.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!(
            "Initializing {} - instance: {}",
            config.service.name, config.service.instance_id
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;
        let cache = Self::initialize_cache(&config).await?;
        let metrics_service = Self::initialize_metrics(&config)?;
        let metrics = metrics_service.collector();

        let tracker = Arc::new(ConnectionTracker::new());

        let gateway = Arc::new(HttpViewerGateway::new(&config.live.gateway_url));
        let live_games = Arc::new(LiveGamesService::new(gateway, config.live.max_ranked_games));

        let publisher_channel = Self::open_channel(&amqp_connection).await?;
        let event_publisher = Arc::new(
            AmqpEventPublisher::new(publisher_channel, PublisherConfig::default())
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("failed to initialize event publisher: {}", e),
                })?,
        );

        let manager = Arc::new(GameManager::new(
            tracker.clone(),
            cache.clone(),
            event_publisher.clone(),
            live_games.clone(),
            metrics.clone(),
            config.disconnect_threshold(),
        ));

        let service = Arc::new(GameService::new(
            config.service.instance_id.clone(),
            manager.clone(),
            tracker.clone(),
            cache.clone(),
            event_publisher,
            live_games.clone(),
            metrics,
            config.game_settings(),
        ));

        Ok(Self {
            config,
            service,
            manager,
            tracker,
            cache,
            live_games,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            consumers: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start all background services and fact consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {}", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_metrics_service();
        self.start_fact_consumption().await?;
        self.start_background_tasks();

        info!("{} started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown: stop accepting facts, let in-flight
    /// handlers drain, stop the tickers.
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        for consumer in &self.consumers {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop consumer: {}", e);
            }
        }
        self.consumers.clear();

        // Let in-flight handler invocations drain before stopping the tasks
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        info!(
            "Shutdown completed - {} games were owned by this instance",
            self.manager.game_count()
        );
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn game_service(&self) -> Arc<GameService> {
        self.service.clone()
    }

    pub fn manager(&self) -> Arc<GameManager> {
        self.manager.clone()
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    pub fn cache(&self) -> Arc<dyn GameCache> {
        self.cache.clone()
    }

    pub fn live_games(&self) -> Arc<LiveGamesService> {
        self.live_games.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let mut amqp_config =
            AmqpConfig::from_url(&config.amqp.url).map_err(|e| ServiceError::Configuration {
                message: format!("failed to parse AMQP URL: {}", e),
            })?;
        amqp_config.max_retries = config.amqp.max_retry_attempts;
        amqp_config.retry_delay_ms = config.amqp.retry_delay_ms;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    async fn initialize_cache(config: &AppConfig) -> Result<Arc<dyn GameCache>, ServiceError> {
        info!("Connecting to game cache: {}", config.cache.url);

        let cache = RedisGameCache::connect(
            &config.cache.url,
            config.service.instance_id.clone(),
            config.finished_game_ttl(),
        )
        .await
        .map_err(|e| ServiceError::CacheConnection {
            message: format!("failed to connect to cache: {}", e),
        })?;

        cache.ping().await.map_err(|e| ServiceError::CacheConnection {
            message: format!("cache ping failed: {}", e),
        })?;

        Ok(Arc::new(cache))
    }

    fn initialize_metrics(config: &AppConfig) -> Result<Arc<MetricsService>, ServiceError> {
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(HealthServer::new(health_config, metrics_collector.clone()));
        Ok(Arc::new(MetricsService::new(
            metrics_collector,
            health_server,
        )))
    }

    async fn open_channel(connection: &Arc<AmqpConnection>) -> Result<Channel, ServiceError> {
        connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("failed to open AMQP channel: {}", e),
            })
    }

    fn start_metrics_service(&mut self) {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.metrics_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(handle);

        info!("Metrics and health endpoints starting on port {}", port);
    }

    /// Declare the exchanges and queues, bind the routing keys, and start
    /// one consumer plus one dedicated fact worker per subscription.
    async fn start_fact_consumption(&mut self) -> Result<(), ServiceError> {
        // Matchmaking facts subscription
        let match_channel = Self::open_channel(&self.amqp_connection).await?;
        Self::declare_and_bind(
            &match_channel,
            MATCH_EVENTS_EXCHANGE,
            USERS_MATCHED_QUEUE,
            &[USERS_MATCHED_ROUTING_KEY],
        )
        .await?;

        let (match_tx, match_rx) = mpsc::channel(FACT_CHANNEL_CAPACITY);
        let match_consumer = FactConsumer::new(match_channel, match_tx);
        match_consumer
            .start_consuming(USERS_MATCHED_QUEUE)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("failed to consume matchmaking facts: {}", e),
            })?;
        self.consumers.push(match_consumer);
        self.background_tasks.push(spawn_fact_worker(
            "matchmaking",
            match_rx,
            self.service.clone(),
        ));

        // Wildcard game-events subscription: every game fact for this
        // instance funnels through this one worker
        let game_channel = Self::open_channel(&self.amqp_connection).await?;
        Self::declare_and_bind(
            &game_channel,
            GAME_EVENTS_EXCHANGE,
            GAME_EVENTS_QUEUE,
            GAME_FACT_BINDINGS,
        )
        .await?;

        let (game_tx, game_rx) = mpsc::channel(FACT_CHANNEL_CAPACITY);
        let game_consumer = FactConsumer::new(game_channel, game_tx);
        game_consumer
            .start_consuming(GAME_EVENTS_QUEUE)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("failed to consume game facts: {}", e),
            })?;
        self.consumers.push(game_consumer);
        self.background_tasks.push(spawn_fact_worker(
            "game-events",
            game_rx,
            self.service.clone(),
        ));

        info!("Fact consumption started on both subscriptions");
        Ok(())
    }

    async fn declare_and_bind(
        channel: &Channel,
        exchange: &str,
        queue: &str,
        routing_keys: &[&str],
    ) -> Result<(), ServiceError> {
        let exchange_args = ExchangeDeclareArguments::new(exchange, "topic");
        channel.exchange_declare(exchange_args).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("failed to declare exchange {}: {}", exchange, e),
            }
        })?;

        let queue_args = QueueDeclareArguments::new(queue)
            .durable(true)
            .auto_delete(false)
            .finish();
        channel
            .queue_declare(queue_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("failed to declare queue {}: {}", queue, e),
            })?;

        for routing_key in routing_keys {
            let bind_args = QueueBindArguments::new(queue, exchange, routing_key);
            channel
                .queue_bind(bind_args)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!(
                        "failed to bind {} to {} with key {}: {}",
                        queue, exchange, routing_key, e
                    ),
                })?;
        }

        debug!(
            "Declared queue '{}' bound to '{}' with {} keys",
            queue,
            exchange,
            routing_keys.len()
        );
        Ok(())
    }

    /// Independent tickers for the disconnect sweep and the live-list
    /// refresh. They run concurrently with the fact workers, so a slow
    /// backend call in one never blocks fact processing.
    fn start_background_tasks(&mut self) {
        // Disconnect sweep
        let sweep_task = {
            let manager = self.manager.clone();
            let interval = self.config.sweep_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                info!("Disconnect sweep task started ({:?} interval)", interval);

                while *is_running.read().await {
                    ticker.tick().await;

                    match manager.sweep_disconnected().await {
                        Ok(0) => {}
                        Ok(swept) => info!("Disconnect sweep terminated {} games", swept),
                        Err(e) => warn!("Disconnect sweep failed: {}", e),
                    }
                }

                info!("Disconnect sweep task stopped");
            })
        };

        // Live-list refresh
        let refresh_task = {
            let live_games = self.live_games.clone();
            let metrics = self.metrics_service.collector();
            let interval = self.config.live_refresh_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                info!("Live-list refresh task started ({:?} interval)", interval);

                while *is_running.read().await {
                    ticker.tick().await;

                    match live_games.refresh().await {
                        Ok(()) => {
                            metrics
                                .game()
                                .live_ranked_games
                                .set(live_games.ranked().len() as i64);
                        }
                        Err(e) => {
                            metrics.cache().gateway_failures_total.inc();
                            warn!("Live-list refresh failed: {}", e);
                        }
                    }
                }

                info!("Live-list refresh task stopped");
            })
        };

        // Uptime and health gauges
        let health_task = {
            let metrics = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
                let start_time = tokio::time::Instant::now();

                while *is_running.read().await {
                    ticker.tick().await;

                    metrics
                        .service()
                        .uptime_seconds
                        .set(start_time.elapsed().as_secs() as i64);
                    metrics.update_health_status(2);
                }
            })
        };

        self.background_tasks.push(sweep_task);
        self.background_tasks.push(refresh_task);
        self.background_tasks.push(health_task);

        info!("Background tasks started");
    }
}
