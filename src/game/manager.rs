//! Game manager
//!
//! Per-instance registry of the games this instance owns, plus the periodic
//! disconnect sweep that turns stale tracked disconnects into terminations.
//! Registry access is mutex-protected; no lock is ever held across a cache
//! or publish call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::amqp::publisher::EventPublisher;
use crate::cache::GameCache;
use crate::error::Result;
use crate::game::game::Game;
use crate::game::tracker::ConnectionTracker;
use crate::live::LiveGamesService;
use crate::metrics::MetricsCollector;
use crate::types::{EndReason, GameEnded, GameId, GameOutcome, PlayerId};
use crate::utils::current_timestamp;

/// Registry of games owned by this instance. A game is owned by exactly one
/// instance at a time: the one whose subscription first processed its
/// creation.
pub struct GameManager {
    games: Mutex<HashMap<GameId, Game>>,
    tracker: Arc<ConnectionTracker>,
    cache: Arc<dyn GameCache>,
    event_publisher: Arc<dyn EventPublisher>,
    live_games: Arc<LiveGamesService>,
    metrics: Arc<MetricsCollector>,
    disconnect_threshold: Duration,
}

impl GameManager {
    pub fn new(
        tracker: Arc<ConnectionTracker>,
        cache: Arc<dyn GameCache>,
        event_publisher: Arc<dyn EventPublisher>,
        live_games: Arc<LiveGamesService>,
        metrics: Arc<MetricsCollector>,
        disconnect_threshold: Duration,
    ) -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
            tracker,
            cache,
            event_publisher,
            live_games,
            metrics,
            disconnect_threshold,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GameId, Game>> {
        self.games.lock().expect("games registry lock poisoned")
    }

    /// Register a newly created game as owned by this instance.
    pub fn add_game(&self, game: Game) {
        let mut games = self.lock();
        games.insert(game.id(), game);
    }

    /// Clone of an owned game, if present.
    pub fn get_game(&self, game_id: &GameId) -> Option<Game> {
        self.lock().get(game_id).cloned()
    }

    /// Remove a game from the registry, returning it.
    pub fn remove_game(&self, game_id: &GameId) -> Option<Game> {
        self.lock().remove(game_id)
    }

    /// Run a closure against an owned game under the registry lock. Returns
    /// None when the game is not owned here. The closure must not block.
    pub fn update_game<T>(&self, game_id: &GameId, f: impl FnOnce(&mut Game) -> T) -> Option<T> {
        let mut games = self.lock();
        games.get_mut(game_id).map(f)
    }

    /// Linear scan preventing a player from being in two simultaneous games
    /// on this instance.
    pub fn check_by_player(&self, player_id: &str) -> bool {
        self.lock().values().any(|game| game.has_player(player_id))
    }

    /// Number of games owned by this instance.
    pub fn game_count(&self) -> usize {
        self.lock().len()
    }

    /// Ids of all owned games.
    pub fn owned_game_ids(&self) -> Vec<GameId> {
        self.lock().keys().copied().collect()
    }

    /// One sweep tick: collect games whose earliest disconnected player is
    /// past the threshold, deactivate the owned and still-active ones,
    /// persist all deactivations in a single batched cache call, publish one
    /// GameEnded per game attributing the disconnected player, and drop them
    /// from the registry. Each game's termination is independent — batching
    /// only bounds round trips per tick.
    pub async fn sweep_disconnected(&self) -> Result<usize> {
        let started = Instant::now();
        let due = self.tracker.games_needing_termination(self.disconnect_threshold);

        self.metrics
            .sweep()
            .tracked_disconnects
            .set(self.tracker.tracked_game_count() as i64);

        if due.is_empty() {
            return Ok(0);
        }

        // Take the terminated games out of the registry while holding the
        // lock, then do all backend work without it.
        let terminated: Vec<(Game, PlayerId)> = {
            let mut games = self.lock();
            due.into_iter()
                .filter_map(|(game_id, leaver)| {
                    match games.get(&game_id) {
                        Some(game) if game.is_active() => {}
                        _ => return None,
                    }
                    let mut game = games.remove(&game_id)?;
                    game.deactivate();
                    Some((game, leaver))
                })
                .collect()
        };

        if terminated.is_empty() {
            return Ok(0);
        }

        info!(
            "Disconnect sweep terminating {} games",
            terminated.len()
        );

        let games_only: Vec<Game> = terminated.iter().map(|(g, _)| g.clone()).collect();
        if let Err(e) = self.cache.deactivate_games(&games_only).await {
            self.metrics.record_cache_failure("deactivate_games");
            warn!("Sweep failed to persist deactivations: {}", e);
            return Err(e);
        }

        for (game, leaver) in &terminated {
            self.live_games.remove(&game.id());

            let winner = game
                .opponent_of(leaver)
                .map(|opponent| GameOutcome::win_for(opponent.color))
                .unwrap_or(GameOutcome::NoOutcome);

            let event = GameEnded {
                game_id: game.id(),
                player1: game.player1().clone(),
                player2: game.player2().clone(),
                outcome: winner,
                description: EndReason::PlayerLeft,
                timestamp: current_timestamp(),
            };

            if let Err(e) = self.event_publisher.publish_game_ended(event).await {
                warn!(
                    "Failed to publish GameEnded for swept game {}: {}",
                    game.id(),
                    e
                );
                continue;
            }

            debug!(
                "Swept game {} - player '{}' disconnected past threshold",
                game.id(),
                leaver
            );
            self.metrics.sweep().sweep_terminations_total.inc();
            self.metrics.record_game_ended(EndReason::PlayerLeft);
        }

        self.metrics
            .sweep()
            .sweep_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        Ok(terminated.len())
    }
}
