//! Event dispatcher
//!
//! Routes inbound domain facts to game creation, move application, and
//! termination, and exposes the read operations consumed by delivery
//! layers. Facts for games not owned by this instance are silently
//! ignored — the transport's partition affinity routes them elsewhere.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::amqp::publisher::EventPublisher;
use crate::cache::GameCache;
use crate::error::Result;
use crate::game::{ConnectionTracker, Game, GameManager};
use crate::live::{LiveGameData, LiveGamesService, LivePlayer};
use crate::metrics::MetricsCollector;
use crate::types::{
    EndReason, Fact, GameCreated, GameEnded, GameId, GameMoveApproved, GameOutcome,
    GamePlayerConnected, GamePlayerDisconnected, GamePlayerLeft, GamePlayerMoved, GameSettings,
    PlayerId, UsersMatched,
};
use crate::utils::current_timestamp;

/// Outcome of applying a move fact inside the registry lock
enum MoveDisposition {
    NotActive,
    NotTurn,
    Illegal(String),
    Applied { game: Game, terminal: bool },
}

/// One entry of the ranked live-games page, combining discovery data with
/// per-game disconnection info
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedLiveGame {
    pub game: LiveGameData,
    pub disconnected_players: Vec<PlayerId>,
}

/// The authoritative event dispatcher for this instance
pub struct GameService {
    instance_id: String,
    manager: Arc<GameManager>,
    tracker: Arc<ConnectionTracker>,
    cache: Arc<dyn GameCache>,
    event_publisher: Arc<dyn EventPublisher>,
    live_games: Arc<LiveGamesService>,
    metrics: Arc<MetricsCollector>,
    game_settings: GameSettings,
}

impl GameService {
    pub fn new(
        instance_id: String,
        manager: Arc<GameManager>,
        tracker: Arc<ConnectionTracker>,
        cache: Arc<dyn GameCache>,
        event_publisher: Arc<dyn EventPublisher>,
        live_games: Arc<LiveGamesService>,
        metrics: Arc<MetricsCollector>,
        game_settings: GameSettings,
    ) -> Self {
        Self {
            instance_id,
            manager,
            tracker,
            cache,
            event_publisher,
            live_games,
            metrics,
            game_settings,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Single dispatch point over the closed fact vocabulary.
    pub async fn handle_fact(&self, fact: Fact) -> Result<()> {
        match fact {
            Fact::UsersMatched(m) => self.handle_users_matched(m).await,
            Fact::PlayerMoved(m) => self.handle_player_moved(m).await,
            Fact::PlayerLeft(m) => self.handle_player_left(m).await,
            Fact::PlayerDisconnected(m) => self.handle_player_disconnected(m),
            Fact::PlayerConnected(m) => self.handle_player_connected(m),
        }
    }

    /// Create a game for two matched users. Duplicate creation — locally or
    /// observed through the cache — is a benign no-op.
    async fn handle_users_matched(&self, fact: UsersMatched) -> Result<()> {
        if fact.user1.id == fact.user2.id {
            warn!(
                "Dropping match {} pairing user '{}' with itself",
                fact.match_id, fact.user1.id
            );
            return Ok(());
        }

        for user in [&fact.user1, &fact.user2] {
            if self.manager.check_by_player(&user.id) {
                debug!(
                    "Player '{}' already in a game on this instance; match {} is a no-op",
                    user.id, fact.match_id
                );
                return Ok(());
            }
            if self.cache.player_has_game(&user.id).await? {
                debug!(
                    "Player '{}' already indexed in the cache; match {} is a no-op",
                    user.id, fact.match_id
                );
                return Ok(());
            }
        }

        let game = Game::new(
            fact.user1.id.clone(),
            fact.user2.id.clone(),
            self.game_settings,
        );

        let created = self.cache.add_game(&game).await?;
        if !created {
            self.metrics.game().duplicate_creations_total.inc();
            debug!(
                "Game {} for match {} already created elsewhere",
                game.id(),
                fact.match_id
            );
            return Ok(());
        }

        let event = GameCreated {
            game_id: game.id(),
            player1: game.player1().clone(),
            player2: game.player2().clone(),
            timestamp: current_timestamp(),
        };

        let score_of = |player_id: &str| {
            if fact.user1.id == player_id {
                fact.user1.score
            } else {
                fact.user2.score
            }
        };
        self.live_games.add(
            game.id(),
            LivePlayer {
                id: game.player1().id.clone(),
                score: score_of(&game.player1().id),
            },
            LivePlayer {
                id: game.player2().id.clone(),
                score: score_of(&game.player2().id),
            },
            game.created_at(),
        );

        info!(
            "Created game {} for match {} - '{}' ({}) vs '{}' ({})",
            game.id(),
            fact.match_id,
            game.player1().id,
            game.player1().color,
            game.player2().id,
            game.player2().color
        );

        self.manager.add_game(game);
        self.metrics.record_game_created();
        self.event_publisher.publish_game_created(event).await
    }

    /// Apply a move fact. Out-of-turn and illegal moves are dropped
    /// silently: no event, no error back through this channel.
    async fn handle_player_moved(&self, fact: GamePlayerMoved) -> Result<()> {
        let disposition = self.manager.update_game(&fact.game_id, |game| {
            if !game.is_active() {
                return MoveDisposition::NotActive;
            }
            if game.turn().id != fact.player_id {
                return MoveDisposition::NotTurn;
            }
            match game.apply_move(&fact.mv) {
                Err(e) => MoveDisposition::Illegal(e.to_string()),
                Ok(()) => {
                    let terminal = game.outcome().is_terminal();
                    if terminal {
                        game.deactivate();
                    }
                    MoveDisposition::Applied {
                        game: game.clone(),
                        terminal,
                    }
                }
            }
        });

        let Some(disposition) = disposition else {
            // Not owned by this instance; the fact belongs to another one
            return Ok(());
        };

        match disposition {
            MoveDisposition::NotActive => {
                debug!("Dropping move for inactive game {}", fact.game_id);
                self.metrics.record_move_rejected("inactive");
                Ok(())
            }
            MoveDisposition::NotTurn => {
                debug!(
                    "Dropping out-of-turn move by '{}' in game {}",
                    fact.player_id, fact.game_id
                );
                self.metrics.record_move_rejected("not_turn");
                Ok(())
            }
            MoveDisposition::Illegal(reason) => {
                debug!(
                    "Dropping illegal move '{}' in game {}: {}",
                    fact.mv, fact.game_id, reason
                );
                self.metrics.record_move_rejected("illegal");
                Ok(())
            }
            MoveDisposition::Applied { game, terminal } => {
                if terminal {
                    self.finish_by_outcome(game, fact).await
                } else {
                    self.cache.update_game_move(&game).await?;
                    self.metrics.record_move_approved();
                    self.event_publisher
                        .publish_move_approved(GameMoveApproved {
                            game_id: fact.game_id,
                            player_id: fact.player_id,
                            mv: fact.mv,
                            timestamp: current_timestamp(),
                        })
                        .await
                }
            }
        }
    }

    /// A move produced a terminal outcome: persist-and-deactivate, then emit
    /// the move approval and the game end together.
    async fn finish_by_outcome(&self, game: Game, fact: GamePlayerMoved) -> Result<()> {
        self.manager.remove_game(&fact.game_id);
        self.tracker.clear_game(&fact.game_id);
        self.live_games.remove(&fact.game_id);

        self.cache.update_and_deactivate_game(&game).await?;

        self.metrics.record_move_approved();
        self.event_publisher
            .publish_move_approved(GameMoveApproved {
                game_id: fact.game_id,
                player_id: fact.player_id.clone(),
                mv: fact.mv,
                timestamp: current_timestamp(),
            })
            .await?;

        let outcome = game.outcome();
        info!("Game {} finished with outcome {:?}", game.id(), outcome);

        self.metrics.record_game_ended(EndReason::Empty);
        self.event_publisher
            .publish_game_ended(GameEnded {
                game_id: game.id(),
                player1: game.player1().clone(),
                player2: game.player2().clone(),
                outcome,
                description: EndReason::Empty,
                timestamp: current_timestamp(),
            })
            .await
    }

    /// A player explicitly left: terminate immediately, attributing the
    /// leaver and awarding the win to the opponent.
    async fn handle_player_left(&self, fact: GamePlayerLeft) -> Result<()> {
        let Some(mut game) = self.manager.remove_game(&fact.game_id) else {
            return Ok(());
        };

        game.deactivate();
        self.tracker.clear_game(&fact.game_id);
        self.live_games.remove(&fact.game_id);

        self.cache.update_and_deactivate_game(&game).await?;

        let outcome = game
            .opponent_of(&fact.player_id)
            .map(|opponent| GameOutcome::win_for(opponent.color))
            .unwrap_or(GameOutcome::NoOutcome);

        info!(
            "Game {} ended - player '{}' left",
            game.id(),
            fact.player_id
        );

        self.metrics.record_game_ended(EndReason::PlayerLeft);
        self.event_publisher
            .publish_game_ended(GameEnded {
                game_id: game.id(),
                player1: game.player1().clone(),
                player2: game.player2().clone(),
                outcome,
                description: EndReason::PlayerLeft,
                timestamp: current_timestamp(),
            })
            .await
    }

    /// A disconnect observation starts (or restarts) the player's
    /// termination timer. Only games owned here are tracked.
    fn handle_player_disconnected(&self, fact: GamePlayerDisconnected) -> Result<()> {
        if self.manager.get_game(&fact.game_id).is_none() {
            return Ok(());
        }

        debug!(
            "Player '{}' disconnected from game {}",
            fact.player_id, fact.game_id
        );
        self.tracker.add(fact.game_id, fact.player_id);
        Ok(())
    }

    /// A rejoin cancels the player's termination timer.
    fn handle_player_connected(&self, fact: GamePlayerConnected) -> Result<()> {
        debug!(
            "Player '{}' rejoined game {}",
            fact.player_id, fact.game_id
        );
        self.tracker.remove(&fact.game_id, &fact.player_id);
        Ok(())
    }

    // --- Read operations consumed by delivery layers ---

    /// Ids of all live games known to this instance's discovery view.
    pub fn live_game_ids(&self) -> Vec<GameId> {
        self.live_games.game_ids()
    }

    /// The live game a user is currently playing, from the shared index.
    pub async fn live_game_id_for_user(&self, player_id: &str) -> Result<Option<GameId>> {
        self.cache.get_game_id_by_player_id(player_id).await
    }

    /// PGN movetext of a game, from the shared cache.
    pub async fn pgn_for_game(&self, game_id: &GameId) -> Result<Option<String>> {
        Ok(self
            .cache
            .get_game_by_id(game_id)
            .await?
            .map(|game| game.pgn()))
    }

    /// PGN movetext of the game a user is playing.
    pub async fn pgn_for_user(&self, player_id: &str) -> Result<Option<String>> {
        match self.cache.get_game_id_by_player_id(player_id).await? {
            Some(game_id) => self.pgn_for_game(&game_id).await,
            None => Ok(None),
        }
    }

    /// FEN snapshots for a batch of games; absent games are omitted.
    pub async fn fen_for_games(&self, game_ids: &[GameId]) -> Result<HashMap<GameId, String>> {
        let games = self.cache.get_games_by_id(game_ids).await?;
        Ok(game_ids
            .iter()
            .zip(games)
            .filter_map(|(id, game)| game.map(|g| (*id, g.fen())))
            .collect())
    }

    /// The ranked live-games page with viewer counts and per-game
    /// disconnection info.
    pub fn ranked_live_games(&self) -> Vec<RankedLiveGame> {
        self.live_games
            .ranked()
            .into_iter()
            .map(|game| {
                let disconnected_players = self.tracker.disconnected_players(&game.game_id);
                RankedLiveGame {
                    game,
                    disconnected_players,
                }
            })
            .collect()
    }

    /// All games owned by this instance according to the shared cache.
    pub async fn owned_games(&self) -> Result<Vec<Game>> {
        self.cache
            .get_games_by_owning_instance(&self.instance_id)
            .await
    }
}
