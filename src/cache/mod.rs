//! Distributed game cache
//!
//! Cross-instance store for live game state: atomic game creation, a
//! player -> game index, per-instance owned-game lists, and
//! soft-delete-with-TTL on termination. The production backend is Redis;
//! an in-memory implementation backs the test suites.
//!
//! Key layout:
//! - `game:<id>`           -> JSON `{status, game}` (encoded game text)
//! - `game:player:<id>`    -> game id, one entry per active player
//! - `<instance>:games`    -> list of game ids owned by that instance

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::game::Game;
use crate::types::{GameId, GameStatus};

pub use memory::InMemoryGameCache;
pub use redis::RedisGameCache;

/// Key for a game entry.
pub(crate) fn game_key(game_id: &GameId) -> String {
    format!("game:{}", game_id)
}

/// Key for a player's reverse index entry.
pub(crate) fn player_key(player_id: &str) -> String {
    format!("game:player:{}", player_id)
}

/// Key for an instance's owned-game list.
pub(crate) fn instance_games_key(instance_id: &str) -> String {
    format!("{}:games", instance_id)
}

/// Stored value of a game entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CachedGameRecord {
    pub status: GameStatus,
    pub game: String,
}

impl CachedGameRecord {
    pub fn from_game(game: &Game) -> Self {
        Self {
            status: game.status(),
            game: game.encode(),
        }
    }

    pub fn into_game(self) -> Result<Game> {
        Game::decode(&self.game)
    }
}

/// Cross-instance game store. All operations talk to the shared backend and
/// propagate its failures to the caller; absence of a key is `Ok(None)`,
/// never an error. The cache layer itself never retries.
#[async_trait]
pub trait GameCache: Send + Sync {
    /// Atomically create the game entry if absent and, only then, write both
    /// player index entries and append the game id to this instance's
    /// owned-game list — a single backend round trip. Returns false when a
    /// concurrent or duplicate creation was observed; that is a benign
    /// no-op, not an error.
    async fn add_game(&self, game: &Game) -> Result<bool>;

    /// Unconditional overwrite of the game entry, no TTL. Used after every
    /// approved move.
    async fn update_game_move(&self, game: &Game) -> Result<()>;

    /// Delete both player index entries (freeing the players to queue again)
    /// and overwrite the game entry with a finite TTL so late readers can
    /// still observe the final position.
    async fn update_and_deactivate_game(&self, game: &Game) -> Result<()>;

    /// Batched form of `update_and_deactivate_game` used by the disconnect
    /// sweep to bound round trips per tick.
    async fn deactivate_games(&self, games: &[Game]) -> Result<()>;

    /// Existence check on the player index, used to prevent double-queuing.
    async fn player_has_game(&self, player_id: &str) -> Result<bool>;

    async fn get_game_by_id(&self, game_id: &GameId) -> Result<Option<Game>>;

    /// Batch lookup; each slot is None when the key is absent.
    async fn get_games_by_id(&self, game_ids: &[GameId]) -> Result<Vec<Option<Game>>>;

    async fn get_game_id_by_player_id(&self, player_id: &str) -> Result<Option<GameId>>;

    /// All still-present games from an instance's owned-game list.
    async fn get_games_by_owning_instance(&self, instance_id: &str) -> Result<Vec<Game>>;

    /// Connectivity probe used at startup and by health checks.
    async fn ping(&self) -> Result<()>;
}
