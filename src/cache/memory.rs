//! In-memory game cache for tests and local development
//!
//! Mirrors the Redis key semantics, including set-if-absent creation and
//! TTL-bound retention of finished games.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{CachedGameRecord, GameCache};
use crate::error::Result;
use crate::game::Game;
use crate::types::{GameId, PlayerId};
use crate::utils::current_timestamp;

#[derive(Debug, Clone)]
struct StoredEntry {
    record: CachedGameRecord,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Store {
    games: HashMap<GameId, StoredEntry>,
    player_index: HashMap<PlayerId, GameId>,
    owned: HashMap<String, Vec<GameId>>,
}

impl Store {
    fn live_entry(&self, game_id: &GameId) -> Option<&StoredEntry> {
        self.games.get(game_id).filter(|entry| {
            entry
                .expires_at
                .map(|deadline| deadline > current_timestamp())
                .unwrap_or(true)
        })
    }
}

/// In-memory stand-in for the shared cache.
#[derive(Debug, Default)]
pub struct InMemoryGameCache {
    instance_id: String,
    finished_game_ttl: Duration,
    store: Mutex<Store>,
}

impl InMemoryGameCache {
    pub fn new(instance_id: impl Into<String>, finished_game_ttl: Duration) -> Self {
        Self {
            instance_id: instance_id.into(),
            finished_game_ttl,
            store: Mutex::new(Store::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("cache lock poisoned")
    }

    /// Whether the game entry still exists (TTL not yet elapsed). Test-only
    /// inspection helper.
    pub fn contains_game(&self, game_id: &GameId) -> bool {
        self.lock().live_entry(game_id).is_some()
    }

    /// TTL deadline of a game entry, if one was set. Test-only.
    pub fn game_expiry(&self, game_id: &GameId) -> Option<DateTime<Utc>> {
        self.lock().games.get(game_id).and_then(|e| e.expires_at)
    }

    fn deactivate_locked(store: &mut Store, game: &Game, ttl: Duration) {
        store.player_index.remove(&game.player1().id);
        store.player_index.remove(&game.player2().id);
        store.games.insert(
            game.id(),
            StoredEntry {
                record: CachedGameRecord::from_game(game),
                expires_at: Some(
                    current_timestamp()
                        + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
                ),
            },
        );
    }
}

#[async_trait]
impl GameCache for InMemoryGameCache {
    async fn add_game(&self, game: &Game) -> Result<bool> {
        let mut store = self.lock();
        if store.live_entry(&game.id()).is_some() {
            return Ok(false);
        }

        store.games.insert(
            game.id(),
            StoredEntry {
                record: CachedGameRecord::from_game(game),
                expires_at: None,
            },
        );
        store
            .player_index
            .insert(game.player1().id.clone(), game.id());
        store
            .player_index
            .insert(game.player2().id.clone(), game.id());
        store
            .owned
            .entry(self.instance_id.clone())
            .or_default()
            .push(game.id());
        Ok(true)
    }

    async fn update_game_move(&self, game: &Game) -> Result<()> {
        self.lock().games.insert(
            game.id(),
            StoredEntry {
                record: CachedGameRecord::from_game(game),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn update_and_deactivate_game(&self, game: &Game) -> Result<()> {
        let mut store = self.lock();
        Self::deactivate_locked(&mut store, game, self.finished_game_ttl);
        Ok(())
    }

    async fn deactivate_games(&self, games: &[Game]) -> Result<()> {
        let mut store = self.lock();
        for game in games {
            Self::deactivate_locked(&mut store, game, self.finished_game_ttl);
        }
        Ok(())
    }

    async fn player_has_game(&self, player_id: &str) -> Result<bool> {
        Ok(self.lock().player_index.contains_key(player_id))
    }

    async fn get_game_by_id(&self, game_id: &GameId) -> Result<Option<Game>> {
        let record = self
            .lock()
            .live_entry(game_id)
            .map(|entry| entry.record.clone());
        record.map(CachedGameRecord::into_game).transpose()
    }

    async fn get_games_by_id(&self, game_ids: &[GameId]) -> Result<Vec<Option<Game>>> {
        let records: Vec<Option<CachedGameRecord>> = {
            let store = self.lock();
            game_ids
                .iter()
                .map(|id| store.live_entry(id).map(|entry| entry.record.clone()))
                .collect()
        };

        records
            .into_iter()
            .map(|record| record.map(CachedGameRecord::into_game).transpose())
            .collect()
    }

    async fn get_game_id_by_player_id(&self, player_id: &str) -> Result<Option<GameId>> {
        Ok(self.lock().player_index.get(player_id).copied())
    }

    async fn get_games_by_owning_instance(&self, instance_id: &str) -> Result<Vec<Game>> {
        let records: Vec<CachedGameRecord> = {
            let store = self.lock();
            store
                .owned
                .get(instance_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| store.live_entry(id))
                        .map(|entry| entry.record.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        records
            .into_iter()
            .map(CachedGameRecord::into_game)
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameSettings;

    fn new_cache() -> InMemoryGameCache {
        InMemoryGameCache::new("instance-1", Duration::from_secs(60))
    }

    fn new_game(a: &str, b: &str) -> Game {
        Game::new(a.to_string(), b.to_string(), GameSettings::default())
    }

    #[tokio::test]
    async fn test_add_game_is_idempotent() {
        let cache = new_cache();
        let mut game = new_game("alice", "bob");

        assert!(cache.add_game(&game).await.unwrap());

        // Mutate and re-add: the stored entry must be unchanged
        game.apply_move("e2e4").unwrap();
        assert!(!cache.add_game(&game).await.unwrap());

        let stored = cache.get_game_by_id(&game.id()).await.unwrap().unwrap();
        assert_eq!(stored.movetext(), "");
    }

    #[tokio::test]
    async fn test_player_index_written_on_create() {
        let cache = new_cache();
        let game = new_game("alice", "bob");
        cache.add_game(&game).await.unwrap();

        assert!(cache.player_has_game("alice").await.unwrap());
        assert!(cache.player_has_game("bob").await.unwrap());
        assert_eq!(
            cache.get_game_id_by_player_id("alice").await.unwrap(),
            Some(game.id())
        );
        assert!(!cache.player_has_game("carol").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_game_move_overwrites() {
        let cache = new_cache();
        let mut game = new_game("alice", "bob");
        cache.add_game(&game).await.unwrap();

        game.apply_move("e2e4").unwrap();
        cache.update_game_move(&game).await.unwrap();

        let stored = cache.get_game_by_id(&game.id()).await.unwrap().unwrap();
        assert_eq!(stored.movetext(), "e2e4");
    }

    #[tokio::test]
    async fn test_deactivate_frees_players_and_sets_ttl() {
        let cache = new_cache();
        let mut game = new_game("alice", "bob");
        cache.add_game(&game).await.unwrap();

        game.deactivate();
        cache.update_and_deactivate_game(&game).await.unwrap();

        // Both players are free to queue for new games
        assert!(!cache.player_has_game("alice").await.unwrap());
        assert!(!cache.player_has_game("bob").await.unwrap());

        // The entry stays readable for the grace period
        assert!(cache.contains_game(&game.id()));
        assert!(cache.game_expiry(&game.id()).is_some());
        let stored = cache.get_game_by_id(&game.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), crate::types::GameStatus::Deactive);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let cache = InMemoryGameCache::new("instance-1", Duration::ZERO);
        let mut game = new_game("alice", "bob");
        cache.add_game(&game).await.unwrap();
        game.deactivate();
        cache.update_and_deactivate_game(&game).await.unwrap();

        assert!(cache.get_game_by_id(&game.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_lookup_marks_missing_slots() {
        let cache = new_cache();
        let game = new_game("alice", "bob");
        cache.add_game(&game).await.unwrap();

        let missing = uuid::Uuid::new_v4();
        let results = cache
            .get_games_by_id(&[game.id(), missing])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    #[tokio::test]
    async fn test_owned_instance_listing() {
        let cache = new_cache();
        let game1 = new_game("alice", "bob");
        let game2 = new_game("carol", "dave");
        cache.add_game(&game1).await.unwrap();
        cache.add_game(&game2).await.unwrap();

        let owned = cache.get_games_by_owning_instance("instance-1").await.unwrap();
        assert_eq!(owned.len(), 2);

        let other = cache.get_games_by_owning_instance("instance-2").await.unwrap();
        assert!(other.is_empty());
    }
}
