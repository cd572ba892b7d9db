//! Ranked live-games snapshot
//!
//! Event-driven add/remove plus a periodic refresh that re-scores every
//! tracked game with fresh viewer counts, stable-sorts descending, and
//! truncates to the configured cap. Each instance builds its own view from
//! the events it receives; there is no global merge.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::Result;
use crate::live::gateway::ViewerGateway;
use crate::types::{GameId, PlayerId};

/// One player of a live game: identity plus rating score
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LivePlayer {
    pub id: PlayerId,
    pub score: i64,
}

/// Derived, non-authoritative view of one live game
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LiveGameData {
    pub game_id: GameId,
    pub player1: LivePlayer,
    pub player2: LivePlayer,
    pub started_at: DateTime<Utc>,
    pub viewers: i64,
    /// Sum of both players' scores plus the viewer count
    pub priority: i64,
}

impl LiveGameData {
    fn rescore(&mut self, viewers: i64) {
        self.viewers = viewers;
        self.priority = self.player1.score + self.player2.score + viewers;
    }
}

#[derive(Debug, Default)]
struct LiveState {
    all: HashMap<GameId, LiveGameData>,
    ranked: Vec<LiveGameData>,
}

/// Bounded ranked snapshot of currently live games
pub struct LiveGamesService {
    state: Mutex<LiveState>,
    gateway: Arc<dyn ViewerGateway>,
    max_ranked: usize,
}

impl LiveGamesService {
    pub fn new(gateway: Arc<dyn ViewerGateway>, max_ranked: usize) -> Self {
        Self {
            state: Mutex::new(LiveState::default()),
            gateway,
            max_ranked,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LiveState> {
        self.state.lock().expect("live state lock poisoned")
    }

    /// Track a newly created game. The ranked slice takes it immediately
    /// when under the cap; otherwise the next refresh decides.
    pub fn add(
        &self,
        game_id: GameId,
        player1: LivePlayer,
        player2: LivePlayer,
        started_at: DateTime<Utc>,
    ) {
        let priority = player1.score + player2.score;
        let data = LiveGameData {
            game_id,
            player1,
            player2,
            started_at,
            viewers: 0,
            priority,
        };

        let mut state = self.lock();
        state.all.insert(game_id, data.clone());
        if state.ranked.len() < self.max_ranked {
            state.ranked.push(data);
        }
    }

    /// Stop tracking an ended game.
    pub fn remove(&self, game_id: &GameId) {
        let mut state = self.lock();
        state.all.remove(game_id);
        state.ranked.retain(|g| g.game_id != *game_id);
    }

    /// Re-score every tracked game with fresh viewer counts, stable-sort the
    /// ranked view descending by priority, and truncate it to the cap.
    pub async fn refresh(&self) -> Result<()> {
        // Gateway call happens before taking the lock
        let viewers = self.gateway.live_games_viewers().await?;

        let mut state = self.lock();
        for (game_id, data) in state.all.iter_mut() {
            data.rescore(viewers.get(game_id).copied().unwrap_or(0));
        }

        let mut ranked: Vec<LiveGameData> = state.all.values().cloned().collect();
        ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
        ranked.truncate(self.max_ranked);

        debug!(
            "Live list refreshed - tracked: {}, ranked: {}",
            state.all.len(),
            ranked.len()
        );
        state.ranked = ranked;
        Ok(())
    }

    /// Current ranked page.
    pub fn ranked(&self) -> Vec<LiveGameData> {
        self.lock().ranked.clone()
    }

    /// Ids of all tracked live games.
    pub fn game_ids(&self) -> Vec<GameId> {
        self.lock().all.keys().copied().collect()
    }

    /// Number of tracked live games.
    pub fn len(&self) -> usize {
        self.lock().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, game_id: &GameId) -> bool {
        self.lock().all.contains_key(game_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::gateway::MockViewerGateway;
    use crate::utils::{current_timestamp, generate_game_id};

    fn player(id: &str, score: i64) -> LivePlayer {
        LivePlayer {
            id: id.to_string(),
            score,
        }
    }

    fn service(cap: usize) -> (Arc<MockViewerGateway>, LiveGamesService) {
        let gateway = Arc::new(MockViewerGateway::new());
        let service = LiveGamesService::new(gateway.clone(), cap);
        (gateway, service)
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let (_, service) = service(10);
        let game_id = generate_game_id();

        service.add(
            game_id,
            player("alice", 1500),
            player("bob", 1400),
            current_timestamp(),
        );
        assert!(service.contains(&game_id));
        assert_eq!(service.ranked().len(), 1);
        assert_eq!(service.ranked()[0].priority, 2900);

        service.remove(&game_id);
        assert!(service.is_empty());
        assert!(service.ranked().is_empty());
    }

    #[tokio::test]
    async fn test_ranked_list_never_exceeds_cap() {
        let (_, service) = service(3);

        for i in 0..10 {
            service.add(
                generate_game_id(),
                player(&format!("p{}", i), 1000 + i),
                player(&format!("q{}", i), 1000),
                current_timestamp(),
            );
        }

        assert_eq!(service.len(), 10);
        assert_eq!(service.ranked().len(), 3);

        service.refresh().await.unwrap();
        assert_eq!(service.ranked().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_scores_and_sorts_descending() {
        let (gateway, service) = service(10);

        let quiet = generate_game_id();
        let popular = generate_game_id();
        service.add(
            quiet,
            player("alice", 1500),
            player("bob", 1500),
            current_timestamp(),
        );
        service.add(
            popular,
            player("carol", 1000),
            player("dave", 1000),
            current_timestamp(),
        );

        // Viewers push the lower-rated game to the top
        gateway.set_viewers(popular, 5000);
        service.refresh().await.unwrap();

        let ranked = service.ranked();
        assert_eq!(ranked[0].game_id, popular);
        assert_eq!(ranked[0].priority, 7000);
        assert_eq!(ranked[0].viewers, 5000);
        assert_eq!(ranked[1].game_id, quiet);
        assert_eq!(ranked[1].viewers, 0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_highest_priority_under_cap() {
        let (gateway, service) = service(1);

        let first = generate_game_id();
        let second = generate_game_id();
        service.add(
            first,
            player("alice", 1200),
            player("bob", 1200),
            current_timestamp(),
        );
        service.add(
            second,
            player("carol", 2000),
            player("dave", 2000),
            current_timestamp(),
        );

        gateway.set_viewers(first, 10);
        service.refresh().await.unwrap();

        let ranked = service.ranked();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].game_id, second);
        // The dropped game is still tracked, just not ranked
        assert!(service.contains(&first));
    }
}
