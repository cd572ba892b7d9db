//! Connection tracker
//!
//! Per-instance record of which players, in which games, have been observed
//! disconnected and since when. The disconnect sweep drains games whose
//! earliest disconnect is older than the configured threshold.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{GameId, PlayerId};
use crate::utils::current_timestamp;

/// Tracks disconnected players per game. A game present here has at least
/// one disconnected player; empty per-game maps are pruned immediately.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    disconnects: Mutex<HashMap<GameId, HashMap<PlayerId, DateTime<Utc>>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a disconnect observed now. Overwrites any prior entry for the
    /// same pair — the last disconnect wins.
    pub fn add(&self, game_id: GameId, player_id: PlayerId) {
        self.add_at(game_id, player_id, current_timestamp());
    }

    fn add_at(&self, game_id: GameId, player_id: PlayerId, at: DateTime<Utc>) {
        let mut disconnects = self.disconnects.lock().expect("tracker lock poisoned");
        disconnects.entry(game_id).or_default().insert(player_id, at);
    }

    /// Clear a disconnect record after the player rejoined.
    pub fn remove(&self, game_id: &GameId, player_id: &str) {
        let mut disconnects = self.disconnects.lock().expect("tracker lock poisoned");
        if let Some(players) = disconnects.get_mut(game_id) {
            players.remove(player_id);
            if players.is_empty() {
                disconnects.remove(game_id);
            }
        }
    }

    /// Drop all records for a game that has ended.
    pub fn clear_game(&self, game_id: &GameId) {
        let mut disconnects = self.disconnects.lock().expect("tracker lock poisoned");
        disconnects.remove(game_id);
    }

    /// Disconnected players of a game, for the live-games read path.
    pub fn disconnected_players(&self, game_id: &GameId) -> Vec<PlayerId> {
        let disconnects = self.disconnects.lock().expect("tracker lock poisoned");
        disconnects
            .get(game_id)
            .map(|players| players.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of games with at least one disconnected player.
    pub fn tracked_game_count(&self) -> usize {
        self.disconnects.lock().expect("tracker lock poisoned").len()
    }

    /// Scan all tracked games and return those whose earliest disconnected
    /// player has been gone longer than `threshold`, mapped to that player.
    /// Returned games are removed from tracking so the same termination is
    /// never signalled twice. When several players of one game are
    /// disconnected, the one disconnected longest is attributed.
    pub fn games_needing_termination(&self, threshold: Duration) -> HashMap<GameId, PlayerId> {
        let cutoff = current_timestamp()
            - chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());

        let mut disconnects = self.disconnects.lock().expect("tracker lock poisoned");
        let mut due = HashMap::new();

        disconnects.retain(|game_id, players| {
            let earliest = players
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(id, at)| (id.clone(), *at));

            match earliest {
                Some((player_id, at)) if at < cutoff => {
                    due.insert(*game_id, player_id);
                    false
                }
                _ => true,
            }
        });

        if !due.is_empty() {
            debug!("{} games past disconnect threshold", due.len());
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ago(secs: i64) -> DateTime<Utc> {
        current_timestamp() - chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_add_and_remove_prunes_empty_games() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();

        tracker.add(game_id, "alice".to_string());
        assert_eq!(tracker.tracked_game_count(), 1);
        assert_eq!(tracker.disconnected_players(&game_id), vec!["alice"]);

        tracker.remove(&game_id, "alice");
        assert_eq!(tracker.tracked_game_count(), 0);
        assert!(tracker.disconnected_players(&game_id).is_empty());
    }

    #[test]
    fn test_fresh_disconnect_is_not_terminated() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add(game_id, "alice".to_string());

        let due = tracker.games_needing_termination(Duration::from_secs(30));
        assert!(due.is_empty());
        // Still tracked for the next sweep
        assert_eq!(tracker.tracked_game_count(), 1);
    }

    #[test]
    fn test_stale_disconnect_is_terminated_once() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add_at(game_id, "alice".to_string(), ago(60));

        let due = tracker.games_needing_termination(Duration::from_secs(30));
        assert_eq!(due.get(&game_id).map(String::as_str), Some("alice"));

        // Removed atomically: a second sweep sees nothing
        let again = tracker.games_needing_termination(Duration::from_secs(30));
        assert!(again.is_empty());
        assert_eq!(tracker.tracked_game_count(), 0);
    }

    #[test]
    fn test_threshold_edge() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add_at(game_id, "alice".to_string(), ago(29));

        // Just under the threshold: nothing due yet
        assert!(tracker
            .games_needing_termination(Duration::from_secs(30))
            .is_empty());

        // Just past it: the game is due
        let due = tracker.games_needing_termination(Duration::from_secs(28));
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_earliest_disconnector_is_attributed() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add_at(game_id, "bob".to_string(), ago(120));
        tracker.add_at(game_id, "alice".to_string(), ago(60));

        let due = tracker.games_needing_termination(Duration::from_secs(30));
        assert_eq!(due.get(&game_id).map(String::as_str), Some("bob"));
    }

    #[test]
    fn test_last_disconnect_wins_for_same_player() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add_at(game_id, "alice".to_string(), ago(120));
        // Re-observed disconnecting just now; the timer restarts
        tracker.add(game_id, "alice".to_string());

        let due = tracker.games_needing_termination(Duration::from_secs(30));
        assert!(due.is_empty());
    }

    #[test]
    fn test_clear_game_drops_all_players() {
        let tracker = ConnectionTracker::new();
        let game_id = Uuid::new_v4();
        tracker.add(game_id, "alice".to_string());
        tracker.add(game_id, "bob".to_string());

        tracker.clear_game(&game_id);
        assert_eq!(tracker.tracked_game_count(), 0);
    }
}
