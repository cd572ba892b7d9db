//! Game state machine
//!
//! A game holds two players with complementary colors, a board position, and
//! a one-way Active -> Deactive status. Encoding produces a stable textual
//! form: a colon-separated header line followed by the position's move-text.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::chess::BoardPosition;
use crate::error::{OrchestrationError, Result};
use crate::types::{Color, GameId, GameOutcome, GamePlayer, GameSettings, GameStatus, PlayerId};
use crate::utils::{current_timestamp, generate_game_id};

/// The state machine for one match.
#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    status: GameStatus,
    player1: GamePlayer,
    player2: GamePlayer,
    position: BoardPosition,
    settings: GameSettings,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Game {
    /// Create a new active game for two players. Player ordering is
    /// canonicalized (lower id first) purely for deterministic encoding;
    /// colors are assigned by an unbiased coin flip, always complementary.
    pub fn new(player_a: PlayerId, player_b: PlayerId, settings: GameSettings) -> Self {
        let (first, second) = if player_a <= player_b {
            (player_a, player_b)
        } else {
            (player_b, player_a)
        };

        let first_color = if rand::rng().random_bool(0.5) {
            Color::White
        } else {
            Color::Black
        };

        let now = current_timestamp();
        Self {
            id: generate_game_id(),
            status: GameStatus::Active,
            player1: GamePlayer {
                id: first,
                color: first_color,
            },
            player2: GamePlayer {
                id: second,
                color: first_color.opposite(),
            },
            position: BoardPosition::new(),
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    pub fn player1(&self) -> &GamePlayer {
        &self.player1
    }

    pub fn player2(&self) -> &GamePlayer {
        &self.player2
    }

    pub fn settings(&self) -> GameSettings {
        self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Look up a player by id.
    pub fn player(&self, player_id: &str) -> Option<&GamePlayer> {
        [&self.player1, &self.player2]
            .into_iter()
            .find(|p| p.id == player_id)
    }

    /// The other player of the given one.
    pub fn opponent_of(&self, player_id: &str) -> Option<&GamePlayer> {
        if self.player1.id == player_id {
            Some(&self.player2)
        } else if self.player2.id == player_id {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Returns true if the given player participates in this game.
    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    /// The player whose color matches the side to move.
    pub fn turn(&self) -> &GamePlayer {
        if self.player1.color == self.position.turn() {
            &self.player1
        } else {
            &self.player2
        }
    }

    /// Apply a move in UCI notation. Does not check whose turn it is — the
    /// caller validates the mover against `turn()` first.
    pub fn apply_move(&mut self, move_text: &str) -> Result<()> {
        if self.status == GameStatus::Deactive {
            return Err(OrchestrationError::IllegalMove {
                move_text: move_text.to_string(),
                reason: "game is no longer active".to_string(),
            }
            .into());
        }

        self.position
            .apply_move(move_text)
            .map_err(|e| OrchestrationError::IllegalMove {
                move_text: move_text.to_string(),
                reason: e.to_string(),
            })?;

        self.updated_at = current_timestamp();
        Ok(())
    }

    /// Evaluate the position for a terminal outcome.
    pub fn outcome(&self) -> GameOutcome {
        self.position.outcome()
    }

    /// One-way transition to Deactive; idempotent.
    pub fn deactivate(&mut self) {
        if self.status == GameStatus::Active {
            self.status = GameStatus::Deactive;
            self.updated_at = current_timestamp();
        }
    }

    /// FEN snapshot of the current position.
    pub fn fen(&self) -> String {
        self.position.fen()
    }

    /// Numbered SAN movetext of the game so far.
    pub fn pgn(&self) -> String {
        self.position.pgn()
    }

    /// Portable move-text of the position.
    pub fn movetext(&self) -> String {
        self.position.movetext()
    }

    /// Legal moves in the current position, UCI notation.
    pub fn legal_moves(&self) -> Vec<String> {
        self.position.legal_moves()
    }

    /// Encode the game as a stable textual form: a header line of six
    /// colon-separated fields followed by the position's move-text.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}\n{}",
            self.id,
            self.status,
            self.player1.id,
            self.player1.color,
            self.player2.id,
            self.player2.color,
            self.position.movetext(),
        )
    }

    /// Decode a game previously produced by `encode`.
    pub fn decode(encoded: &str) -> Result<Self> {
        let malformed = |reason: String| OrchestrationError::MalformedGame { reason };

        let (header, movetext) = encoded
            .split_once('\n')
            .ok_or_else(|| malformed("missing move-text line".to_string()))?;

        let fields: Vec<&str> = header.split(':').collect();
        if fields.len() != 6 {
            return Err(malformed(format!(
                "header has {} fields, expected 6",
                fields.len()
            ))
            .into());
        }

        let id: GameId = fields[0]
            .parse()
            .map_err(|e| malformed(format!("bad game id: {}", e)))?;
        let status: GameStatus = fields[1].parse().map_err(malformed)?;
        let player1_color: Color = fields[3].parse().map_err(malformed)?;
        let player2_color: Color = fields[5].parse().map_err(malformed)?;

        let position = BoardPosition::from_movetext(movetext)
            .map_err(|e| malformed(format!("bad move-text: {}", e)))?;

        let now = current_timestamp();
        Ok(Self {
            id,
            status,
            player1: GamePlayer {
                id: fields[2].to_string(),
                color: player1_color,
            },
            player2: GamePlayer {
                id: fields[4].to_string(),
                color: player2_color,
            },
            position,
            settings: GameSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_game() -> Game {
        Game::new(
            "alice".to_string(),
            "bob".to_string(),
            GameSettings::default(),
        )
    }

    #[test]
    fn test_new_game_canonical_order_and_colors() {
        // Supply in reversed order; canonical ordering sorts by id
        let game = Game::new(
            "bob".to_string(),
            "alice".to_string(),
            GameSettings::default(),
        );

        assert_eq!(game.player1().id, "alice");
        assert_eq!(game.player2().id, "bob");
        assert_eq!(game.player1().color, game.player2().color.opposite());
        assert!(game.is_active());
        assert_eq!(game.outcome(), GameOutcome::NoOutcome);
    }

    #[test]
    fn test_colors_complementary_over_many_games() {
        for _ in 0..50 {
            let game = new_game();
            assert_ne!(game.player1().color, game.player2().color);
        }
    }

    #[test]
    fn test_turn_follows_side_to_move() {
        let mut game = new_game();

        let white = if game.player1().color == Color::White {
            game.player1().clone()
        } else {
            game.player2().clone()
        };
        assert_eq!(game.turn().id, white.id);

        game.apply_move("e2e4").unwrap();
        assert_ne!(game.turn().id, white.id);
    }

    #[test]
    fn test_illegal_move_is_rejected() {
        let mut game = new_game();
        assert!(game.apply_move("e2e5").is_err());
        assert_eq!(game.movetext(), "");
        assert!(game.is_active());
    }

    #[test]
    fn test_no_moves_after_deactivation() {
        let mut game = new_game();
        game.deactivate();
        assert_eq!(game.status(), GameStatus::Deactive);
        assert!(game.apply_move("e2e4").is_err());

        // Idempotent: deactivating again keeps Deactive
        game.deactivate();
        assert_eq!(game.status(), GameStatus::Deactive);
    }

    #[test]
    fn test_checkmate_outcome() {
        let mut game = new_game();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            game.apply_move(mv).unwrap();
        }
        assert_eq!(game.outcome(), GameOutcome::BlackWon);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut game = new_game();
        for mv in ["e2e4", "e7e5", "g1f3"] {
            game.apply_move(mv).unwrap();
        }
        game.deactivate();

        let decoded = Game::decode(&game.encode()).unwrap();
        assert_eq!(decoded.id(), game.id());
        assert_eq!(decoded.status(), game.status());
        assert_eq!(decoded.player1(), game.player1());
        assert_eq!(decoded.player2(), game.player2());
        assert_eq!(decoded.fen(), game.fen());
        assert_eq!(decoded.outcome(), game.outcome());
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        let result = Game::decode("only:three:fields\ne2e4");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_missing_movetext_line() {
        let game = new_game();
        let header = game.encode().lines().next().unwrap().to_string();
        assert!(Game::decode(&header).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_movetext() {
        let game = new_game();
        let encoded = format!("{}\nnot a movetext", game.encode().lines().next().unwrap());
        assert!(Game::decode(&encoded).is_err());
    }

    #[test]
    fn test_opponent_lookup() {
        let game = new_game();
        assert_eq!(game.opponent_of("alice").unwrap().id, "bob");
        assert_eq!(game.opponent_of("bob").unwrap().id, "alice");
        assert!(game.opponent_of("carol").is_none());
        assert!(game.has_player("alice"));
        assert!(!game.has_player("carol"));
    }
}
