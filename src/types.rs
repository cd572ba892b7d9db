//! Common types used throughout the game orchestration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for games
pub type GameId = Uuid;

/// Unique identifier for matchmaking matches
pub type MatchId = Uuid;

/// Piece color assigned to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Get the opposite color.
    pub const fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(Color::White),
            "black" => Ok(Color::Black),
            other => Err(format!("unknown color: {}", other)),
        }
    }
}

/// Lifecycle status of a game. The transition is one-way: a Deactive game
/// never becomes Active again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Deactive,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Active => write!(f, "active"),
            GameStatus::Deactive => write!(f, "deactive"),
        }
    }
}

impl std::str::FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GameStatus::Active),
            "deactive" => Ok(GameStatus::Deactive),
            other => Err(format!("unknown game status: {}", other)),
        }
    }
}

/// Result of evaluating a game position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    NoOutcome,
    WhiteWon,
    BlackWon,
    Draw,
}

impl GameOutcome {
    /// Returns true once position evaluation says the game is finished.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, GameOutcome::NoOutcome)
    }

    /// The outcome in which the given color wins.
    pub const fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameOutcome::WhiteWon,
            Color::Black => GameOutcome::BlackWon,
        }
    }
}

/// Why a game ended, carried on the `GameEnded` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    PlayerResigned,
    PlayerLeft,
    PlayerTimeout,
    GameTimeout,
    Empty,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::PlayerResigned => write!(f, "player_resigned"),
            EndReason::PlayerLeft => write!(f, "player_left"),
            EndReason::PlayerTimeout => write!(f, "player_timeout"),
            EndReason::GameTimeout => write!(f, "game_timeout"),
            EndReason::Empty => write!(f, ""),
        }
    }
}

/// A player inside a game: identity plus assigned color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: PlayerId,
    pub color: Color,
}

/// A matched user as delivered by the matchmaking queue. The score is the
/// user's current rating and feeds live-game ranking only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedUser {
    pub id: PlayerId,
    pub score: i64,
}

/// Time control settings for a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Initial clock time per player in seconds
    pub initial_time_secs: u64,
    /// Increment added per move in seconds
    pub increment_secs: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            initial_time_secs: 600,
            increment_secs: 0,
        }
    }
}

/// Consumed fact: the matchmaking queue paired two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersMatched {
    pub user1: MatchedUser,
    pub user2: MatchedUser,
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
}

/// Consumed fact: a player submitted a move for a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayerMoved {
    pub game_id: GameId,
    pub player_id: PlayerId,
    #[serde(rename = "move")]
    pub mv: String,
    pub timestamp: DateTime<Utc>,
}

/// Consumed fact: a player explicitly left their game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayerLeft {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

/// Consumed fact: a player's connection to their game dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayerDisconnected {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

/// Consumed fact: a previously disconnected player rejoined their game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayerConnected {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

/// Emitted event: a new game was created for two matched users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCreated {
    pub game_id: GameId,
    pub player1: GamePlayer,
    pub player2: GamePlayer,
    pub timestamp: DateTime<Utc>,
}

/// Emitted event: a move passed turn and legality checks and was applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMoveApproved {
    pub game_id: GameId,
    pub player_id: PlayerId,
    #[serde(rename = "move")]
    pub mv: String,
    pub timestamp: DateTime<Utc>,
}

/// Emitted event: a game reached its end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEnded {
    pub game_id: GameId,
    pub player1: GamePlayer,
    pub player2: GamePlayer,
    pub outcome: GameOutcome,
    pub description: EndReason,
    pub timestamp: DateTime<Utc>,
}

/// Closed union over the inbound fact vocabulary. The dispatcher matches
/// exhaustively on this; unknown routing keys never construct a variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Fact {
    UsersMatched(UsersMatched),
    PlayerMoved(GamePlayerMoved),
    PlayerLeft(GamePlayerLeft),
    PlayerDisconnected(GamePlayerDisconnected),
    PlayerConnected(GamePlayerConnected),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opposite() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
    }

    #[test]
    fn test_color_roundtrip() {
        for color in [Color::White, Color::Black] {
            let parsed: Color = color.to_string().parse().unwrap();
            assert_eq!(parsed, color);
        }
        assert!("green".parse::<Color>().is_err());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [GameStatus::Active, GameStatus::Deactive] {
            let parsed: GameStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_outcome_terminal() {
        assert!(!GameOutcome::NoOutcome.is_terminal());
        assert!(GameOutcome::WhiteWon.is_terminal());
        assert!(GameOutcome::Draw.is_terminal());
        assert_eq!(GameOutcome::win_for(Color::Black), GameOutcome::BlackWon);
    }

    #[test]
    fn test_end_reason_wire_form() {
        assert_eq!(EndReason::PlayerLeft.to_string(), "player_left");
        assert_eq!(EndReason::Empty.to_string(), "");
    }
}
