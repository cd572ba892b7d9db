//! Error types for the game orchestration service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific orchestration scenarios
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("cache operation failed: {message}")]
    CacheFailed { message: String },

    #[error("illegal move '{move_text}': {reason}")]
    IllegalMove { move_text: String, reason: String },

    #[error("malformed encoded game: {reason}")]
    MalformedGame { reason: String },

    #[error("game not found: {game_id}")]
    GameNotFound { game_id: String },

    #[error("not player's turn: {player_id}")]
    NotPlayersTurn { player_id: String },

    #[error("player already in a game: {player_id}")]
    PlayerAlreadyInGame { player_id: String },

    #[error("viewer gateway request failed: {message}")]
    GatewayFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}
