//! Arbiter - Game orchestration microservice for live two-player chess
//!
//! This crate owns the lifecycle of live game sessions: creation from
//! matchmaking facts, move application and outcome detection,
//! disconnect-driven termination, cross-instance state sharing through a
//! distributed cache, and ranked discovery of currently live games.

pub mod amqp;
pub mod cache;
pub mod chess;
pub mod config;
pub mod error;
pub mod game;
pub mod live;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{OrchestrationError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use cache::GameCache;
pub use game::{ConnectionTracker, Game, GameManager};
pub use live::LiveGamesService;
pub use service::GameService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
