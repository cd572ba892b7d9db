//! Live-game discovery
//!
//! A bounded, ranked, per-instance snapshot of currently live games,
//! refreshed periodically with viewer counts from an external gateway.

pub mod gateway;
pub mod service;

pub use gateway::{HttpViewerGateway, MockViewerGateway, ViewerGateway};
pub use service::{LiveGameData, LiveGamesService, LivePlayer};
