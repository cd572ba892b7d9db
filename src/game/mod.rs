//! Game domain: the per-match state machine, the per-instance registry of
//! owned games, and the disconnect tracker feeding the termination sweep.

pub mod game;
pub mod manager;
pub mod tracker;

pub use game::Game;
pub use manager::GameManager;
pub use tracker::ConnectionTracker;
