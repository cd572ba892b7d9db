//! Chess rules capability
//!
//! Wraps shakmaty behind a small board interface: apply a move, query the
//! side to move, detect terminal outcomes, and serialize the position as
//! portable move-text, FEN, and PGN.

pub mod engine;

pub use engine::{BoardPosition, ChessError};
