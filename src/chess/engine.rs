//! Board position wrapper around shakmaty
//!
//! Moves travel through the service in UCI notation; the portable move-text
//! form of a position is its UCI moves joined by single spaces, replayable
//! from the standard starting position.

use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move, Position,
};
use thiserror::Error;

use crate::types::{Color, GameOutcome};

/// Errors that can occur during board operations.
#[derive(Debug, Error)]
pub enum ChessError {
    /// Move text is not valid UCI.
    #[error("invalid move notation: {0}")]
    InvalidNotation(String),

    /// Move is syntactically valid but not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Move-text could not be replayed from the starting position.
    #[error("invalid move-text at token {index}: {reason}")]
    InvalidMoveText { index: usize, reason: String },
}

/// A chess position together with the move sequence that produced it.
#[derive(Debug, Clone)]
pub struct BoardPosition {
    position: Chess,
    moves: Vec<String>,
    sans: Vec<String>,
}

impl BoardPosition {
    /// Create the standard starting position with no moves played.
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
            moves: Vec::new(),
            sans: Vec::new(),
        }
    }

    /// Replay a portable move-text string (space-separated UCI moves) from
    /// the starting position.
    pub fn from_movetext(movetext: &str) -> Result<Self, ChessError> {
        let mut board = Self::new();
        for (index, token) in movetext.split_whitespace().enumerate() {
            board
                .apply_move(token)
                .map_err(|e| ChessError::InvalidMoveText {
                    index,
                    reason: e.to_string(),
                })?;
        }
        Ok(board)
    }

    /// Validate and apply a move given in UCI notation.
    pub fn apply_move(&mut self, move_text: &str) -> Result<(), ChessError> {
        let uci: UciMove = move_text
            .parse()
            .map_err(|_| ChessError::InvalidNotation(move_text.to_string()))?;

        let m: Move = uci
            .to_move(&self.position)
            .map_err(|_| ChessError::IllegalMove(move_text.to_string()))?;

        if !self.position.is_legal(&m) {
            return Err(ChessError::IllegalMove(move_text.to_string()));
        }

        // SAN depends on the position before the move is played
        let san = San::from_move(&self.position, &m);

        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| ChessError::IllegalMove(move_text.to_string()))?;

        self.moves.push(move_text.to_string());
        self.sans.push(san.to_string());
        Ok(())
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        match self.position.turn() {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }

    /// Evaluate the position for a terminal outcome.
    pub fn outcome(&self) -> GameOutcome {
        if self.position.is_checkmate() {
            // The side to move is checkmated, so the other side won
            GameOutcome::win_for(self.turn().opposite())
        } else if self.position.is_stalemate() || self.position.is_insufficient_material() {
            GameOutcome::Draw
        } else {
            GameOutcome::NoOutcome
        }
    }

    /// All legal moves in UCI notation.
    pub fn legal_moves(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| UciMove::from_move(m, CastlingMode::Standard).to_string())
            .collect()
    }

    /// Portable move-text: UCI moves joined by spaces.
    pub fn movetext(&self) -> String {
        self.moves.join(" ")
    }

    /// FEN snapshot of the current position.
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Numbered SAN movetext, e.g. `1. e4 e5 2. Nf3`.
    pub fn pgn(&self) -> String {
        let mut out = String::new();
        for (i, pair) in self.sans.chunks(2).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{}. {}", i + 1, pair[0]));
            if let Some(black) = pair.get(1) {
                out.push(' ');
                out.push_str(black);
            }
        }
        out
    }

    /// Number of half-moves played.
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

impl Default for BoardPosition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_position() {
        let board = BoardPosition::new();
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.outcome(), GameOutcome::NoOutcome);
        assert_eq!(board.move_count(), 0);
        assert_eq!(board.movetext(), "");
        // Starting position has 20 legal moves
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn test_apply_moves_alternates_turn() {
        let mut board = BoardPosition::new();
        board.apply_move("e2e4").unwrap();
        assert_eq!(board.turn(), Color::Black);
        board.apply_move("e7e5").unwrap();
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.movetext(), "e2e4 e7e5");
    }

    #[test]
    fn test_invalid_notation() {
        let mut board = BoardPosition::new();
        let result = board.apply_move("not-a-move");
        assert!(matches!(result, Err(ChessError::InvalidNotation(_))));
        assert_eq!(board.move_count(), 0);
    }

    #[test]
    fn test_illegal_move_leaves_position_unchanged() {
        let mut board = BoardPosition::new();
        // Pawns cannot advance three squares
        let result = board.apply_move("e2e5");
        assert!(matches!(result, Err(ChessError::IllegalMove(_))));
        assert_eq!(board.movetext(), "");
        assert_eq!(board.turn(), Color::White);
    }

    #[test]
    fn test_fools_mate_outcome() {
        let mut board = BoardPosition::new();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            board.apply_move(mv).unwrap();
        }
        assert_eq!(board.outcome(), GameOutcome::BlackWon);
    }

    #[test]
    fn test_movetext_roundtrip() {
        let mut board = BoardPosition::new();
        for mv in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            board.apply_move(mv).unwrap();
        }

        let replayed = BoardPosition::from_movetext(&board.movetext()).unwrap();
        assert_eq!(replayed.fen(), board.fen());
        assert_eq!(replayed.turn(), board.turn());
        assert_eq!(replayed.movetext(), board.movetext());
    }

    #[test]
    fn test_from_movetext_rejects_bad_token() {
        let result = BoardPosition::from_movetext("e2e4 garbage");
        match result {
            Err(ChessError::InvalidMoveText { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidMoveText, got {:?}", other),
        }
    }

    #[test]
    fn test_pgn_rendering() {
        let mut board = BoardPosition::new();
        for mv in ["e2e4", "e7e5", "g1f3"] {
            board.apply_move(mv).unwrap();
        }
        assert_eq!(board.pgn(), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn test_castling_in_pgn() {
        let mut board = BoardPosition::new();
        for mv in ["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"] {
            board.apply_move(mv).unwrap();
        }
        assert!(board.pgn().ends_with("O-O"));
    }
}
