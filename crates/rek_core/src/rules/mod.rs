//! Game rules for Rek.
//!
//! Pure functions over [`Board`]: move legality, move application with
//! both capture passes, and win detection. The room state machine and the
//! search opponent share these so their notions of legality and capture
//! can never disagree.

pub mod capture;
pub mod movement;
pub mod win;

pub use capture::{sandwich_capture, trapping_capture};
pub use movement::{has_legal_slide, is_legal, legal_moves, slides_from};
pub use win::winner;

use crate::{Board, Cell, Color, Coord, Move};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Pieces removed by a single move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    /// Squares cleared by the sandwich pass.
    pub sandwiched: Vec<Coord>,
    /// Squares cleared by the trapping pass.
    pub trapped: Vec<Coord>,
}

impl Captures {
    /// Total number of pieces removed.
    pub fn total(&self) -> usize {
        self.sandwiched.len() + self.trapped.len()
    }

    /// True if the move captured nothing.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Applies a legal move in place: slide, sandwich capture at the landing
/// square, then trapping capture of the opponent's groups.
///
/// # Panics
///
/// Panics if the move is not legal for `mover`. Callers gate every move
/// through [`is_legal`] first.
#[instrument(level = "trace", skip(board), fields(mv = %mv))]
pub fn apply_move(board: &mut Board, mv: Move, mover: Color) -> Captures {
    assert!(
        is_legal(board, mv, mover),
        "apply_move called with illegal move {mv} for {mover}"
    );

    let piece = board.at(mv.from);
    board.set(mv.from, Cell::Empty);
    board.set(mv.to, piece);

    let sandwiched = sandwich_capture(board, mv.to, mover);
    let trapped = trapping_capture(board, mover);
    Captures { sandwiched, trapped }
}
