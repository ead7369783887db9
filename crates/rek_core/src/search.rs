//! Minimax opponent with alpha-beta pruning.
//!
//! The bot always plays Red, the maximizing side. Move generation and
//! capture simulation go through [`crate::rules`], so the bot
//! sees exactly the captures the authoritative engine will perform.
//!
//! Running out of moves is scored as a loss here, but that is only a
//! search heuristic: the game itself ends solely on king capture.

use crate::rules::{apply_move, legal_moves};
use crate::{Board, Cell, Color, Move};
use derive_new::new;
use tracing::{debug, instrument};

/// Side the bot plays.
pub const BOT_COLOR: Color = Color::Red;

/// Default search depth below each root move.
pub const DEFAULT_DEPTH: u8 = 3;

/// Score for a side to move that has no legal move.
pub const TERMINAL_SCORE: i32 = 10_000;

/// Static evaluation from Red's point of view.
///
/// Red men are worth 10 plus 2 per row of distance from row 7, Blue men 10
/// plus 2 per row of distance from row 0, kings 50.
pub fn evaluate(board: &Board) -> i32 {
    board
        .pieces()
        .map(|(coord, cell)| {
            let row = i32::from(coord.row);
            match cell {
                Cell::RedMan => 10 + 2 * (7 - row),
                Cell::RedKing => 50,
                Cell::BlueMan => -10 - 2 * row,
                Cell::BlueKing => -50,
                Cell::Empty => 0,
            }
        })
        .sum()
}

/// Every move available to `color`.
pub fn possible_moves(board: &Board, color: Color) -> Vec<Move> {
    legal_moves(board, color)
}

/// Plays `mv` on a scratch copy of `board`, with both capture passes.
///
/// # Panics
///
/// Panics if `from` is empty or the move is illegal.
pub fn simulate(board: &Board, mv: Move) -> Board {
    let Some(mover) = board.at(mv.from).color() else {
        panic!("simulate called on empty square {}", mv.from);
    };
    let mut next = board.clone();
    apply_move(&mut next, mv, mover);
    next
}

/// Fixed-depth minimax searcher.
#[derive(Debug, Clone, Copy, new)]
pub struct Searcher {
    depth: u8,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl Searcher {
    /// Depth searched below each root move.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Chooses Red's move, or `None` if Red cannot move.
    ///
    /// Each root move is scored by a full-window minimax of the resulting
    /// position; the first move with the highest score wins ties.
    #[instrument(skip(self, board), fields(depth = self.depth))]
    pub fn best_move(&self, board: &Board) -> Option<Move> {
        let mut best: Option<(Move, i32)> = None;

        for mv in possible_moves(board, BOT_COLOR) {
            let score = self.score_root(board, mv);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((mv, score));
            }
        }

        if let Some((mv, score)) = best {
            debug!(%mv, score, "Bot chose move");
        }
        best.map(|(mv, _)| mv)
    }

    /// Minimax value of playing `mv` as Red from `board`.
    pub fn score_root(&self, board: &Board, mv: Move) -> i32 {
        let next = simulate(board, mv);
        self.minimax(&next, self.depth, false, i32::MIN, i32::MAX)
    }

    /// Minimax with alpha-beta pruning. Red maximizes, Blue minimizes.
    pub fn minimax(
        &self,
        board: &Board,
        depth: u8,
        maximizing: bool,
        mut alpha: i32,
        mut beta: i32,
    ) -> i32 {
        if depth == 0 {
            return evaluate(board);
        }

        let color = if maximizing { Color::Red } else { Color::Blue };
        let moves = possible_moves(board, color);
        if moves.is_empty() {
            return if maximizing {
                -TERMINAL_SCORE
            } else {
                TERMINAL_SCORE
            };
        }

        if maximizing {
            let mut max_eval = i32::MIN;
            for mv in moves {
                let eval = self.minimax(&simulate(board, mv), depth - 1, false, alpha, beta);
                max_eval = max_eval.max(eval);
                alpha = alpha.max(eval);
                if beta <= alpha {
                    break;
                }
            }
            max_eval
        } else {
            let mut min_eval = i32::MAX;
            for mv in moves {
                let eval = self.minimax(&simulate(board, mv), depth - 1, true, alpha, beta);
                min_eval = min_eval.min(eval);
                beta = beta.min(eval);
                if beta <= alpha {
                    break;
                }
            }
            min_eval
        }
    }
}
