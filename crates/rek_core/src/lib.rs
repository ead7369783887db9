//! Pure Rek (Khmer checkers) game logic.
//!
//! This crate has no I/O. It provides the board, the rule engine (sliding
//! movement, sandwich and trapping captures, king-capture win detection),
//! first-class board invariants, and the minimax opponent that plays Red.
//!
//! # Example
//!
//! ```
//! use rek_core::{apply_move, is_legal, Board, Color, Coord, Move};
//!
//! let mut board = Board::initial();
//! let opening = Move::new(Coord::new(5, 3), Coord::new(3, 3));
//! assert!(is_legal(&board, opening, Color::Blue));
//! let captures = apply_move(&mut board, opening, Color::Blue);
//! assert!(captures.is_empty());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
pub mod invariants;
pub mod rules;
pub mod search;
mod types;

pub use board::{BOARD_SIZE, Board, BoardParseError};
pub use rules::{Captures, apply_move, is_legal, legal_moves, winner};
pub use search::{BOT_COLOR, DEFAULT_DEPTH, Searcher, evaluate};
pub use types::{Cell, Color, Coord, Direction, Move};
