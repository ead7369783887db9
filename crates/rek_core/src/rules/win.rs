//! Win detection for Rek.

use crate::{Board, Cell, Color};
use tracing::instrument;

/// Returns the winner, if any.
///
/// A side loses the moment it has no king left, however many men remain.
/// If both kings are present, or both are gone, there is no winner.
#[instrument(level = "trace", skip(board))]
pub fn winner(board: &Board) -> Option<Color> {
    let red_king = board.count(Cell::RedKing) > 0;
    let blue_king = board.count(Cell::BlueKing) > 0;

    match (red_king, blue_king) {
        (false, true) => Some(Color::Blue),
        (true, false) => Some(Color::Red),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_winner_at_start() {
        assert_eq!(winner(&Board::initial()), None);
    }

    #[test]
    fn test_red_king_gone_blue_wins() {
        let board = Board::from_rows([
            "XXXXXXXH", "HHHHHHHH", "XXXXXXXX", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "PHHHHHHH",
            "HHHHHHHH",
        ])
        .unwrap();
        assert_eq!(winner(&board), Some(Color::Blue));
    }

    #[test]
    fn test_blue_king_gone_red_wins() {
        let board = Board::from_rows([
            "HHHHHHHR", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "OOOOOOOO", "HHHHHHHH",
            "HOOOOOOO",
        ])
        .unwrap();
        assert_eq!(winner(&board), Some(Color::Red));
    }

    #[test]
    fn test_men_do_not_matter() {
        let board = Board::from_rows([
            "HHHHHHHR", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "PHHHHHHH",
            "HHHHHHHH",
        ])
        .unwrap();
        assert_eq!(winner(&board), None);
        assert_eq!(winner(&Board::empty()), None);
    }
}
