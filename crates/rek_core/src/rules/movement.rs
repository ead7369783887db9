//! Sliding movement.
//!
//! Every piece, man or king, moves like a rook: any number of empty squares
//! along a row or column, never jumping.

use crate::{Board, Color, Coord, Direction, Move};
use strum::IntoEnumIterator;
use tracing::instrument;

/// Checks whether `mover` may play `mv` on `board`.
///
/// Out-of-bounds coordinates are treated as illegal rather than as a
/// programming error, since moves arrive from untrusted clients.
#[instrument(level = "trace", skip(board), fields(mv = %mv))]
pub fn is_legal(board: &Board, mv: Move, mover: Color) -> bool {
    let Move { from, to } = mv;
    if !from.in_bounds() || !to.in_bounds() {
        return false;
    }
    if !board.at(to).is_empty() || !board.at(from).belongs_to(mover) {
        return false;
    }

    let dr = to.row - from.row;
    let dc = to.col - from.col;
    if (dr == 0) == (dc == 0) {
        // Diagonal or zero-length.
        return false;
    }

    let step = (dr.signum(), dc.signum());
    let mut square = Coord::new(from.row + step.0, from.col + step.1);
    while square != to {
        if !board.at(square).is_empty() {
            return false;
        }
        square = Coord::new(square.row + step.0, square.col + step.1);
    }
    true
}

/// Every empty square reachable from `from`, ordered by direction
/// (up, down, left, right) and then by distance.
pub fn slides_from(board: &Board, from: Coord) -> Vec<Coord> {
    let mut targets = Vec::new();
    for direction in Direction::iter() {
        let mut square = from.step(direction);
        while board.is_empty_at(square) {
            targets.push(square);
            square = square.step(direction);
        }
    }
    targets
}

/// True if the piece at `coord` has at least one orthogonally adjacent empty
/// square, i.e. any slide at all.
pub fn has_legal_slide(board: &Board, coord: Coord) -> bool {
    coord.neighbours().any(|n| board.at(n).is_empty())
}

/// Every legal move for `color`, pieces scanned in row-major order.
#[instrument(level = "trace", skip(board))]
pub fn legal_moves(board: &Board, color: Color) -> Vec<Move> {
    board
        .pieces_of(color)
        .flat_map(|(from, _)| {
            slides_from(board, from)
                .into_iter()
                .map(move |to| Move::new(from, to))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(from: (i8, i8), to: (i8, i8)) -> Move {
        Move::new(Coord::new(from.0, from.1), Coord::new(to.0, to.1))
    }

    fn lone_man_board() -> Board {
        Board::from_rows([
            "HHHHHHHR", "HHHHHHHH", "HHHHHHHH", "HHHXHHHH", "HHHHHHHH", "HHHOHHHH", "HHHHHHHH",
            "PHHHHHHH",
        ])
        .unwrap()
    }

    #[test]
    fn test_slide_any_distance_until_blocked() {
        let board = lone_man_board();
        assert!(is_legal(&board, mv((5, 3), (4, 3)), Color::Blue));
        assert!(!is_legal(&board, mv((5, 3), (3, 3)), Color::Blue));
        assert!(!is_legal(&board, mv((5, 3), (2, 3)), Color::Blue));
        assert!(is_legal(&board, mv((5, 3), (7, 3)), Color::Blue));
        assert!(is_legal(&board, mv((5, 3), (5, 0)), Color::Blue));
        assert!(is_legal(&board, mv((5, 3), (5, 7)), Color::Blue));
    }

    #[test]
    fn test_friendly_pieces_block_too() {
        let board = Board::initial();
        // Red man at (0, 0) can only drop into row 1; its own row-2 man blocks the rest.
        assert!(is_legal(&board, mv((0, 0), (1, 0)), Color::Red));
        assert!(!is_legal(&board, mv((0, 0), (3, 0)), Color::Red));
        assert_eq!(slides_from(&board, Coord::new(0, 0)), vec![Coord::new(1, 0)]);
    }

    #[test]
    fn test_diagonal_and_null_moves_rejected() {
        let board = lone_man_board();
        assert!(!is_legal(&board, mv((5, 3), (4, 4)), Color::Blue));
        assert!(!is_legal(&board, mv((5, 3), (5, 3)), Color::Blue));
    }

    #[test]
    fn test_must_move_own_piece_to_empty_square() {
        let board = lone_man_board();
        assert!(!is_legal(&board, mv((5, 3), (4, 3)), Color::Red));
        assert!(!is_legal(&board, mv((4, 3), (5, 3)), Color::Blue));
        assert!(!is_legal(&board, mv((3, 3), (5, 3)), Color::Red));
    }

    #[test]
    fn test_off_board_moves_rejected() {
        let board = lone_man_board();
        assert!(!is_legal(&board, mv((5, 3), (5, 8)), Color::Blue));
        assert!(!is_legal(&board, mv((-1, 3), (4, 3)), Color::Blue));
    }

    #[test]
    fn test_every_generated_move_is_legal() {
        let board = Board::initial();
        for color in [Color::Blue, Color::Red] {
            let moves = legal_moves(&board, color);
            assert!(!moves.is_empty());
            for m in moves {
                assert!(is_legal(&board, m, color), "{m} should be legal");
            }
        }
    }

    #[test]
    fn test_has_legal_slide_is_adjacency_only() {
        let board = Board::from_rows([
            "XOHHHHHR", "OHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH",
            "PHHHHHHH",
        ])
        .unwrap();
        assert!(!has_legal_slide(&board, Coord::new(0, 0)));
        assert!(has_legal_slide(&board, Coord::new(0, 1)));
        assert!(has_legal_slide(&board, Coord::new(1, 0)));
    }
}
