//! The two capture mechanisms.
//!
//! Both run after every move, sandwich first and then trapping. They only
//! ever remove pieces of the side that did not move.

use super::movement::has_legal_slide;
use crate::{BOARD_SIZE, Board, Cell, Color, Coord, Direction};
use tracing::{debug, instrument};

const AXES: [(Direction, Direction); 2] = [
    (Direction::Left, Direction::Right),
    (Direction::Up, Direction::Down),
];

/// Sandwich (rek) capture anchored at `landed`, the square `mover` just
/// moved to.
///
/// On each axis independently, if both squares at distance one hold
/// opponent pieces, both are removed. Returns the captured squares.
#[instrument(level = "trace", skip(board))]
pub fn sandwich_capture(board: &mut Board, landed: Coord, mover: Color) -> Vec<Coord> {
    let opponent = mover.opponent();
    let mut captured = Vec::new();

    for (a, b) in AXES {
        let (first, second) = (landed.step(a), landed.step(b));
        let flanked = [first, second]
            .iter()
            .all(|&c| board.get(c).is_some_and(|cell| cell.belongs_to(opponent)));
        if flanked {
            board.set(first, Cell::Empty);
            board.set(second, Cell::Empty);
            captured.extend([first, second]);
        }
    }

    if !captured.is_empty() {
        debug!(%landed, count = captured.len(), "Sandwich capture");
    }
    captured
}

/// Group-trapping capture of every opponent group that cannot move.
///
/// Opponent pieces are partitioned into 4-connected groups. A group in
/// which no member has an adjacent empty square is removed whole.
/// Returns the captured squares.
#[instrument(level = "trace", skip(board))]
pub fn trapping_capture(board: &mut Board, mover: Color) -> Vec<Coord> {
    let opponent = mover.opponent();
    let mut visited = [[false; BOARD_SIZE]; BOARD_SIZE];
    let mut trapped = Vec::new();

    let starts: Vec<Coord> = board.pieces_of(opponent).map(|(c, _)| c).collect();
    for start in starts {
        if visited[start.row as usize][start.col as usize] {
            continue;
        }
        let group = connected_group(board, start, opponent, &mut visited);
        if group.iter().all(|&c| !has_legal_slide(board, c)) {
            debug!(size = group.len(), %start, "Trapped group captured");
            trapped.extend(group);
        }
    }

    for &coord in &trapped {
        board.set(coord, Cell::Empty);
    }
    trapped
}

/// Collects the 4-connected group of `color` pieces containing `start`.
fn connected_group(
    board: &Board,
    start: Coord,
    color: Color,
    visited: &mut [[bool; BOARD_SIZE]; BOARD_SIZE],
) -> Vec<Coord> {
    let mut group = Vec::new();
    let mut stack = vec![start];

    while let Some(coord) = stack.pop() {
        let seen = &mut visited[coord.row as usize][coord.col as usize];
        if *seen || !board.at(coord).belongs_to(color) {
            continue;
        }
        *seen = true;
        group.push(coord);
        stack.extend(coord.neighbours());
    }
    group
}
