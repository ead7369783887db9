//! The 8x8 Rek board.

use crate::types::{Cell, Color, Coord};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Side length of the board.
pub const BOARD_SIZE: usize = 8;

const H: Cell = Cell::Empty;
const X: Cell = Cell::RedMan;
const R: Cell = Cell::RedKing;
const O: Cell = Cell::BlueMan;
const P: Cell = Cell::BlueKing;

/// Starting position. Red holds rows 0-2, Blue rows 5-7.
const INITIAL_LAYOUT: [[Cell; BOARD_SIZE]; BOARD_SIZE] = [
    [X, X, X, X, X, X, X, H],
    [H, H, H, H, H, H, H, R],
    [X, X, X, X, X, X, X, X],
    [H, H, H, H, H, H, H, H],
    [H, H, H, H, H, H, H, H],
    [O, O, O, O, O, O, O, O],
    [P, H, H, H, H, H, H, H],
    [H, O, O, O, O, O, O, O],
];

/// Error parsing a textual board.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BoardParseError {
    /// A row did not contain exactly eight codes.
    #[display("Row {} has {} cells, expected 8", row, len)]
    RowLength {
        /// Offending row.
        row: usize,
        /// Number of codes found.
        len: usize,
    },
    /// An unknown cell code.
    #[display("Unknown cell code {:?} at row {}", code, row)]
    UnknownCode {
        /// Offending row.
        row: usize,
        /// The character that was not recognised.
        code: char,
    },
}

/// 8x8 grid of cells in row-major order.
///
/// Serializes as an array of eight rows of single-character codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates a board with no pieces.
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Creates the fixed starting layout.
    pub fn initial() -> Self {
        Self {
            cells: INITIAL_LAYOUT,
        }
    }

    /// Parses eight rows of eight cell codes, e.g. `"XXXXXXXH"`.
    pub fn from_rows(rows: [&str; BOARD_SIZE]) -> Result<Self, BoardParseError> {
        let mut board = Self::empty();
        for (row, text) in rows.iter().enumerate() {
            let codes: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
            if codes.len() != BOARD_SIZE {
                return Err(BoardParseError::RowLength {
                    row,
                    len: codes.len(),
                });
            }
            for (col, code) in codes.into_iter().enumerate() {
                board.cells[row][col] =
                    Cell::from_code(code).ok_or(BoardParseError::UnknownCode { row, code })?;
            }
        }
        Ok(board)
    }

    /// True if `coord` lies on the board.
    pub fn in_bounds(coord: Coord) -> bool {
        coord.in_bounds()
    }

    /// Returns the cell at `coord`.
    ///
    /// # Panics
    ///
    /// Panics if `coord` is off the board.
    pub fn at(&self, coord: Coord) -> Cell {
        assert!(coord.in_bounds(), "coordinate {coord} is off the board");
        self.cells[coord.row as usize][coord.col as usize]
    }

    /// Returns the cell at `coord`, or `None` if it is off the board.
    pub fn get(&self, coord: Coord) -> Option<Cell> {
        coord
            .in_bounds()
            .then(|| self.cells[coord.row as usize][coord.col as usize])
    }

    /// Overwrites the cell at `coord`.
    ///
    /// # Panics
    ///
    /// Panics if `coord` is off the board.
    pub fn set(&mut self, coord: Coord, cell: Cell) {
        assert!(coord.in_bounds(), "coordinate {coord} is off the board");
        self.cells[coord.row as usize][coord.col as usize] = cell;
    }

    /// True if `coord` is on the board and empty.
    pub fn is_empty_at(&self, coord: Coord) -> bool {
        self.get(coord) == Some(Cell::Empty)
    }

    /// Iterates over every occupied square in row-major order.
    pub fn pieces(&self) -> impl Iterator<Item = (Coord, Cell)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().filter_map(move |(col, &cell)| {
                (!cell.is_empty()).then(|| (Coord::new(row as i8, col as i8), cell))
            })
        })
    }

    /// Iterates over the squares holding pieces of `color`.
    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = (Coord, Cell)> + '_ {
        self.pieces().filter(move |(_, cell)| cell.belongs_to(color))
    }

    /// Total number of pieces on the board.
    pub fn piece_count(&self) -> usize {
        self.pieces().count()
    }

    /// Number of squares holding exactly `cell`.
    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().flatten().filter(|&&c| c == cell).count()
    }

    /// Rows of wire codes.
    pub fn rows(&self) -> [String; BOARD_SIZE] {
        std::array::from_fn(|row| self.cells[row].iter().map(|c| c.code()).collect())
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut result = String::from("  01234567\n");
        for (row, line) in self.rows().iter().enumerate() {
            result.push_str(&format!("{row} {line}\n"));
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.rows().join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_layout_is_fixed() {
        let board = Board::initial();
        assert_eq!(
            board.rows(),
            [
                "XXXXXXXH", "HHHHHHHR", "XXXXXXXX", "HHHHHHHH", "HHHHHHHH", "OOOOOOOO",
                "PHHHHHHH", "HOOOOOOO",
            ]
        );
    }

    #[test]
    fn test_initial_layout_is_mirrored() {
        let board = Board::initial();
        assert_eq!(board.count(Cell::RedKing), 1);
        assert_eq!(board.count(Cell::BlueKing), 1);
        assert_eq!(board.count(Cell::RedMan), board.count(Cell::BlueMan));
        for (coord, cell) in board.pieces() {
            let mirror = Coord::new(7 - coord.row, 7 - coord.col);
            assert_eq!(board.at(mirror).color(), cell.color().map(Color::opponent));
        }
    }

    #[test]
    fn test_initial_board_json() {
        let json = serde_json::to_value(Board::initial()).unwrap();
        assert_eq!(json[1][7], "R");
        assert_eq!(json[6][0], "P");
        assert_eq!(json[3][3], "H");
        assert_eq!(json.as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_from_rows_rejects_bad_input() {
        let mut rows = ["HHHHHHHH"; 8];
        rows[2] = "HHH";
        assert_eq!(
            Board::from_rows(rows),
            Err(BoardParseError::RowLength { row: 2, len: 3 })
        );
        rows[2] = "HHHZHHHH";
        assert_eq!(
            Board::from_rows(rows),
            Err(BoardParseError::UnknownCode { row: 2, code: 'Z' })
        );
    }

    #[test]
    #[should_panic(expected = "off the board")]
    fn test_at_out_of_bounds_panics() {
        Board::initial().at(Coord::new(8, 0));
    }

    #[test]
    fn test_get_out_of_bounds_is_none() {
        assert_eq!(Board::initial().get(Coord::new(-1, 0)), None);
    }
}
