//! Core domain types for Rek.

use derive_new::new;
use serde::{Deserialize, Serialize};

/// Side in the game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Color {
    /// Blue (moves first).
    Blue,
    /// Red (played by the bot in single-player rooms).
    Red,
}

impl Color {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Color::Blue => Color::Red,
            Color::Red => Color::Blue,
        }
    }

    /// The man piece of this side.
    pub fn man(self) -> Cell {
        match self {
            Color::Blue => Cell::BlueMan,
            Color::Red => Cell::RedMan,
        }
    }

    /// The king piece of this side.
    pub fn king(self) -> Cell {
        match self {
            Color::Blue => Cell::BlueKing,
            Color::Red => Cell::RedKing,
        }
    }
}

/// Contents of a single square.
///
/// The serialized form is the single-character code used on the wire:
/// `H` empty, `X` red man, `R` red king, `O` blue man, `P` blue king.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Empty square.
    #[default]
    #[serde(rename = "H")]
    Empty,
    /// Red man.
    #[serde(rename = "X")]
    RedMan,
    /// Red king.
    #[serde(rename = "R")]
    RedKing,
    /// Blue man.
    #[serde(rename = "O")]
    BlueMan,
    /// Blue king.
    #[serde(rename = "P")]
    BlueKing,
}

impl Cell {
    /// Returns the side owning this cell, if any.
    pub fn color(self) -> Option<Color> {
        match self {
            Cell::Empty => None,
            Cell::RedMan | Cell::RedKing => Some(Color::Red),
            Cell::BlueMan | Cell::BlueKing => Some(Color::Blue),
        }
    }

    /// True for the empty square.
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    /// True for either king.
    pub fn is_king(self) -> bool {
        matches!(self, Cell::RedKing | Cell::BlueKing)
    }

    /// True if this cell holds a piece of `color`.
    pub fn belongs_to(self, color: Color) -> bool {
        self.color() == Some(color)
    }

    /// Wire code of this cell.
    pub fn code(self) -> char {
        match self {
            Cell::Empty => 'H',
            Cell::RedMan => 'X',
            Cell::RedKing => 'R',
            Cell::BlueMan => 'O',
            Cell::BlueKing => 'P',
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'H' => Some(Cell::Empty),
            'X' => Some(Cell::RedMan),
            'R' => Some(Cell::RedKing),
            'O' => Some(Cell::BlueMan),
            'P' => Some(Cell::BlueKing),
            _ => None,
        }
    }
}

/// Orthogonal direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Towards row 7.
    Down,
    /// Towards column 0.
    Left,
    /// Towards column 7.
    Right,
}

impl Direction {
    /// Row and column step for one square of travel.
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// A `(row, col)` board coordinate.
///
/// Coordinates arriving from the wire may lie outside the board; use
/// [`Coord::in_bounds`] before indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, new)]
#[serde(from = "[i8; 2]", into = "[i8; 2]")]
pub struct Coord {
    /// Row, 0 at Red's back rank.
    pub row: i8,
    /// Column.
    pub col: i8,
}

impl Coord {
    /// True if both components lie in `[0, 8)`.
    pub fn in_bounds(self) -> bool {
        (0..8).contains(&self.row) && (0..8).contains(&self.col)
    }

    /// The coordinate one step away in `direction` (possibly off-board).
    pub fn step(self, direction: Direction) -> Self {
        let (dr, dc) = direction.delta();
        Self::new(self.row.saturating_add(dr), self.col.saturating_add(dc))
    }

    /// Orthogonal neighbours that are on the board.
    pub fn neighbours(self) -> impl Iterator<Item = Coord> {
        <Direction as strum::IntoEnumIterator>::iter()
            .map(move |d| self.step(d))
            .filter(|c| c.in_bounds())
    }
}

impl From<[i8; 2]> for Coord {
    fn from([row, col]: [i8; 2]) -> Self {
        Self::new(row, col)
    }
}

impl From<Coord> for [i8; 2] {
    fn from(coord: Coord) -> Self {
        [coord.row, coord.col]
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A slide from one square to another.
///
/// A move is atomic: it is either rejected or applied together with all
/// of the captures it causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct Move {
    /// Square the piece leaves.
    pub from: Coord,
    /// Square the piece lands on.
    pub to: Coord,
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
