//! First-class invariants for Rek.
//!
//! Invariants are logical properties that must hold across every move.
//! The room state machine checks them in debug builds after each
//! authoritative move, and they are testable independently.

use crate::{Board, Cell, Color, Coord, Move};
use strum::IntoEnumIterator;

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("Invariant violated: {}", description)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let violations: Vec<_> = [
            (I1::holds(state), I1::description()),
            (I2::holds(state), I2::description()),
            (I3::holds(state), I3::description()),
        ]
        .into_iter()
        .filter(|(holds, _)| !holds)
        .map(|(_, description)| InvariantViolation::new(description))
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// A board before and after one move.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// Board before the move.
    pub before: &'a Board,
    /// Board after the move and its captures.
    pub after: &'a Board,
    /// The move that was played.
    pub mv: Move,
}

/// The number of pieces on the board never increases.
pub struct MonotonicPieceCount;

impl Invariant<Transition<'_>> for MonotonicPieceCount {
    fn holds(t: &Transition<'_>) -> bool {
        t.after.piece_count() <= t.before.piece_count()
    }

    fn description() -> &'static str {
        "Piece count never increases"
    }
}

/// A square that was empty stays empty, except the landing square.
pub struct NoResurrection;

impl Invariant<Transition<'_>> for NoResurrection {
    fn holds(t: &Transition<'_>) -> bool {
        (0..8i8)
            .flat_map(|row| (0..8i8).map(move |col| Coord::new(row, col)))
            .filter(|&c| c != t.mv.to && t.before.at(c) == Cell::Empty)
            .all(|c| t.after.at(c) == Cell::Empty)
    }

    fn description() -> &'static str {
        "Emptied squares are never refilled except by the moving piece"
    }
}

/// Each side has at most one king.
pub struct AtMostOneKing;

impl Invariant<Transition<'_>> for AtMostOneKing {
    fn holds(t: &Transition<'_>) -> bool {
        Color::iter().all(|color| t.after.count(color.king()) <= 1)
    }

    fn description() -> &'static str {
        "Each side has at most one king"
    }
}

/// All Rek move invariants as a composable set.
pub type RekInvariants = (MonotonicPieceCount, NoResurrection, AtMostOneKing);
