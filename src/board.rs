//! Grid geometry: positions, bounds clamping and the blast hit test.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;
use rand::Rng;

use crate::common::BoardError;

/// A cell on the N×N board. Several soldiers may share one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// King-move distance between two cells.
    pub fn chebyshev(&self, other: &Position) -> u8 {
        let dx = (self.x as i16 - other.x as i16).unsigned_abs();
        let dy = (self.y as i16 - other.y as i16).unsigned_abs();
        dx.max(dy) as u8
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Returns `true` when `pos` lies on an N×N board.
pub fn in_bounds(pos: Position, board_size: u8) -> bool {
    pos.x < board_size && pos.y < board_size
}

/// Clip a possibly off-board coordinate pair into `[0, board_size - 1]`.
pub fn clamp(x: i32, y: i32, board_size: u8) -> Position {
    let max = board_size.saturating_sub(1) as i32;
    Position::new(x.clamp(0, max) as u8, y.clamp(0, max) as u8)
}

/// Draw a uniformly random cell that is not in `exclude`.
pub fn random_position<R: Rng>(
    rng: &mut R,
    board_size: u8,
    exclude: &BTreeSet<Position>,
) -> Result<Position, BoardError> {
    let free: Vec<Position> = (0..board_size)
        .flat_map(|y| (0..board_size).map(move |x| Position::new(x, y)))
        .filter(|pos| !exclude.contains(pos))
        .collect();
    if free.is_empty() {
        return Err(BoardError::NoFreeCell);
    }
    Ok(free[rng.random_range(0..free.len())])
}

/// Hit test: `point` is inside the square of Chebyshev `radius` around `center`.
pub fn within_radius(center: Position, point: Position, radius: u8) -> bool {
    center.chebyshev(&point) <= radius
}
