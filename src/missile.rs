//! Missile types, blast geometry and random generation.

use alloc::vec::Vec;
use core::fmt;
use rand::Rng;

use crate::board::{in_bounds, within_radius, Position};
use crate::config::LEAD_TIME;

/// Missile classes, larger class means a larger blast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum MissileType {
    M1,
    M2,
    M3,
    M4,
}

impl MissileType {
    pub const ALL: [MissileType; 4] = [
        MissileType::M1,
        MissileType::M2,
        MissileType::M3,
        MissileType::M4,
    ];

    /// Chebyshev blast radius. M4 covers a 7×7 square.
    pub const fn radius(self) -> u8 {
        match self {
            MissileType::M1 => 0,
            MissileType::M2 => 1,
            MissileType::M3 => 2,
            MissileType::M4 => 3,
        }
    }

    /// Side length of the square the blast covers.
    pub const fn span(self) -> u8 {
        2 * self.radius() + 1
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for MissileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissileType::M1 => "M1",
            MissileType::M2 => "M2",
            MissileType::M3 => "M3",
            MissileType::M4 => "M4",
        };
        f.write_str(name)
    }
}

/// A single incoming strike. Resolves within the round it is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Missile {
    pub target: Position,
    pub kind: MissileType,
    /// Informational lead time broadcast with the warning.
    pub rounds_until_impact: u32,
}

impl Missile {
    pub const fn new(target: Position, kind: MissileType) -> Self {
        Self {
            target,
            kind,
            rounds_until_impact: LEAD_TIME,
        }
    }

    /// Uniform target anywhere on the board, uniform type.
    pub fn generate<R: Rng>(rng: &mut R, board_size: u8) -> Self {
        let target = Position::new(
            rng.random_range(0..board_size),
            rng.random_range(0..board_size),
        );
        Self::new(target, MissileType::random(rng))
    }

    pub fn radius(&self) -> u8 {
        self.kind.radius()
    }

    /// Returns `true` when a soldier standing at `pos` is caught in the blast.
    pub fn strikes(&self, pos: Position) -> bool {
        within_radius(self.target, pos, self.radius())
    }

    /// On-board cells covered by the blast.
    pub fn blast_zone(&self, board_size: u8) -> Vec<Position> {
        let r = self.radius() as i16;
        let mut cells = Vec::with_capacity(self.kind.span() as usize * self.kind.span() as usize);
        for dy in -r..=r {
            for dx in -r..=r {
                let x = self.target.x as i16 + dx;
                let y = self.target.y as i16 + dy;
                if x < 0 || y < 0 || x > u8::MAX as i16 || y > u8::MAX as i16 {
                    continue;
                }
                let cell = Position::new(x as u8, y as u8);
                if in_bounds(cell, board_size) {
                    cells.push(cell);
                }
            }
        }
        cells
    }
}

impl fmt::Display for Missile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} (radius {}, impact in {})",
            self.kind,
            self.target,
            self.radius(),
            self.rounds_until_impact
        )
    }
}
