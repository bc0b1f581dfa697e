//! Error types shared by the game logic.

use crate::config::{SoldierId, MAX_SPEED, MIN_BOARD_SIZE, MIN_SOLDIERS};

/// Invalid game configuration. Always fatal: the game is refused before
/// the first round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BoardTooSmall(u8),
    TooFewSoldiers(usize),
    ZeroInterval,
    IntervalExceedsDuration { interval: u32, duration: u32 },
    SpeedOutOfRange(u8),
    /// Number of soldier addresses does not match `soldier_count - 1`.
    SoldierCountMismatch { expected: usize, found: usize },
    DuplicateSoldier(SoldierId),
    /// Reported start position lies off the board.
    OutOfBounds { soldier: SoldierId, x: u8, y: u8 },
    /// Commander start cell is shared with a soldier.
    CommanderCollision(SoldierId),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::BoardTooSmall(n) => {
                write!(f, "board size {} is below the minimum of {}", n, MIN_BOARD_SIZE)
            }
            ConfigError::TooFewSoldiers(m) => {
                write!(f, "{} soldiers is below the minimum of {}", m, MIN_SOLDIERS)
            }
            ConfigError::ZeroInterval => write!(f, "missile interval must be positive"),
            ConfigError::IntervalExceedsDuration { interval, duration } => write!(
                f,
                "missile interval {}s exceeds game duration {}s",
                interval, duration
            ),
            ConfigError::SpeedOutOfRange(s) => {
                write!(f, "speed {} is outside 0..={}", s, MAX_SPEED)
            }
            ConfigError::SoldierCountMismatch { expected, found } => write!(
                f,
                "expected {} soldier addresses, found {}",
                expected, found
            ),
            ConfigError::DuplicateSoldier(id) => write!(f, "soldier {} enlisted twice", id),
            ConfigError::OutOfBounds { soldier, x, y } => {
                write!(f, "soldier {} reported off-board position ({}, {})", soldier, x, y)
            }
            ConfigError::CommanderCollision(id) => {
                write!(f, "commander start cell collides with soldier {}", id)
            }
        }
    }
}

/// Errors from board geometry helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// Every cell is excluded, nothing left to draw from.
    NoFreeCell,
}

impl core::fmt::Display for BoardError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BoardError::NoFreeCell => write!(f, "no free cell left on the board"),
        }
    }
}

/// Errors raised while scoring a round or handing over command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    /// The game already reached Win or Loss.
    GameFinished,
    UnknownSoldier(SoldierId),
    /// Command can only go to a soldier that is still alive.
    SuccessorNotAlive(SoldierId),
}

impl core::fmt::Display for RoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RoundError::GameFinished => write!(f, "game is already over"),
            RoundError::UnknownSoldier(id) => write!(f, "soldier {} is not on the roster", id),
            RoundError::SuccessorNotAlive(id) => {
                write!(f, "soldier {} cannot take command: not alive", id)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
#[cfg(feature = "std")]
impl std::error::Error for BoardError {}
#[cfg(feature = "std")]
impl std::error::Error for RoundError {}
