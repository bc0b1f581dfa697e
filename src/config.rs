//! Game constants and the settings every game starts from.

use crate::common::ConfigError;

/// Fastest a soldier can move (Chebyshev cells per round).
pub const MAX_SPEED: u8 = 4;
/// An M4 centred on a 7×7 board covers every cell, so boards start at 8.
pub const MIN_BOARD_SIZE: u8 = 8;
/// Commander plus at least one soldier.
pub const MIN_SOLDIERS: usize = 2;
/// Soldier id that holds command when the game starts.
pub const COMMANDER_ID: SoldierId = 0;
/// Nominal rounds between a missile warning and its impact.
pub const LEAD_TIME: u32 = 1;

pub type SoldierId = u32;

/// Parameters fixed for the lifetime of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct GameSettings {
    /// Side length N of the N×N board.
    pub board_size: u8,
    /// Total soldiers M, commander included.
    pub soldier_count: usize,
    /// Seconds between missiles (t).
    pub missile_interval: u32,
    /// Seconds the game lasts (T).
    pub game_duration: u32,
}

impl GameSettings {
    pub const fn new(
        board_size: u8,
        soldier_count: usize,
        missile_interval: u32,
        game_duration: u32,
    ) -> Self {
        Self {
            board_size,
            soldier_count,
            missile_interval,
            game_duration,
        }
    }

    /// Reject settings that cannot produce a meaningful game.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size < MIN_BOARD_SIZE {
            return Err(ConfigError::BoardTooSmall(self.board_size));
        }
        if self.soldier_count < MIN_SOLDIERS {
            return Err(ConfigError::TooFewSoldiers(self.soldier_count));
        }
        if self.missile_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.missile_interval > self.game_duration {
            return Err(ConfigError::IntervalExceedsDuration {
                interval: self.missile_interval,
                duration: self.game_duration,
            });
        }
        Ok(())
    }

    /// Number of missiles a game that is never lost will see.
    pub fn planned_rounds(&self) -> u32 {
        if self.missile_interval == 0 {
            return 0;
        }
        self.game_duration.div_ceil(self.missile_interval)
    }
}

/// Validate a soldier's speed against [`MAX_SPEED`].
pub fn check_speed(speed: u8) -> Result<(), ConfigError> {
    if speed > MAX_SPEED {
        Err(ConfigError::SpeedOutOfRange(speed))
    } else {
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use inventory::read_inventory;

#[cfg(feature = "std")]
mod inventory {
    use std::path::Path;

    /// Read a soldier inventory: one `host:port` per line, `#` starts a comment.
    pub fn read_inventory(path: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read inventory {}: {}", path.display(), e))?;
        Ok(parse_inventory(&text))
    }

    pub(super) fn parse_inventory(text: &str) -> Vec<String> {
        text.lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

}
