//! A single soldier and its evasion rule.

use crate::board::{clamp, in_bounds, Position};
use crate::common::ConfigError;
use crate::config::{check_speed, SoldierId};
use crate::missile::Missile;

/// Life cycle of a soldier. `Hit` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum SoldierState {
    Alive,
    Hit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soldier {
    id: SoldierId,
    position: Position,
    speed: u8,
    board_size: u8,
    state: SoldierState,
}

impl Soldier {
    pub fn new(
        id: SoldierId,
        position: Position,
        speed: u8,
        board_size: u8,
    ) -> Result<Self, ConfigError> {
        check_speed(speed)?;
        if !in_bounds(position, board_size) {
            return Err(ConfigError::OutOfBounds {
                soldier: id,
                x: position.x,
                y: position.y,
            });
        }
        Ok(Self {
            id,
            position,
            speed,
            board_size,
            state: SoldierState::Alive,
        })
    }

    pub fn id(&self) -> SoldierId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn state(&self) -> SoldierState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == SoldierState::Alive
    }

    /// Best cell to run to: the closest on-board cell within `speed` that the
    /// blast does not reach. Ties go to the first cell in row-major order.
    pub fn escape_route(&self, missile: &Missile) -> Option<Position> {
        let reach = self.speed as i32;
        let (x0, y0) = (self.position.x as i32, self.position.y as i32);
        let mut best: Option<(u8, Position)> = None;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let cell = clamp(x0 + dx, y0 + dy, self.board_size);
                if missile.strikes(cell) {
                    continue;
                }
                let dist = self.position.chebyshev(&cell);
                let better = match best {
                    None => true,
                    Some((d, p)) => dist < d || (dist == d && (cell.y, cell.x) < (p.y, p.x)),
                };
                if better {
                    best = Some((dist, cell));
                }
            }
        }
        best.map(|(_, cell)| cell)
    }

    /// React to an incoming missile. Only moves when threatened; stays put
    /// when boxed in. Returns the resulting position.
    pub fn take_shelter(&mut self, missile: &Missile) -> Position {
        if !self.is_alive() || !missile.strikes(self.position) {
            return self.position;
        }
        match self.escape_route(missile) {
            Some(cell) => {
                log::debug!(
                    "soldier {} moves {} -> {} away from {}",
                    self.id,
                    self.position,
                    cell,
                    missile
                );
                self.position = cell;
            }
            None => log::debug!("soldier {} is boxed in at {}", self.id, self.position),
        }
        self.position
    }

    /// Resolve impact against the final position. Never revives.
    pub fn assess(&mut self, missile: &Missile) -> SoldierState {
        if self.is_alive() && missile.strikes(self.position) {
            self.state = SoldierState::Hit;
        }
        self.state
    }
}
