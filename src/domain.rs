//! Data exchanged between commander and soldiers.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::board::Position;
use crate::config::{GameSettings, SoldierId};

/// The commander's roster entry for one soldier.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct SoldierRecord {
    pub id: SoldierId,
    /// Opaque transport address used to reach the soldier.
    pub address: String,
    /// Last confirmed position; frozen once the soldier is hit.
    pub position: Position,
    pub speed: u8,
    pub alive: bool,
}

/// Reply to a startup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct StartupReport {
    pub soldier_id: SoldierId,
    pub position: Position,
    pub speed: u8,
}

/// Outcome a soldier reports after taking shelter. A hit carries no position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundStatus {
    Hit,
    Alive { position: Position },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum GameResult {
    Win,
    Loss,
}

/// A hit soldier, kept only so the final notice can reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FallenSoldier {
    pub id: SoldierId,
    pub address: String,
}

/// Everything a successor needs to carry on the game.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct HandoffState {
    pub settings: GameSettings,
    /// Seconds of game time already played; the successor keeps counting from here.
    pub elapsed: u32,
    pub remaining: u32,
    pub rounds: u32,
    /// Soldiers still alive, the successor included.
    pub roster: Vec<SoldierRecord>,
    pub fallen: Vec<FallenSoldier>,
    /// Soldiers whose last reports went missing, with the number of rounds.
    pub missed_rounds: BTreeMap<SoldierId, u32>,
}
