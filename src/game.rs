use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::{
    board::{in_bounds, random_position, Position},
    common::{BoardError, ConfigError, RoundError},
    config::{check_speed, GameSettings, SoldierId},
    domain::{FallenSoldier, GameResult, HandoffState, RoundStatus, SoldierRecord},
    missile::Missile,
};

/// Current status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum GameStatus {
    InProgress,
    Won,
    Lost,
}

impl GameStatus {
    pub fn result(self) -> Option<GameResult> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::Won => Some(GameResult::Win),
            GameStatus::Lost => Some(GameResult::Loss),
        }
    }
}

/// How the commander judged one soldier's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Survived(Position),
    Hit,
    /// No reply this round; last known state kept.
    Silent,
}

/// Scored result of a single round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    pub missile: Missile,
    pub verdicts: BTreeMap<SoldierId, Verdict>,
    pub alive: usize,
    pub hit: usize,
    pub elapsed: u32,
    pub status: GameStatus,
}

impl RoundSummary {
    /// Soldiers that went down this round.
    pub fn casualties(&self) -> impl Iterator<Item = SoldierId> + '_ {
        self.verdicts
            .iter()
            .filter(|(_, v)| matches!(v, Verdict::Hit))
            .map(|(id, _)| *id)
    }
}

/// Authoritative game state. Owned and mutated only by the soldier that
/// currently holds command.
#[derive(Debug, Clone)]
pub struct GameEngine {
    settings: GameSettings,
    commander: SoldierId,
    roster: BTreeMap<SoldierId, SoldierRecord>,
    /// Casualties inherited through a handoff, no longer on the roster.
    fallen: Vec<FallenSoldier>,
    /// Consecutive silent rounds per soldier. A soldier may have moved in
    /// each of them, so its next report may be that much farther away.
    missed_rounds: BTreeMap<SoldierId, u32>,
    elapsed: u32,
    rounds: u32,
    status: GameStatus,
}

impl GameEngine {
    /// Start a fresh game with `commander` holding command.
    pub fn new(settings: GameSettings, commander: SoldierId) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            commander,
            roster: BTreeMap::new(),
            fallen: Vec::new(),
            missed_rounds: BTreeMap::new(),
            elapsed: 0,
            rounds: 0,
            status: GameStatus::InProgress,
        })
    }

    /// Rebuild the engine on the successor from the outgoing commander's package.
    pub fn from_handoff(state: HandoffState, successor: SoldierId) -> Result<Self, RoundError> {
        let roster: BTreeMap<SoldierId, SoldierRecord> = state
            .roster
            .into_iter()
            .filter(|r| r.alive)
            .map(|r| (r.id, r))
            .collect();
        if !roster.contains_key(&successor) {
            return Err(RoundError::SuccessorNotAlive(successor));
        }
        let mut engine = Self {
            settings: state.settings,
            commander: successor,
            roster,
            fallen: state.fallen,
            missed_rounds: state.missed_rounds,
            elapsed: state.elapsed,
            rounds: state.rounds,
            status: GameStatus::InProgress,
        };
        engine.status = engine.evaluate();
        Ok(engine)
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn commander(&self) -> SoldierId {
        self.commander
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn remaining(&self) -> u32 {
        self.settings.game_duration.saturating_sub(self.elapsed)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn soldier(&self, id: SoldierId) -> Option<&SoldierRecord> {
        self.roster.get(&id)
    }

    pub fn roster(&self) -> impl Iterator<Item = &SoldierRecord> {
        self.roster.values()
    }

    pub fn alive_ids(&self) -> Vec<SoldierId> {
        self.roster
            .values()
            .filter(|r| r.alive)
            .map(|r| r.id)
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.roster.values().filter(|r| r.alive).count()
    }

    /// Hits across the whole game, including casualties dropped at handoff.
    pub fn hit_count(&self) -> usize {
        self.settings
            .soldier_count
            .saturating_sub(self.alive_count())
    }

    pub fn commander_alive(&self) -> bool {
        self.roster
            .get(&self.commander)
            .map(|r| r.alive)
            .unwrap_or(false)
    }

    /// Start cells taken by soldiers other than the commander.
    pub fn occupied(&self) -> BTreeSet<Position> {
        self.roster
            .values()
            .filter(|r| r.id != self.commander)
            .map(|r| r.position)
            .collect()
    }

    /// Add a soldier at game start.
    pub fn enlist(&mut self, record: SoldierRecord) -> Result<(), ConfigError> {
        check_speed(record.speed)?;
        if !in_bounds(record.position, self.settings.board_size) {
            return Err(ConfigError::OutOfBounds {
                soldier: record.id,
                x: record.position.x,
                y: record.position.y,
            });
        }
        if self.roster.contains_key(&record.id) {
            return Err(ConfigError::DuplicateSoldier(record.id));
        }
        let commander_cell = if record.id == self.commander {
            self.roster
                .values()
                .find(|r| r.position == record.position)
                .map(|r| r.id)
        } else {
            self.roster
                .get(&self.commander)
                .filter(|c| c.position == record.position)
                .map(|_| record.id)
        };
        if let Some(id) = commander_cell {
            return Err(ConfigError::CommanderCollision(id));
        }
        self.roster.insert(record.id, record);
        Ok(())
    }

    /// Pick the commander's start cell away from every soldier's.
    pub fn place_commander<R: Rng>(&self, rng: &mut R) -> Result<Position, BoardError> {
        random_position(rng, self.settings.board_size, &self.occupied())
    }

    /// Check every soldier reported in; the roster must match the settings.
    pub fn muster_complete(&self) -> Result<(), ConfigError> {
        if self.roster.len() != self.settings.soldier_count {
            return Err(ConfigError::SoldierCountMismatch {
                expected: self.settings.soldier_count,
                found: self.roster.len(),
            });
        }
        Ok(())
    }

    /// Score one round. Alive soldiers missing from `replies` count as silent.
    pub fn score_round<I>(&mut self, missile: &Missile, replies: I) -> Result<RoundSummary, RoundError>
    where
        I: IntoIterator<Item = (SoldierId, Option<RoundStatus>)>,
    {
        if self.status != GameStatus::InProgress {
            return Err(RoundError::GameFinished);
        }
        let mut replies: BTreeMap<SoldierId, Option<RoundStatus>> = replies.into_iter().collect();
        if let Some(id) = replies.keys().find(|id| !self.roster.contains_key(id)) {
            return Err(RoundError::UnknownSoldier(*id));
        }

        let board_size = self.settings.board_size;
        let mut verdicts = BTreeMap::new();
        for record in self.roster.values_mut().filter(|r| r.alive) {
            let reply = replies.remove(&record.id).flatten();
            let missed = self.missed_rounds.entry(record.id).or_insert(0);
            let verdict = judge(record, missed, missile, board_size, reply);
            verdicts.insert(record.id, verdict);
        }
        self.missed_rounds.retain(|_, missed| *missed > 0);

        self.rounds += 1;
        self.elapsed = self.elapsed.saturating_add(self.settings.missile_interval);
        self.status = self.evaluate();
        for id in verdicts.iter().filter(|(_, v)| matches!(v, Verdict::Hit)).map(|(id, _)| id) {
            log::info!("round {}: soldier {} hit by {}", self.rounds, id, missile);
        }

        Ok(RoundSummary {
            round: self.rounds,
            missile: *missile,
            verdicts,
            alive: self.alive_count(),
            hit: self.hit_count(),
            elapsed: self.elapsed,
            status: self.status,
        })
    }

    /// Loss as soon as more than half are hit; win once time is up with
    /// someone still standing.
    fn evaluate(&self) -> GameStatus {
        if self.status != GameStatus::InProgress {
            return self.status;
        }
        if self.hit_count() * 2 > self.settings.soldier_count {
            GameStatus::Lost
        } else if self.elapsed >= self.settings.game_duration {
            if self.alive_count() > 0 {
                GameStatus::Won
            } else {
                GameStatus::Lost
            }
        } else {
            GameStatus::InProgress
        }
    }

    /// End the game early, e.g. when nobody can take command.
    pub fn concede(&mut self) {
        self.status = GameStatus::Lost;
    }

    /// Alive soldiers other than the commander, in random order.
    pub fn successor_candidates<R: Rng>(&self, rng: &mut R) -> Vec<SoldierId> {
        let mut ids: Vec<SoldierId> = self
            .alive_ids()
            .into_iter()
            .filter(|id| *id != self.commander)
            .collect();
        ids.shuffle(rng);
        ids
    }

    /// Package the game for `successor`.
    pub fn handoff(&self, successor: SoldierId) -> Result<HandoffState, RoundError> {
        match self.roster.get(&successor) {
            Some(r) if r.alive => {}
            Some(_) => return Err(RoundError::SuccessorNotAlive(successor)),
            None => return Err(RoundError::UnknownSoldier(successor)),
        }
        Ok(HandoffState {
            settings: self.settings,
            elapsed: self.elapsed,
            remaining: self.remaining(),
            rounds: self.rounds,
            roster: self.roster.values().filter(|r| r.alive).cloned().collect(),
            fallen: self.notice_list_inner(|r| !r.alive),
            missed_rounds: self.missed_rounds.clone(),
        })
    }

    /// Everyone to notify when the game ends, the commander excluded.
    pub fn notice_list(&self) -> Vec<FallenSoldier> {
        self.notice_list_inner(|r| r.id != self.commander)
    }

    fn notice_list_inner(&self, keep: impl Fn(&SoldierRecord) -> bool) -> Vec<FallenSoldier> {
        let mut list: Vec<FallenSoldier> = self
            .roster
            .values()
            .filter(|r| keep(r))
            .map(|r| FallenSoldier {
                id: r.id,
                address: r.address.clone(),
            })
            .collect();
        list.extend(self.fallen.iter().filter(|f| f.id != self.commander).cloned());
        list
    }
}

/// Apply one soldier's reply. The commander repeats the hit test itself and
/// refuses moves the soldier could not have made. A soldier that went
/// unheard for `missed` rounds may have moved in each of them.
fn judge(
    record: &mut SoldierRecord,
    missed: &mut u32,
    missile: &Missile,
    board_size: u8,
    reply: Option<RoundStatus>,
) -> Verdict {
    match reply {
        None => {
            *missed = missed.saturating_add(1);
            log::warn!(
                "soldier {} did not report; keeping last known position {}",
                record.id,
                record.position
            );
            Verdict::Silent
        }
        Some(RoundStatus::Hit) => {
            *missed = 0;
            record.alive = false;
            Verdict::Hit
        }
        Some(RoundStatus::Alive { position }) => {
            let reach = (record.speed as u32).saturating_mul(missed.saturating_add(1));
            let legal = in_bounds(position, board_size)
                && record.position.chebyshev(&position) as u32 <= reach;
            if legal {
                record.position = position;
                *missed = 0;
            } else {
                log::warn!(
                    "soldier {} claimed impossible move {} -> {} (reach {})",
                    record.id,
                    record.position,
                    position,
                    reach
                );
            }
            if missile.strikes(record.position) {
                record.alive = false;
                Verdict::Hit
            } else {
                Verdict::Survived(record.position)
            }
        }
    }
}
