#![cfg(feature = "std")]

//! The coordinator capability: whichever soldier holds it drives rounds,
//! scores them and hands command on when it is hit.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use rand::rngs::SmallRng;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Duration};

use crate::{
    config::{GameSettings, SoldierId, COMMANDER_ID},
    domain::{GameResult, HandoffState, RoundStatus, SoldierRecord},
    game::{GameEngine, GameStatus, RoundSummary},
    missile::Missile,
    protocol::{Connector, SoldierApi},
    soldier_node::SoldierNode,
    ui::render_battlefield,
};

/// Default wait for a single soldier reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a soldier call produced no answer.
#[derive(Debug)]
enum CallError {
    /// The soldier or the link refused; the link is not trusted any more.
    Failed,
    /// No answer in time. The request may still have been carried out.
    TimedOut,
}

/// One request fanned out to many soldiers in a round.
#[derive(Debug, Clone, Copy)]
enum Order {
    Warn(Missile),
    Report,
}

#[derive(Debug)]
enum Answer {
    Warned,
    Status(RoundStatus),
}

/// How a commander's tenure ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished(GameResult),
    HandedOff { successor: SoldierId },
}

pub struct Commander {
    engine: GameEngine,
    me: SoldierNode,
    peers: BTreeMap<SoldierId, Box<dyn SoldierApi>>,
    connector: Arc<dyn Connector>,
    rng: SmallRng,
    reply_timeout: Duration,
    pacing: Duration,
    scripted: VecDeque<Missile>,
}

impl Commander {
    /// Open a new game: enlist every soldier in `inventory` (ids 1..M-1 in
    /// order), then place the commander on a cell no soldier starts on.
    pub async fn muster(
        settings: GameSettings,
        me: SoldierNode,
        address: String,
        inventory: Vec<String>,
        connector: Arc<dyn Connector>,
        mut rng: SmallRng,
    ) -> anyhow::Result<Self> {
        settings.validate().map_err(|e| anyhow::anyhow!(e))?;
        if inventory.len() + 1 != settings.soldier_count {
            return Err(anyhow::anyhow!(crate::common::ConfigError::SoldierCountMismatch {
                expected: settings.soldier_count - 1,
                found: inventory.len(),
            }));
        }
        let mut engine = GameEngine::new(settings, COMMANDER_ID).map_err(|e| anyhow::anyhow!(e))?;
        let mut peers: BTreeMap<SoldierId, Box<dyn SoldierApi>> = BTreeMap::new();

        for (i, addr) in inventory.into_iter().enumerate() {
            let id = i as SoldierId + 1;
            let mut link = connector.connect(id, &addr).await?;
            let report = timeout(DEFAULT_REPLY_TIMEOUT, link.startup(id, settings.board_size))
                .await
                .map_err(|_| anyhow::anyhow!("soldier {} at {} did not report for duty", id, addr))??;
            if report.soldier_id != id {
                return Err(anyhow::anyhow!(
                    "soldier at {} answered as {} instead of {}",
                    addr,
                    report.soldier_id,
                    id
                ));
            }
            engine
                .enlist(SoldierRecord {
                    id,
                    address: addr,
                    position: report.position,
                    speed: report.speed,
                    alive: true,
                })
                .map_err(|e| anyhow::anyhow!(e))?;
            peers.insert(id, link);
        }

        let cell = engine.place_commander(&mut rng).map_err(|e| anyhow::anyhow!(e))?;
        let report = me.take_post(COMMANDER_ID, settings.board_size, cell)?;
        engine
            .enlist(SoldierRecord {
                id: COMMANDER_ID,
                address,
                position: report.position,
                speed: report.speed,
                alive: true,
            })
            .map_err(|e| anyhow::anyhow!(e))?;
        engine.muster_complete().map_err(|e| anyhow::anyhow!(e))?;
        log::info!(
            "{} soldiers mustered on a {}x{} board, {} rounds planned",
            settings.soldier_count,
            settings.board_size,
            settings.board_size,
            settings.planned_rounds()
        );

        Ok(Self::assemble(engine, me, peers, connector, rng))
    }

    /// Take over a running game from the package the previous commander sent.
    /// Elapsed time carries on from the package.
    pub async fn resume(
        state: HandoffState,
        me: SoldierNode,
        connector: Arc<dyn Connector>,
        rng: SmallRng,
    ) -> anyhow::Result<Self> {
        let id = me
            .id()
            .ok_or_else(|| anyhow::anyhow!("cannot take command before startup"))?;
        let engine = GameEngine::from_handoff(state, id).map_err(|e| anyhow::anyhow!(e))?;
        log::info!(
            "soldier {} takes command at {}s ({}s remaining, {} alive)",
            id,
            engine.elapsed(),
            engine.remaining(),
            engine.alive_count()
        );

        let mut peers: BTreeMap<SoldierId, Box<dyn SoldierApi>> = BTreeMap::new();
        let roster: Vec<(SoldierId, String)> = engine
            .roster()
            .filter(|r| r.alive && r.id != id)
            .map(|r| (r.id, r.address.clone()))
            .collect();
        for (peer, addr) in roster {
            match connector.connect(peer, &addr).await {
                Ok(link) => {
                    peers.insert(peer, link);
                }
                Err(e) => log::warn!("soldier {} unreachable after handoff: {}", peer, e),
            }
        }
        Ok(Self::assemble(engine, me, peers, connector, rng))
    }

    fn assemble(
        engine: GameEngine,
        me: SoldierNode,
        peers: BTreeMap<SoldierId, Box<dyn SoldierApi>>,
        connector: Arc<dyn Connector>,
        rng: SmallRng,
    ) -> Self {
        let pacing = Duration::from_secs(engine.settings().missile_interval as u64);
        Self {
            engine,
            me,
            peers,
            connector,
            rng,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            pacing,
            scripted: VecDeque::new(),
        }
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Real time to wait between rounds. Game time advances by the missile
    /// interval per round regardless.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Fire these missiles first, in order, before random ones.
    pub fn with_scripted_missiles(mut self, missiles: impl IntoIterator<Item = Missile>) -> Self {
        self.scripted.extend(missiles);
        self
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn id(&self) -> SoldierId {
        self.engine.commander()
    }

    fn next_missile(&mut self) -> Missile {
        self.scripted
            .pop_front()
            .unwrap_or_else(|| Missile::generate(&mut self.rng, self.engine.settings().board_size))
    }

    /// Play one round: warn, let everyone take shelter, collect and score.
    pub async fn run_round(&mut self) -> anyhow::Result<RoundSummary> {
        let missile = self.next_missile();
        let me = self.id();
        log::info!("round {}: incoming {}", self.engine.rounds() + 1, missile);

        let targets: Vec<SoldierId> = self
            .engine
            .alive_ids()
            .into_iter()
            .filter(|id| *id != me)
            .collect();
        self.redial(&targets).await;

        let warned = self.fan_out(&targets, Order::Warn(missile)).await;
        self.me.missile_approaching(missile).await?;

        let listening: Vec<SoldierId> = targets
            .iter()
            .copied()
            .filter(|id| matches!(warned.get(id), Some(Ok(_))))
            .collect();
        let mut statuses = self.fan_out(&listening, Order::Report).await;

        let mut replies = Vec::with_capacity(targets.len() + 1);
        for id in &targets {
            let status = match statuses.remove(id) {
                Some(Ok(Answer::Status(status))) => Some(status),
                _ => None,
            };
            replies.push((*id, status));
        }
        if self.engine.commander_alive() {
            let own = self.me.round_status(me).await?;
            replies.push((me, Some(own)));
        }

        let summary = self
            .engine
            .score_round(&missile, replies)
            .map_err(|e| anyhow::anyhow!(e))?;
        log::info!(
            "round {} scored: {} alive, {} hit, {}s of {}s",
            summary.round,
            summary.alive,
            summary.hit,
            summary.elapsed,
            self.engine.settings().game_duration
        );
        log::debug!("\n{}", render_battlefield(&self.engine, Some(&missile)));
        Ok(summary)
    }

    /// Send `order` to every soldier in `ids` at once and wait for all of
    /// them, each bounded by the reply timeout. Links that fail are dropped
    /// and dialled again next round.
    async fn fan_out(
        &mut self,
        ids: &[SoldierId],
        order: Order,
    ) -> BTreeMap<SoldierId, Result<Answer, CallError>> {
        let mut answers = BTreeMap::new();
        let mut calls = JoinSet::new();
        for id in ids {
            let Some(mut peer) = self.peers.remove(id) else {
                answers.insert(*id, Err(CallError::Failed));
                continue;
            };
            let id = *id;
            let limit = self.reply_timeout;
            calls.spawn(async move {
                let answer = match order {
                    Order::Warn(missile) => {
                        call(limit, id, peer.missile_approaching(missile))
                            .await
                            .map(|()| Answer::Warned)
                    }
                    Order::Report => call(limit, id, peer.round_status(id))
                        .await
                        .map(Answer::Status),
                };
                (id, peer, answer)
            });
        }
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((id, peer, answer)) => {
                    if !matches!(answer, Err(CallError::Failed)) {
                        self.peers.insert(id, peer);
                    }
                    answers.insert(id, answer);
                }
                Err(e) => log::warn!("soldier call aborted: {}", e),
            }
        }
        answers
    }

    /// Open a link to every soldier in `ids` that has none.
    async fn redial(&mut self, ids: &[SoldierId]) {
        for id in ids {
            if !self.peers.contains_key(id) {
                self.dial(*id).await;
            }
        }
    }

    /// Connect to anyone who served under this commander.
    async fn dial(&mut self, id: SoldierId) -> bool {
        let Some(address) = self
            .engine
            .notice_list()
            .into_iter()
            .find(|f| f.id == id)
            .map(|f| f.address)
        else {
            return false;
        };
        match timeout(self.reply_timeout, self.connector.connect(id, &address)).await {
            Ok(Ok(link)) => {
                log::debug!("link to soldier {} at {} open", id, address);
                self.peers.insert(id, link);
                true
            }
            Ok(Err(e)) => {
                log::warn!("cannot reach soldier {} at {}: {}", id, address, e);
                false
            }
            Err(_) => {
                log::warn!("dialling soldier {} at {} timed out", id, address);
                false
            }
        }
    }

    /// Play rounds until the game ends or this commander is hit.
    pub async fn run(&mut self) -> anyhow::Result<Outcome> {
        if let Some(result) = self.engine.status().result() {
            return self.conclude(result).await;
        }
        loop {
            let summary = self.run_round().await?;
            if let Some(result) = summary.status.result() {
                return self.conclude(result).await;
            }
            if !self.engine.commander_alive() {
                return self.relinquish().await;
            }
            if !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }
        }
    }

    /// Pass command to a random surviving soldier. A refusal moves on to the
    /// next candidate and an unanswered offer counts as accepted. With
    /// nobody left the game is lost.
    async fn relinquish(&mut self) -> anyhow::Result<Outcome> {
        let candidates = self.engine.successor_candidates(&mut self.rng);
        log::info!(
            "commander {} is hit, {} candidates for command",
            self.id(),
            candidates.len()
        );
        for successor in candidates {
            let state = self.engine.handoff(successor).map_err(|e| anyhow::anyhow!(e))?;
            if !self.peers.contains_key(&successor) && !self.dial(successor).await {
                continue;
            }
            let Some(peer) = self.peers.get_mut(&successor) else {
                continue;
            };
            match call(self.reply_timeout, successor, peer.transfer_command(state)).await {
                Ok(()) => {
                    log::info!("command passed to soldier {}", successor);
                    return Ok(Outcome::HandedOff { successor });
                }
                Err(CallError::TimedOut) => {
                    log::warn!(
                        "soldier {} did not confirm command in time, assuming it took over",
                        successor
                    );
                    return Ok(Outcome::HandedOff { successor });
                }
                Err(CallError::Failed) => {
                    self.peers.remove(&successor);
                }
            }
        }
        log::warn!("no soldier left to take command");
        self.engine.concede();
        self.conclude(GameResult::Loss).await
    }

    /// Announce the result to every soldier that ever served, best effort.
    async fn conclude(&mut self, result: GameResult) -> anyhow::Result<Outcome> {
        log::info!(
            "game over after {} rounds: {:?} ({} of {} hit)",
            self.engine.rounds(),
            result,
            self.engine.hit_count(),
            self.engine.settings().soldier_count
        );
        for entry in self.engine.notice_list() {
            if !self.peers.contains_key(&entry.id) && !self.dial(entry.id).await {
                continue;
            }
            if let Some(peer) = self.peers.get_mut(&entry.id) {
                let _ = call(self.reply_timeout, entry.id, peer.game_over(result)).await;
            }
        }
        Ok(Outcome::Finished(result))
    }

    pub fn status(&self) -> GameStatus {
        self.engine.status()
    }
}

/// Await a soldier call under `limit`, logging what went wrong.
async fn call<T>(
    limit: Duration,
    soldier: SoldierId,
    request: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, CallError> {
    match timeout(limit, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            log::warn!("soldier {} failed to respond: {}", soldier, e);
            Err(CallError::Failed)
        }
        Err(_) => {
            log::warn!("soldier {} timed out after {:?}", soldier, limit);
            Err(CallError::TimedOut)
        }
    }
}
