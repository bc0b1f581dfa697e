#![cfg(feature = "std")]

use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    board::Position,
    commander::{Commander, Outcome},
    config::{check_speed, SoldierId, MAX_SPEED, MIN_BOARD_SIZE},
    domain::{GameResult, HandoffState, RoundStatus, StartupReport},
    missile::Missile,
    protocol::{Connector, SoldierApi},
    soldier::{Soldier, SoldierState},
};

/// Things a soldier process has to act on outside the request/response flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// This soldier was hit.
    Fallen,
    /// Command was handed to this soldier.
    Promoted(HandoffState),
    GameOver(GameResult),
}

/// How a soldier's service ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duty {
    Ended(GameResult),
    /// Took command, was hit and passed it on.
    Relieved { successor: SoldierId },
}

struct Post {
    soldier: Option<Soldier>,
    incoming: Option<Missile>,
    speed: u8,
    rng: SmallRng,
}

/// One soldier's local service. Cheap to clone; clones share the soldier.
#[derive(Clone)]
pub struct SoldierNode {
    post: Arc<Mutex<Post>>,
    events: UnboundedSender<NodeEvent>,
}

impl SoldierNode {
    /// New recruit with a random speed in `0..=MAX_SPEED`.
    pub fn new(mut rng: SmallRng) -> (Self, UnboundedReceiver<NodeEvent>) {
        let speed = rng.random_range(0..=MAX_SPEED);
        Self::build(rng, speed)
    }

    /// New recruit with a fixed speed.
    pub fn with_speed(rng: SmallRng, speed: u8) -> anyhow::Result<(Self, UnboundedReceiver<NodeEvent>)> {
        check_speed(speed).map_err(|e| anyhow::anyhow!(e))?;
        Ok(Self::build(rng, speed))
    }

    fn build(rng: SmallRng, speed: u8) -> (Self, UnboundedReceiver<NodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let node = Self {
            post: Arc::new(Mutex::new(Post {
                soldier: None,
                incoming: None,
                speed,
                rng,
            })),
            events: tx,
        };
        (node, rx)
    }

    fn post(&self) -> anyhow::Result<MutexGuard<'_, Post>> {
        self.post
            .lock()
            .map_err(|_| anyhow::anyhow!("soldier state poisoned"))
    }

    /// Id assigned at startup, if any.
    pub fn id(&self) -> Option<SoldierId> {
        self.post().ok()?.soldier.as_ref().map(Soldier::id)
    }

    /// Snapshot of the soldier.
    pub fn soldier(&self) -> Option<Soldier> {
        self.post().ok()?.soldier.clone()
    }

    pub fn speed(&self) -> anyhow::Result<u8> {
        Ok(self.post()?.speed)
    }

    /// Enlist at a cell chosen by the caller. Used for the commander's own
    /// placement, which has to avoid every soldier's start cell.
    pub fn take_post(&self, soldier_id: SoldierId, board_size: u8, position: Position) -> anyhow::Result<StartupReport> {
        let mut post = self.post()?;
        if let Some(existing) = &post.soldier {
            return Err(anyhow::anyhow!("already enlisted as soldier {}", existing.id()));
        }
        let soldier = Soldier::new(soldier_id, position, post.speed, board_size)
            .map_err(|e| anyhow::anyhow!(e))?;
        let report = StartupReport {
            soldier_id,
            position: soldier.position(),
            speed: soldier.speed(),
        };
        post.soldier = Some(soldier);
        log::info!("soldier {} reporting at {} (speed {})", soldier_id, position, report.speed);
        Ok(report)
    }

    fn notify(&self, event: NodeEvent) -> anyhow::Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow::anyhow!("soldier is no longer listening for orders"))
    }
}

#[async_trait::async_trait]
impl SoldierApi for SoldierNode {
    async fn startup(&mut self, soldier_id: SoldierId, board_size: u8) -> anyhow::Result<StartupReport> {
        if board_size < MIN_BOARD_SIZE {
            return Err(anyhow::anyhow!(
                "board size {} is below the minimum of {}",
                board_size,
                MIN_BOARD_SIZE
            ));
        }
        let position = {
            let mut post = self.post()?;
            Position::new(
                post.rng.random_range(0..board_size),
                post.rng.random_range(0..board_size),
            )
        };
        self.take_post(soldier_id, board_size, position)
    }

    async fn missile_approaching(&mut self, missile: Missile) -> anyhow::Result<()> {
        let mut post = self.post()?;
        post.incoming = Some(missile);
        let soldier = post
            .soldier
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("missile warning before startup"))?;
        soldier.take_shelter(&missile);
        Ok(())
    }

    async fn round_status(&mut self, soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        let (status, fell) = {
            let mut guard = self.post()?;
            let post = &mut *guard;
            let soldier = post
                .soldier
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("status request before startup"))?;
            if soldier.id() != soldier_id {
                return Err(anyhow::anyhow!(
                    "status for soldier {} sent to soldier {}",
                    soldier_id,
                    soldier.id()
                ));
            }
            let was_alive = soldier.is_alive();
            let state = match post.incoming.take() {
                Some(missile) => soldier.assess(&missile),
                None => soldier.state(),
            };
            match state {
                SoldierState::Hit => (RoundStatus::Hit, was_alive),
                SoldierState::Alive => (
                    RoundStatus::Alive {
                        position: soldier.position(),
                    },
                    false,
                ),
            }
        };
        if fell {
            log::info!("soldier {} is hit", soldier_id);
            // The report must still reach the commander even if nobody listens.
            let _ = self.notify(NodeEvent::Fallen);
        }
        Ok(status)
    }

    async fn transfer_command(&mut self, state: HandoffState) -> anyhow::Result<()> {
        {
            let post = self.post()?;
            match &post.soldier {
                Some(s) if s.is_alive() => {}
                Some(s) => return Err(anyhow::anyhow!("soldier {} is hit and cannot command", s.id())),
                None => return Err(anyhow::anyhow!("command offered before startup")),
            }
        }
        self.notify(NodeEvent::Promoted(state))
    }

    async fn game_over(&mut self, result: GameResult) -> anyhow::Result<()> {
        log::info!("game over: {:?}", result);
        let _ = self.notify(NodeEvent::GameOver(result));
        Ok(())
    }
}

/// Drive a soldier process until the game ends for it: wait for orders,
/// take command when promoted.
pub async fn follow_orders(
    node: &SoldierNode,
    events: &mut UnboundedReceiver<NodeEvent>,
    connector: Arc<dyn Connector>,
    rng: &mut SmallRng,
) -> anyhow::Result<Duty> {
    while let Some(event) = events.recv().await {
        match event {
            NodeEvent::Fallen => log::info!("out of action, waiting for the end of the game"),
            NodeEvent::GameOver(result) => return Ok(Duty::Ended(result)),
            NodeEvent::Promoted(state) => {
                let command_rng = SmallRng::seed_from_u64(rng.random());
                let mut commander =
                    Commander::resume(state, node.clone(), connector.clone(), command_rng).await?;
                return match commander.run().await? {
                    Outcome::Finished(result) => Ok(Duty::Ended(result)),
                    Outcome::HandedOff { successor } => Ok(Duty::Relieved { successor }),
                };
            }
        }
    }
    Err(anyhow::anyhow!("order channel closed before the game ended"))
}
