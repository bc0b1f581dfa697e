#![cfg(feature = "std")]

use crate::config::SoldierId;
use crate::domain::*;
use crate::missile::Missile;

/// Wire protocol version exchanged in the `Hello` handshake.
pub const PROTOCOL_VERSION: u16 = 1;

/// Messages exchanged between the commander and a soldier.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    /// Opening handshake, echoed back by the soldier.
    Hello { version: u16 },
    /// Assign an id and ask for a start position.
    Startup { seq: u64, soldier_id: SoldierId, board_size: u8 },
    StartupResp { seq: u64, report: StartupReport },
    /// Broadcast of this round's missile.
    MissileApproaching { seq: u64, missile: Missile },
    RoundStatusReq { seq: u64, soldier_id: SoldierId },
    RoundStatusResp { seq: u64, status: RoundStatus },
    /// Hand command to the receiving soldier.
    TransferCommand { seq: u64, state: HandoffState },
    GameOver { seq: u64, result: GameResult },
    /// Generic acknowledgement.
    Ack { seq: u64 },
    /// The request reached the soldier but could not be served.
    Rejected { seq: u64, reason: String },
}

impl Message {
    /// Sequence number of a request or reply; `None` for the handshake.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Message::Hello { .. } => None,
            Message::Startup { seq, .. }
            | Message::StartupResp { seq, .. }
            | Message::MissileApproaching { seq, .. }
            | Message::RoundStatusReq { seq, .. }
            | Message::RoundStatusResp { seq, .. }
            | Message::TransferCommand { seq, .. }
            | Message::GameOver { seq, .. }
            | Message::Ack { seq }
            | Message::Rejected { seq, .. } => Some(*seq),
        }
    }
}

/// Operations a commander invokes on a soldier, local or remote.
#[async_trait::async_trait]
pub trait SoldierApi: Send + Sync {
    /// Assign `soldier_id` and report the soldier's start position and speed.
    async fn startup(&mut self, soldier_id: SoldierId, board_size: u8) -> anyhow::Result<StartupReport>;
    async fn missile_approaching(&mut self, missile: Missile) -> anyhow::Result<()>;
    async fn round_status(&mut self, soldier_id: SoldierId) -> anyhow::Result<RoundStatus>;
    async fn transfer_command(&mut self, state: HandoffState) -> anyhow::Result<()>;
    async fn game_over(&mut self, result: GameResult) -> anyhow::Result<()>;
}

/// Opens a link to a soldier given its roster address.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, soldier_id: SoldierId, address: &str) -> anyhow::Result<Box<dyn SoldierApi>>;
}
