#![cfg(feature = "std")]

use crate::config::SoldierId;
use crate::domain::{GameResult, HandoffState, RoundStatus, StartupReport};
use crate::missile::Missile;
use crate::protocol::{Message, SoldierApi, PROTOCOL_VERSION};
use crate::transport::Transport;

/// Client side of a soldier link: turns `SoldierApi` calls into messages.
pub struct Stub<T: Transport> {
    transport: T,
    next_seq: u64,
    handshaken: bool,
}

impl<T: Transport> Stub<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_seq: 0,
            handshaken: false,
        }
    }

    async fn ensure_handshake(&mut self) -> anyhow::Result<()> {
        if self.handshaken {
            return Ok(());
        }
        self.transport
            .send(Message::Hello {
                version: PROTOCOL_VERSION,
            })
            .await?;
        match self.transport.recv().await? {
            Message::Hello { version } if version == PROTOCOL_VERSION => {
                self.handshaken = true;
                Ok(())
            }
            Message::Hello { version } => Err(anyhow::anyhow!(
                "Protocol version mismatch in Hello: expected {}, got {}",
                PROTOCOL_VERSION,
                version
            )),
            other => Err(anyhow::anyhow!("Expected Hello, got {:?}", other)),
        }
    }

    /// Send one request and wait for the reply carrying the same sequence
    /// number. Replies to earlier, abandoned requests are dropped.
    async fn request(&mut self, build: impl FnOnce(u64) -> Message + Send) -> anyhow::Result<Message> {
        self.ensure_handshake().await?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.transport.send(build(seq)).await?;
        loop {
            let reply = self.transport.recv().await?;
            match reply.seq() {
                Some(s) if s == seq => {
                    return match reply {
                        Message::Rejected { reason, .. } => {
                            Err(anyhow::anyhow!("Request rejected: {}", reason))
                        }
                        other => Ok(other),
                    };
                }
                Some(s) if s < seq => {
                    log::debug!("discarding stale reply seq {} (waiting for {})", s, seq);
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Sequence mismatch: expected {}, got {:?}",
                        seq,
                        reply
                    ))
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<T: Transport> SoldierApi for Stub<T> {
    async fn startup(&mut self, soldier_id: SoldierId, board_size: u8) -> anyhow::Result<StartupReport> {
        let reply = self
            .request(|seq| Message::Startup {
                seq,
                soldier_id,
                board_size,
            })
            .await?;
        match reply {
            Message::StartupResp { report, .. } => Ok(report),
            other => Err(anyhow::anyhow!("Unexpected message: {:?}", other)),
        }
    }

    async fn missile_approaching(&mut self, missile: Missile) -> anyhow::Result<()> {
        match self
            .request(|seq| Message::MissileApproaching { seq, missile })
            .await?
        {
            Message::Ack { .. } => Ok(()),
            other => Err(anyhow::anyhow!("Unexpected message: {:?}", other)),
        }
    }

    async fn round_status(&mut self, soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        match self
            .request(|seq| Message::RoundStatusReq { seq, soldier_id })
            .await?
        {
            Message::RoundStatusResp { status, .. } => Ok(status),
            other => Err(anyhow::anyhow!("Unexpected message: {:?}", other)),
        }
    }

    async fn transfer_command(&mut self, state: HandoffState) -> anyhow::Result<()> {
        match self
            .request(|seq| Message::TransferCommand { seq, state })
            .await?
        {
            Message::Ack { .. } => Ok(()),
            other => Err(anyhow::anyhow!("Unexpected message: {:?}", other)),
        }
    }

    async fn game_over(&mut self, result: GameResult) -> anyhow::Result<()> {
        match self.request(|seq| Message::GameOver { seq, result }).await? {
            Message::Ack { .. } => Ok(()),
            other => Err(anyhow::anyhow!("Unexpected message: {:?}", other)),
        }
    }
}
