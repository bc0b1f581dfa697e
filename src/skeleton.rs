#![cfg(feature = "std")]

use crate::{protocol::Message, protocol::SoldierApi, protocol::PROTOCOL_VERSION, transport::Transport};
use anyhow::anyhow;

/// Server side of a soldier link: decodes requests and dispatches them to
/// the local soldier.
pub struct Skeleton<E: SoldierApi, T: Transport> {
    engine: E,
    transport: T,
}

impl<E: SoldierApi, T: Transport> Skeleton<E, T> {
    pub fn new(engine: E, transport: T) -> Self {
        Self { engine, transport }
    }

    /// Serve until the peer hangs up.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        match self.transport.recv().await? {
            Message::Hello { version } if version == PROTOCOL_VERSION => {
                self.transport.send(Message::Hello { version }).await?;
            }
            Message::Hello { version } => {
                // Echo our own version so the caller can report the mismatch.
                self.transport
                    .send(Message::Hello {
                        version: PROTOCOL_VERSION,
                    })
                    .await?;
                return Err(anyhow!(
                    "Protocol version mismatch in Hello: expected {}, got {}",
                    PROTOCOL_VERSION,
                    version
                ));
            }
            _ => return Err(anyhow!("Expected handshake")),
        }

        while let Ok(msg) = self.transport.recv().await {
            let reply = match msg {
                Message::Startup {
                    seq,
                    soldier_id,
                    board_size,
                } => match self.engine.startup(soldier_id, board_size).await {
                    Ok(report) => Message::StartupResp { seq, report },
                    Err(e) => rejected(seq, e),
                },
                Message::MissileApproaching { seq, missile } => {
                    match self.engine.missile_approaching(missile).await {
                        Ok(()) => Message::Ack { seq },
                        Err(e) => rejected(seq, e),
                    }
                }
                Message::RoundStatusReq { seq, soldier_id } => {
                    match self.engine.round_status(soldier_id).await {
                        Ok(status) => Message::RoundStatusResp { seq, status },
                        Err(e) => rejected(seq, e),
                    }
                }
                Message::TransferCommand { seq, state } => {
                    match self.engine.transfer_command(state).await {
                        Ok(()) => Message::Ack { seq },
                        Err(e) => rejected(seq, e),
                    }
                }
                Message::GameOver { seq, result } => match self.engine.game_over(result).await {
                    Ok(()) => Message::Ack { seq },
                    Err(e) => rejected(seq, e),
                },
                Message::Hello { version } => Message::Hello { version },
                other => {
                    log::debug!("ignoring unsolicited message {:?}", other);
                    continue;
                }
            };
            self.transport.send(reply).await?;
        }
        Ok(())
    }
}

fn rejected(seq: u64, err: anyhow::Error) -> Message {
    log::warn!("request {} rejected: {}", seq, err);
    Message::Rejected {
        seq,
        reason: err.to_string(),
    }
}
