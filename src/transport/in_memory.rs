use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::task::yield_now;

use crate::config::SoldierId;
use crate::protocol::{Connector, Message, SoldierApi};
use crate::skeleton::Skeleton;
use crate::soldier_node::SoldierNode;
use crate::stub::Stub;
use crate::transport::Transport;

pub struct InMemoryTransport {
    recv_queue: Arc<Mutex<VecDeque<Message>>>,
    send_queue: Arc<Mutex<VecDeque<Message>>>,
}

impl InMemoryTransport {
    pub fn pair() -> (Self, Self) {
        let q1 = Arc::new(Mutex::new(VecDeque::new()));
        let q2 = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                recv_queue: q1.clone(),
                send_queue: q2.clone(),
            },
            Self {
                recv_queue: q2,
                send_queue: q1,
            },
        )
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        if Arc::strong_count(&self.send_queue) == 1 {
            return Err(anyhow::anyhow!("Channel closed"));
        }
        let mut queue = self
            .send_queue
            .lock()
            .map_err(|_| anyhow::anyhow!("Channel poisoned"))?;
        queue.push_back(msg);
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            let next = {
                let mut queue = self
                    .recv_queue
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Channel poisoned"))?;
                queue.pop_front()
            };
            if let Some(msg) = next {
                return Ok(msg);
            }
            if Arc::strong_count(&self.recv_queue) == 1 {
                return Err(anyhow::anyhow!("Channel closed"));
            }
            yield_now().await;
        }
    }
}

/// In-process stand-in for the network: soldier nodes are stationed under
/// an address and every connection gets its own skeleton task.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    garrison: Arc<Mutex<BTreeMap<String, SoldierNode>>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node` reachable under `address`.
    pub fn station(&self, address: impl Into<String>, node: SoldierNode) -> anyhow::Result<()> {
        self.garrison
            .lock()
            .map_err(|_| anyhow::anyhow!("garrison poisoned"))?
            .insert(address.into(), node);
        Ok(())
    }

    /// Take the node at `address` off the network.
    pub fn withdraw(&self, address: &str) -> anyhow::Result<Option<SoldierNode>> {
        Ok(self
            .garrison
            .lock()
            .map_err(|_| anyhow::anyhow!("garrison poisoned"))?
            .remove(address))
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, soldier_id: SoldierId, address: &str) -> anyhow::Result<Box<dyn SoldierApi>> {
        let node = self
            .garrison
            .lock()
            .map_err(|_| anyhow::anyhow!("garrison poisoned"))?
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no soldier {} stationed at {}", soldier_id, address))?;
        let (server, client) = InMemoryTransport::pair();
        tokio::spawn(async move {
            let mut skeleton = Skeleton::new(node, server);
            if let Err(e) = skeleton.run().await {
                log::debug!("in-memory link closed: {}", e);
            }
        });
        Ok(Box::new(Stub::new(client)))
    }
}
