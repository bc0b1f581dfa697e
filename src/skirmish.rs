#![cfg(feature = "std")]

//! A whole game inside one process: every soldier is a node behind the
//! in-memory connector, each following orders on its own task.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::time::Duration;

use crate::{
    commander::{Commander, Outcome},
    config::{GameSettings, SoldierId, COMMANDER_ID},
    domain::GameResult,
    protocol::Connector,
    soldier_node::{follow_orders, Duty, SoldierNode},
    transport::in_memory::InMemoryConnector,
};

/// What happened in a local game.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkirmishReport {
    pub result: GameResult,
    /// Commanders in the order they held command.
    pub chain_of_command: Vec<SoldierId>,
}

/// Play a game with every soldier in-process. `pacing` is the real delay
/// between rounds.
pub async fn run_skirmish(settings: GameSettings, seed: u64, pacing: Duration) -> anyhow::Result<SkirmishReport> {
    settings.validate().map_err(|e| anyhow::anyhow!(e))?;
    let connector = InMemoryConnector::new();
    let mut inventory = Vec::with_capacity(settings.soldier_count - 1);
    let mut tasks = Vec::with_capacity(settings.soldier_count - 1);

    for i in 1..settings.soldier_count {
        let address = format!("mem://soldier-{}", i);
        let (node, mut events) = SoldierNode::new(SmallRng::seed_from_u64(seed.wrapping_add(i as u64)));
        connector.station(address.clone(), node.clone())?;
        inventory.push(address);

        let orders: Arc<dyn Connector> = Arc::new(connector.clone());
        let mut rng = SmallRng::seed_from_u64(seed.wrapping_mul(31).wrapping_add(i as u64));
        let task = tokio::spawn(async move {
            follow_orders(&node, &mut events, orders, &mut rng).await
        });
        tasks.push((i as SoldierId, task));
    }

    let (me, _events) = SoldierNode::new(SmallRng::seed_from_u64(seed));
    // Reachable by successors for the game-over notice.
    connector.station("mem://commander", me.clone())?;
    let mut commander = Commander::muster(
        settings,
        me,
        "mem://commander".to_string(),
        inventory,
        Arc::new(connector.clone()),
        SmallRng::seed_from_u64(seed.wrapping_add(0x5eed)),
    )
    .await?
    .with_pacing(pacing);

    let (mut result, mut next) = match commander.run().await? {
        Outcome::Finished(result) => (Some(result), None),
        Outcome::HandedOff { successor } => (None, Some(successor)),
    };
    drop(commander);

    let mut relieved_by = BTreeMap::new();
    for (id, task) in tasks {
        match task.await?? {
            Duty::Ended(r) => {
                result.get_or_insert(r);
            }
            Duty::Relieved { successor } => {
                relieved_by.insert(id, successor);
            }
        }
    }
    let mut chain_of_command = vec![COMMANDER_ID];
    while let Some(id) = next {
        chain_of_command.push(id);
        next = relieved_by.remove(&id);
    }
    let result = result.ok_or_else(|| anyhow::anyhow!("game ended without a result"))?;
    Ok(SkirmishReport {
        result,
        chain_of_command,
    })
}
