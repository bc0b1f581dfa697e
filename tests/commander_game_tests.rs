use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{rngs::SmallRng, SeedableRng};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};
use warzone::{
    run_skirmish, Commander, Connector, GameEngine, GameResult, GameSettings, GameStatus,
    HandoffState, InMemoryConnector, Missile, MissileType, NodeEvent, Outcome, Position,
    RoundStatus, SoldierApi, SoldierId, SoldierNode, StartupReport, Verdict, COMMANDER_ID,
};

/// Soldiers stationed on an in-memory network, events kept by the test.
fn garrison(
    connector: &InMemoryConnector,
    count: usize,
    speed: u8,
) -> (Vec<String>, Vec<(SoldierNode, UnboundedReceiver<NodeEvent>)>) {
    let mut inventory = Vec::new();
    let mut nodes = Vec::new();
    for i in 1..=count {
        let address = format!("mem://soldier-{}", i);
        let (node, events) = SoldierNode::with_speed(SmallRng::seed_from_u64(100 + i as u64), speed).unwrap();
        connector.station(address.clone(), node.clone()).unwrap();
        inventory.push(address);
        nodes.push((node, events));
    }
    (inventory, nodes)
}

/// A cell no living soldier stands on.
fn empty_cell(engine: &GameEngine) -> Position {
    let taken: BTreeSet<Position> = engine.roster().filter(|r| r.alive).map(|r| r.position).collect();
    (0..engine.settings().board_size)
        .flat_map(|y| (0..engine.settings().board_size).map(move |x| Position::new(x, y)))
        .find(|p| !taken.contains(p))
        .unwrap()
}

async fn next_game_over(events: &mut UnboundedReceiver<NodeEvent>) -> GameResult {
    loop {
        match events.recv().await.unwrap() {
            NodeEvent::GameOver(result) => return result,
            NodeEvent::Fallen => continue,
            NodeEvent::Promoted(_) => panic!("unexpected promotion"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn skirmish_runs_to_a_result() -> anyhow::Result<()> {
    for seed in [1, 2, 3, 42, 1234] {
        let report = run_skirmish(GameSettings::new(8, 6, 3, 15), seed, Duration::ZERO).await?;
        assert_eq!(report.chain_of_command[0], COMMANDER_ID);
        let distinct: BTreeSet<_> = report.chain_of_command.iter().collect();
        assert_eq!(distinct.len(), report.chain_of_command.len());
        assert!(matches!(report.result, GameResult::Win | GameResult::Loss));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn skirmish_is_reproducible() -> anyhow::Result<()> {
    let settings = GameSettings::new(10, 8, 2, 20);
    let first = run_skirmish(settings, 77, Duration::ZERO).await?;
    let second = run_skirmish(settings, 77, Duration::ZERO).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn skirmish_rejects_bad_settings() {
    assert!(run_skirmish(GameSettings::new(6, 4, 3, 15), 1, Duration::ZERO).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn quiet_game_is_won() -> anyhow::Result<()> {
    let connector = InMemoryConnector::new();
    let (inventory, mut nodes) = garrison(&connector, 5, 1);
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(1), 1)?;
    let commander = Commander::muster(
        GameSettings::new(8, 6, 3, 15),
        me,
        "mem://commander".to_string(),
        inventory,
        Arc::new(connector.clone()),
        SmallRng::seed_from_u64(2),
    )
    .await?;
    let cell = empty_cell(commander.engine());
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_scripted_missiles(vec![Missile::new(cell, MissileType::M1); 5]);

    assert_eq!(commander.run().await?, Outcome::Finished(GameResult::Win));
    assert_eq!(commander.engine().rounds(), 5);
    assert_eq!(commander.engine().elapsed(), 15);
    assert_eq!(commander.engine().alive_count(), 6);
    for (_, events) in nodes.iter_mut() {
        assert_eq!(next_game_over(events).await, GameResult::Win);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn muster_checks_the_inventory() -> anyhow::Result<()> {
    let connector = InMemoryConnector::new();
    let (mut inventory, _nodes) = garrison(&connector, 3, 1);
    inventory.pop();
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(1), 1)?;
    let mustered = Commander::muster(
        GameSettings::new(8, 4, 3, 15),
        me,
        "mem://commander".to_string(),
        inventory,
        Arc::new(connector),
        SmallRng::seed_from_u64(2),
    )
    .await;
    assert!(mustered.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn command_passes_on_when_the_commander_is_hit() -> anyhow::Result<()> {
    let connector = InMemoryConnector::new();
    let (inventory, mut nodes) = garrison(&connector, 3, 4);
    let (me, mut me_events) = SoldierNode::with_speed(SmallRng::seed_from_u64(1), 0)?;
    connector.station("mem://commander", me.clone())?;
    let commander = Commander::muster(
        GameSettings::new(8, 4, 3, 15),
        me,
        "mem://commander".to_string(),
        inventory,
        Arc::new(connector.clone()),
        SmallRng::seed_from_u64(2),
    )
    .await?;
    let target = commander.engine().soldier(COMMANDER_ID).unwrap().position;
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_scripted_missiles([Missile::new(target, MissileType::M1)]);

    let successor = match commander.run().await? {
        Outcome::HandedOff { successor } => successor,
        other => panic!("expected a handoff, got {:?}", other),
    };
    assert!((1..=3).contains(&successor));
    assert_eq!(commander.engine().rounds(), 1);
    assert!(!commander.engine().commander_alive());
    drop(commander);

    let (node, events) = &mut nodes[successor as usize - 1];
    let state = match events.recv().await.unwrap() {
        NodeEvent::Promoted(state) => state,
        other => panic!("expected a promotion, got {:?}", other),
    };
    assert_eq!(state.elapsed, 3);
    assert_eq!(state.rounds, 1);
    assert_eq!(state.roster.len(), 3);
    assert_eq!(state.fallen.len(), 1);
    assert_eq!(state.fallen[0].id, COMMANDER_ID);

    let next = Commander::resume(state, node.clone(), Arc::new(connector.clone()), SmallRng::seed_from_u64(3)).await?;
    assert_eq!(next.id(), successor);
    assert_eq!(next.engine().elapsed(), 3);
    let cell = empty_cell(next.engine());
    let mut next = next
        .with_pacing(Duration::ZERO)
        .with_scripted_missiles(vec![Missile::new(cell, MissileType::M1); 4]);
    assert_eq!(next.run().await?, Outcome::Finished(GameResult::Win));
    assert_eq!(next.engine().elapsed(), 15);
    assert_eq!(next.engine().rounds(), 5);
    assert_eq!(next.engine().hit_count(), 1);

    for (i, (_, events)) in nodes.iter_mut().enumerate() {
        if i as SoldierId + 1 != successor {
            assert_eq!(next_game_over(events).await, GameResult::Win);
        }
    }
    // The fallen first commander hears the result too.
    assert_eq!(next_game_over(&mut me_events).await, GameResult::Win);
    Ok(())
}

/// Reports for duty, then never answers.
struct Deserter {
    position: Position,
}

#[async_trait::async_trait]
impl SoldierApi for Deserter {
    async fn startup(&mut self, soldier_id: SoldierId, _board_size: u8) -> anyhow::Result<StartupReport> {
        Ok(StartupReport { soldier_id, position: self.position, speed: 1 })
    }
    async fn missile_approaching(&mut self, _missile: Missile) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("deserted"))
    }
    async fn round_status(&mut self, _soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        Err(anyhow::anyhow!("deserted"))
    }
    async fn transfer_command(&mut self, _state: HandoffState) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("deserted"))
    }
    async fn game_over(&mut self, _result: GameResult) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("deserted"))
    }
}

/// Takes the warning, then stalls on the status request.
struct Straggler {
    position: Position,
}

#[async_trait::async_trait]
impl SoldierApi for Straggler {
    async fn startup(&mut self, soldier_id: SoldierId, _board_size: u8) -> anyhow::Result<StartupReport> {
        Ok(StartupReport { soldier_id, position: self.position, speed: 2 })
    }
    async fn missile_approaching(&mut self, _missile: Missile) -> anyhow::Result<()> {
        Ok(())
    }
    async fn round_status(&mut self, _soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(anyhow::anyhow!("too late"))
    }
    async fn transfer_command(&mut self, _state: HandoffState) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("too late"))
    }
    async fn game_over(&mut self, _result: GameResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Accepts command but is slow to say so.
struct Hesitant {
    position: Position,
    promotions: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl SoldierApi for Hesitant {
    async fn startup(&mut self, soldier_id: SoldierId, _board_size: u8) -> anyhow::Result<StartupReport> {
        Ok(StartupReport { soldier_id, position: self.position, speed: 1 })
    }
    async fn missile_approaching(&mut self, _missile: Missile) -> anyhow::Result<()> {
        Ok(())
    }
    async fn round_status(&mut self, _soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        Ok(RoundStatus::Alive { position: self.position })
    }
    async fn transfer_command(&mut self, _state: HandoffState) -> anyhow::Result<()> {
        self.promotions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }
    async fn game_over(&mut self, _result: GameResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Passes startup through, then fails every call: a link that broke.
struct Severed {
    link: Box<dyn SoldierApi>,
}

#[async_trait::async_trait]
impl SoldierApi for Severed {
    async fn startup(&mut self, soldier_id: SoldierId, board_size: u8) -> anyhow::Result<StartupReport> {
        self.link.startup(soldier_id, board_size).await
    }
    async fn missile_approaching(&mut self, _missile: Missile) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("connection reset"))
    }
    async fn round_status(&mut self, _soldier_id: SoldierId) -> anyhow::Result<RoundStatus> {
        Err(anyhow::anyhow!("connection reset"))
    }
    async fn transfer_command(&mut self, _state: HandoffState) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("connection reset"))
    }
    async fn game_over(&mut self, _result: GameResult) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("connection reset"))
    }
}

/// Routes the `deserter`, `straggler`, `straggler-<row>` and
/// `hesitant-<row>` addresses to misbehaving soldiers. Counts every dial.
struct Barracks {
    network: InMemoryConnector,
    promotions: Arc<AtomicUsize>,
    dials: Arc<AtomicUsize>,
}

impl Barracks {
    fn new(network: InMemoryConnector) -> Self {
        Self {
            network,
            promotions: Arc::new(AtomicUsize::new(0)),
            dials: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn row(address: &str, prefix: &str) -> Option<u8> {
    address.strip_prefix(prefix)?.parse().ok()
}

#[async_trait::async_trait]
impl Connector for Barracks {
    async fn connect(&self, soldier_id: SoldierId, address: &str) -> anyhow::Result<Box<dyn SoldierApi>> {
        let dial = self.dials.fetch_add(1, Ordering::SeqCst);
        if let Some(y) = row(address, "straggler-") {
            return Ok(Box::new(Straggler { position: Position::new(7, y) }));
        }
        if let Some(y) = row(address, "hesitant-") {
            return Ok(Box::new(Hesitant {
                position: Position::new(7, y),
                promotions: self.promotions.clone(),
            }));
        }
        match address {
            "deserter" => Ok(Box::new(Deserter { position: Position::new(7, 7) })),
            "straggler" => Ok(Box::new(Straggler { position: Position::new(0, 7) })),
            "severed-once" if dial == 0 => Ok(Box::new(Severed {
                link: self.network.connect(soldier_id, address).await?,
            })),
            _ => self.network.connect(soldier_id, address).await,
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_soldiers_stay_alive_at_last_position() -> anyhow::Result<()> {
    let network = InMemoryConnector::new();
    let (mut inventory, _nodes) = garrison(&network, 1, 4);
    inventory.push("deserter".to_string());
    inventory.push("straggler".to_string());
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(4), 4)?;
    let commander = Commander::muster(
        GameSettings::new(8, 4, 3, 15),
        me,
        "mem://commander".to_string(),
        inventory,
        Arc::new(Barracks::new(network)),
        SmallRng::seed_from_u64(5),
    )
    .await?;
    let strikes = [Position::new(7, 7), Position::new(0, 7)]
        .into_iter()
        .cycle()
        .take(5)
        .map(|p| Missile::new(p, MissileType::M1));
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_reply_timeout(Duration::from_millis(50))
        .with_scripted_missiles(strikes);

    let summary = commander.run_round().await?;
    assert_eq!(summary.verdicts[&2], Verdict::Silent);
    assert_eq!(summary.verdicts[&3], Verdict::Silent);
    assert_eq!(summary.alive, 4);

    assert_eq!(commander.run().await?, Outcome::Finished(GameResult::Win));
    assert_eq!(commander.status(), GameStatus::Won);
    let deserter = commander.engine().soldier(2).unwrap();
    assert!(deserter.alive);
    assert_eq!(deserter.position, Position::new(7, 7));
    assert!(commander.engine().soldier(3).unwrap().alive);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn game_is_lost_when_nobody_can_take_command() -> anyhow::Result<()> {
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(6), 0)?;
    let commander = Commander::muster(
        GameSettings::new(8, 2, 3, 15),
        me,
        "mem://commander".to_string(),
        vec!["deserter".to_string()],
        Arc::new(Barracks::new(InMemoryConnector::new())),
        SmallRng::seed_from_u64(7),
    )
    .await?;
    let target = commander.engine().soldier(COMMANDER_ID).unwrap().position;
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_reply_timeout(Duration::from_millis(50))
        .with_scripted_missiles([Missile::new(target, MissileType::M1)]);

    assert_eq!(commander.run().await?, Outcome::Finished(GameResult::Loss));
    assert_eq!(commander.status(), GameStatus::Lost);
    assert_eq!(commander.engine().rounds(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_acknowledgement_still_passes_command_once() -> anyhow::Result<()> {
    let barracks = Barracks::new(InMemoryConnector::new());
    let promotions = barracks.promotions.clone();
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(8), 0)?;
    let commander = Commander::muster(
        GameSettings::new(8, 4, 3, 15),
        me,
        "mem://commander".to_string(),
        (0..3).map(|y| format!("hesitant-{}", y)).collect(),
        Arc::new(barracks),
        SmallRng::seed_from_u64(9),
    )
    .await?;
    let target = commander.engine().soldier(COMMANDER_ID).unwrap().position;
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_reply_timeout(Duration::from_millis(50))
        .with_scripted_missiles([Missile::new(target, MissileType::M1)]);

    let successor = match commander.run().await? {
        Outcome::HandedOff { successor } => successor,
        other => panic!("expected a handoff, got {:?}", other),
    };
    assert!((1..=3).contains(&successor));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(promotions.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_link_is_redialled_next_round() -> anyhow::Result<()> {
    let network = InMemoryConnector::new();
    let (soldier, _soldier_events) = SoldierNode::with_speed(SmallRng::seed_from_u64(10), 0)?;
    network.station("severed-once", soldier)?;
    let barracks = Barracks::new(network);
    let dials = barracks.dials.clone();
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(11), 1)?;
    let commander = Commander::muster(
        GameSettings::new(8, 2, 3, 15),
        me,
        "mem://commander".to_string(),
        vec!["severed-once".to_string()],
        Arc::new(barracks),
        SmallRng::seed_from_u64(12),
    )
    .await?;
    let target = commander.engine().soldier(1).unwrap().position;
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_reply_timeout(Duration::from_millis(200))
        .with_scripted_missiles(vec![Missile::new(target, MissileType::M1); 2]);

    let first = commander.run_round().await?;
    assert_eq!(first.verdicts[&1], Verdict::Silent);
    assert!(commander.engine().soldier(1).unwrap().alive);

    let second = commander.run_round().await?;
    assert_eq!(second.verdicts[&1], Verdict::Hit);
    assert!(!commander.engine().soldier(1).unwrap().alive);
    assert_eq!(dials.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stragglers_are_waited_for_together() -> anyhow::Result<()> {
    let (me, _events) = SoldierNode::with_speed(SmallRng::seed_from_u64(13), 1)?;
    let commander = Commander::muster(
        GameSettings::new(8, 5, 3, 15),
        me,
        "mem://commander".to_string(),
        (0..4).map(|y| format!("straggler-{}", y)).collect(),
        Arc::new(Barracks::new(InMemoryConnector::new())),
        SmallRng::seed_from_u64(14),
    )
    .await?;
    let cell = empty_cell(commander.engine());
    let mut commander = commander
        .with_pacing(Duration::ZERO)
        .with_reply_timeout(Duration::from_millis(200))
        .with_scripted_missiles([Missile::new(cell, MissileType::M1)]);

    let started = Instant::now();
    let summary = commander.run_round().await?;
    assert!(started.elapsed() < Duration::from_millis(600));
    assert!((1..=4).all(|id| summary.verdicts[&id] == Verdict::Silent));
    assert_eq!(summary.alive, 5);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn withdrawn_soldier_cannot_be_reached() -> anyhow::Result<()> {
    let connector = InMemoryConnector::new();
    let (inventory, _nodes) = garrison(&connector, 1, 1);
    assert!(connector.withdraw(&inventory[0])?.is_some());
    assert!(connector.connect(1, &inventory[0]).await.is_err());
    assert!(connector.withdraw(&inventory[0])?.is_none());
    Ok(())
}
