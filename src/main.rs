#[cfg(not(feature = "std"))]
fn main() {}

#[cfg(feature = "std")]
use std::sync::Arc;

#[cfg(feature = "std")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "std")]
use rand::rngs::SmallRng;
#[cfg(feature = "std")]
use rand::SeedableRng;
#[cfg(feature = "std")]
use tokio::net::TcpListener;
#[cfg(feature = "std")]
use tokio::time::Duration;
#[cfg(feature = "std")]
use warzone::{
    follow_orders, init_logging, read_inventory, render_roster, run_skirmish, Commander, Connector,
    Duty, GameSettings, Outcome, Skeleton, SoldierNode, TcpConnector, TcpTransport,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[cfg(feature = "std")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
#[cfg(feature = "std")]
struct GameArgs {
    /// Size of the board (NxN)
    #[arg(short = 'N', long = "board-size")]
    board_size: u8,
    /// Number of soldiers, commander included
    #[arg(short = 'M', long = "soldiers")]
    soldiers: usize,
    /// Seconds between missiles
    #[arg(short = 't', long = "interval")]
    interval: u32,
    /// Total game time in seconds
    #[arg(short = 'T', long = "duration")]
    duration: u32,
}

#[cfg(feature = "std")]
impl GameArgs {
    fn settings(&self) -> GameSettings {
        GameSettings::new(self.board_size, self.soldiers, self.interval, self.duration)
    }
}

#[derive(Subcommand)]
#[cfg(feature = "std")]
enum Commands {
    /// Start a game as commander and drive it over TCP.
    Commander {
        #[command(flatten)]
        game: GameArgs,
        #[arg(long, help = "Address recorded for this process on the roster")]
        addr: String,
        #[arg(long, default_value = "soldiers.txt", help = "File with one soldier host:port per line")]
        inventory: String,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long, help = "Fixed speed 0-4 instead of a random one")]
        speed: Option<u8>,
    },
    /// Serve as a soldier and wait for orders.
    Soldier {
        #[arg(long, default_value = "127.0.0.1:50051")]
        addr: String,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long, help = "Fixed speed 0-4 instead of a random one")]
        speed: Option<u8>,
    },
    /// Play a whole game inside this process.
    Local {
        #[command(flatten)]
        game: GameArgs,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0, help = "Real milliseconds between rounds")]
        pacing_ms: u64,
    },
}

#[cfg(feature = "std")]
impl Commands {
    /// Tag for this process' log lines.
    fn role(&self) -> String {
        match self {
            Commands::Commander { addr, .. } => format!("commander@{}", addr),
            Commands::Soldier { addr, .. } => format!("soldier@{}", addr),
            Commands::Local { .. } => "local".to_string(),
        }
    }
}

#[cfg(feature = "std")]
fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => {
            let mut seed_rng = rand::rng();
            SmallRng::from_rng(&mut seed_rng)
        }
    }
}

#[cfg(feature = "std")]
fn make_node(seed: Option<u64>, speed: Option<u8>) -> anyhow::Result<(SoldierNode, tokio::sync::mpsc::UnboundedReceiver<warzone::NodeEvent>)> {
    let rng = make_rng(seed);
    match speed {
        Some(s) => SoldierNode::with_speed(rng, s),
        None => Ok(SoldierNode::new(rng)),
    }
}

/// Answer every connection on `listener` with `node`.
#[cfg(feature = "std")]
async fn serve(listener: TcpListener, node: SoldierNode) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("accept failed: {}", e);
                continue;
            }
        };
        log::debug!("connection from {}", peer);
        let node = node.clone();
        tokio::spawn(async move {
            let mut skeleton = Skeleton::new(node, TcpTransport::listening(stream));
            if let Err(e) = skeleton.run().await {
                log::debug!("link from {} closed: {}", peer, e);
            }
        });
    }
}

#[cfg(feature = "std")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.role());

    match cli.command {
        Commands::Commander {
            game,
            addr,
            inventory,
            seed,
            speed,
        } => {
            let settings = game.settings();
            settings.validate().map_err(|e| anyhow::anyhow!(e))?;
            let soldiers = read_inventory(&inventory)?;
            log::info!("commander at {} with {} soldiers from {}", addr, soldiers.len(), inventory);
            let (me, mut events) = make_node(seed, speed)?;
            // Successors report the end of the game to id 0 at this address.
            let listener = TcpListener::bind(&addr).await?;
            tokio::spawn(serve(listener, me.clone()));

            let connector: Arc<dyn Connector> = Arc::new(TcpConnector::new());
            let mut commander = Commander::muster(
                settings,
                me.clone(),
                addr,
                soldiers,
                connector.clone(),
                make_rng(seed.map(|s| s.wrapping_add(1))),
            )
            .await?;
            let outcome = commander.run().await?;
            print!("{}", render_roster(commander.engine()));
            drop(commander);
            match outcome {
                Outcome::Finished(result) => println!("Game over: {:?}", result),
                Outcome::HandedOff { successor } => {
                    println!("Commander hit, command passed to soldier {}", successor);
                    let mut rng = make_rng(seed.map(|s| s.wrapping_add(2)));
                    if let Duty::Ended(result) = follow_orders(&me, &mut events, connector, &mut rng).await? {
                        println!("Game over: {:?}", result);
                    }
                }
            }
        }
        Commands::Soldier { addr, seed, speed } => {
            let (node, mut events) = make_node(seed, speed)?;
            let listener = TcpListener::bind(&addr).await?;
            log::info!("soldier listening on {} (speed {})", addr, node.speed()?);
            tokio::spawn(serve(listener, node.clone()));

            let connector: Arc<dyn Connector> = Arc::new(TcpConnector::new());
            let mut rng = make_rng(seed.map(|s| s.wrapping_add(1)));
            match follow_orders(&node, &mut events, connector, &mut rng).await? {
                Duty::Ended(result) => println!("Game over: {:?}", result),
                Duty::Relieved { successor } => {
                    println!("Hit while in command, soldier {} carries on", successor)
                }
            }
        }
        Commands::Local {
            game,
            seed,
            pacing_ms,
        } => {
            let seed = seed.unwrap_or_else(|| rand::random());
            println!("Starting local game with seed {}", seed);
            let report = run_skirmish(game.settings(), seed, Duration::from_millis(pacing_ms)).await?;
            println!("Result: {:?}", report.result);
            println!("Chain of command: {:?}", report.chain_of_command);
        }
    }
    Ok(())
}
