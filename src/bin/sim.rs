use serde_json::json;
use tokio::time::Duration;
use warzone::{run_skirmish, GameSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 6 {
        eprintln!("Usage: {} <seed> [<N> <M> <t> <T>]", args[0]);
        std::process::exit(1);
    }
    let seed: u64 = args[1].parse()?;
    let settings = if args.len() == 6 {
        GameSettings::new(args[2].parse()?, args[3].parse()?, args[4].parse()?, args[5].parse()?)
    } else {
        GameSettings::new(8, 6, 3, 15)
    };

    let report = run_skirmish(settings, seed, Duration::ZERO).await?;

    let result = json!({
        "seed": seed,
        "settings": settings,
        "result": report.result,
        "chain_of_command": report.chain_of_command,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
