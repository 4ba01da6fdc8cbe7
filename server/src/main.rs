use std::path::PathBuf;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use server::config::GameConfig;
use server::orchestrator::JudgePolicy;
use shared::sync::Shutdown;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Number of players the table waits for
    #[arg(short = 'n', long, default_value = "3")]
    players: usize,

    /// Rounds to play before the game ends
    #[arg(short, long, default_value = "5")]
    rounds: u64,

    /// Cards each player holds
    #[arg(long, default_value = "10")]
    hand_size: usize,

    /// Prompt deck file
    #[arg(long, default_value = "data/prompts.txt")]
    prompts: PathBuf,

    /// Card deck file
    #[arg(long, default_value = "data/cards.txt")]
    cards: PathBuf,

    /// How the judge is picked each round
    #[arg(long, value_enum, default_value_t = JudgePolicy::Rotation)]
    judge: JudgePolicy,

    /// RNG seed for a reproducible game (entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = GameConfig {
        players: args.players,
        rounds: args.rounds,
        hand_size: args.hand_size,
        judge_policy: args.judge,
        seed: args.seed,
    };

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("Server listening on {}", listener.local_addr()?);

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Received Ctrl+C, aborting the game...");
                shutdown.trip();
            }
        });
    }

    let roster = server::run(listener, config, &args.prompts, &args.cards, shutdown).await?;

    println!("Final scores:");
    for player in roster.players() {
        println!("  {}: {} point(s)", player.username, player.score);
    }
    if let Some(champion) = roster.champion() {
        println!("{} wins the game!", champion.username);
        info!(
            "Champion: {:?} with {} point(s)",
            champion.username, champion.score
        );
    }

    Ok(())
}
