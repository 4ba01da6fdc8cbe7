use std::sync::Arc;

use clap::Parser;
use log::info;

use client::session::GameClient;
use client::ui::{TerminalUi, Ui};
use shared::sync::Shutdown;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Username to join with (prompted when omitted)
    #[arg(short, long)]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::new());
    let username = match args.username {
        Some(username) => username,
        None => ui.ask_username().await?,
    };

    info!("Joining {} as {:?}", args.server, username);
    let client =
        GameClient::connect(&args.server, &username, Arc::clone(&ui), Shutdown::new()).await?;
    let summary = client.run().await?;
    ui.show_final(&summary);

    Ok(())
}
