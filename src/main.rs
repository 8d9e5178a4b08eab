use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex as TokioMutex;
use tracing_subscriber::EnvFilter;

use boardcore::api::{self, ApiContext};
use boardcore::config::Config;
use boardcore::export::export_board;
use boardcore::store::Store;

#[derive(Parser)]
#[command(name = "boardcore", version, about = "Dynamic-board CRM data engine")]
struct Cli {
    /// Path to the configuration file (defaults to ./config.json)
    #[arg(short, long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve,
    /// Export a board as CSV
    Export {
        board_id: i64,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List boards
    Boards,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let store = Store::open(&config.db_path).context("Failed to open database")?;
            let ctx = ApiContext {
                store: Arc::new(TokioMutex::new(store)),
                config: Arc::new(config),
            };
            api::serve(ctx).await?;
        }
        Command::Export { board_id, output } => {
            let store = Store::open(&config.db_path).context("Failed to open database")?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    export_board(&store, board_id, file)?;
                }
                None => export_board(&store, board_id, std::io::stdout())?,
            }
        }
        Command::Boards => {
            let store = Store::open(&config.db_path).context("Failed to open database")?;
            for board in store.list_boards()? {
                println!(
                    "{}\t{}\t{}",
                    board.id,
                    board.name,
                    board.description.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
