//! Rek - unified CLI
//!
//! Runs the game server or queries the bot from the command line.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use rek_core::{Board, Searcher};
use rek_server::ServerConfig;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,rek=debug,rek_server=debug")
        }))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { host, port, config } => run_server(config, host, port).await,
        Command::ShowConfig { config } => show_config(config.as_deref()),
        Command::BotMove { board, depth } => bot_move(&board, depth),
    }
}

/// Run the WebSocket game server
#[instrument(skip_all)]
async fn run_server(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = ServerConfig::load(config.as_deref())?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    info!(host = %config.host(), port = config.port(), "Starting Rek server");
    rek_server::serve(config).await
}

fn show_config(config: Option<&Path>) -> Result<()> {
    let config = ServerConfig::load(config)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

#[instrument]
fn bot_move(path: &Path, depth: u8) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read board file {}", path.display()))?;
    let board: Board = serde_json::from_str(&content).context("Failed to parse board")?;
    info!(board = %board, "Searching");

    let mv = Searcher::new(depth).best_move(&board);
    println!("{}", serde_json::to_string(&mv)?);
    Ok(())
}
