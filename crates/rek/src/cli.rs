//! Command-line interface for rek.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rek - Khmer checkers game server with a minimax opponent
#[derive(Parser, Debug)]
#[command(name = "rek")]
#[command(about = "Authoritative Rek game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server (WebSocket on /ws)
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    ShowConfig {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Ask the bot for Red's move on a JSON board
    BotMove {
        /// File holding the board as eight rows of cell codes
        #[arg(long)]
        board: PathBuf,

        /// Search depth below each root move
        #[arg(long, default_value = "3")]
        depth: u8,
    },
}
