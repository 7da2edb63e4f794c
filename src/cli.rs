//! Command-line interface definition for Awaybot
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the bot and inspecting its state.

use clap::{Parser, Subcommand};

/// Awaybot - away-mode auto-reply bot for Matrix
///
/// Marks a chat account away, auto-replies once per direct conversation,
/// and summarizes missed messages on return.
#[derive(Parser, Debug, Clone)]
#[command(name = "awaybot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Path to the state database (overrides config and data dir)
    #[arg(long, env = "AWAYBOT_STATE_DB")]
    pub storage_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Awaybot
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect to the homeserver and serve away-mode auto-replies
    Run,

    /// Show the current away state and active session
    Status,

    /// List past away sessions
    Sessions {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Discard recorded activity for the active session
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            storage_path: None,
            verbose: false,
            command: Commands::Status,
        }
    }
}
