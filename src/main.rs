//! Awaybot - away-mode auto-reply bot for Matrix
//!
#![doc = "Main entry point for the Awaybot application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use awaybot::cli::{Cli, Commands};
use awaybot::commands;
use awaybot::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Execute command
    match cli.command {
        Commands::Run => {
            tracing::info!("Starting awaybot");
            commands::run::run(config).await?;
            Ok(())
        }
        Commands::Status => {
            commands::status::show_status(&config)?;
            Ok(())
        }
        Commands::Sessions { limit } => {
            commands::sessions::list_sessions(&config, limit)?;
            Ok(())
        }
        Commands::Clear => {
            commands::clear::clear_activity(&config)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("awaybot=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
