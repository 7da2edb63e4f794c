//! The `clear` command: drop recorded activity for the active session

use crate::commands::open_store;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Discard the active session's recorded activity.
///
/// Development tool, mirroring the `!clear` management command.
pub fn clear_activity(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    match store.active_session()? {
        Some(session) => {
            store.clear_activity(&session.id)?;
            println!(
                "{}",
                format!("Cleared recorded activity for session {}", session.id).green()
            );
        }
        None => println!("{}", "No active away session.".yellow()),
    }

    Ok(())
}
