//! The `status` command: report the current away state

use crate::commands::open_store;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Print the away state and active session, if any.
pub fn show_status(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    match store.active_session()? {
        Some(session) => {
            println!(
                "{} since {} (session {})",
                "away".red().bold(),
                session.started_at.format("%Y-%m-%d %H:%M UTC"),
                session.id.cyan()
            );

            let entries = store.entries_for(&session.id)?;
            if entries.is_empty() {
                println!("No missed messages so far.");
            } else {
                println!(
                    "{} conversation(s) with missed messages so far.",
                    entries.len()
                );
            }
        }
        None => println!("{}", "present".green().bold()),
    }

    Ok(())
}
