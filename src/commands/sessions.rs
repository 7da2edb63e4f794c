//! The `sessions` command: list past away sessions

use crate::commands::open_store;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use prettytable::{format, Table};

/// Print a table of away sessions, newest first.
pub fn list_sessions(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let sessions = store.list_sessions(limit)?;

    if sessions.is_empty() {
        println!("{}", "No away sessions recorded.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Started".bold(),
        "Ended".bold()
    ]);

    for session in sessions {
        let id_short = &session.id[..8.min(session.id.len())];
        let started = session.started_at.format("%Y-%m-%d %H:%M").to_string();
        let ended = match session.ended_at {
            Some(ended_at) => ended_at.format("%Y-%m-%d %H:%M").to_string(),
            None => "active".green().to_string(),
        };

        table.add_row(prettytable::row![id_short.cyan(), started, ended]);
    }

    println!("\nAway Sessions:");
    table.printstd();
    println!();

    Ok(())
}
