//! Management-room command parser
//!
//! Messages in the management room are interpreted as commands for the bot.
//! Commands are simple bang-prefixed words; anything else in the management
//! room is ignored.
//!
//! # Command Syntax
//!
//! - `!away` -- mark the account away and start auto-replying
//! - `!back` -- mark the account back and receive the missed-message summary
//! - `!status` -- report the current away state
//! - `!clear` -- drop recorded activity for the active session (development tool)

/// A command intent parsed from a management-room message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start an away session
    Away,
    /// End the away session and produce the summary
    Back,
    /// Report the current away state
    Status,
    /// Discard recorded activity for the active session
    Clear,
    /// A bang-prefixed word that is not a known command
    Unknown,
}

impl Command {
    /// Parse a management-room message into a command intent.
    ///
    /// Returns `None` for ordinary messages (no `!` prefix), which the bot
    /// ignores, and `Some(Command::Unknown)` for unrecognized commands so a
    /// short usage hint can be sent back.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('!') {
            return None;
        }

        // First word only: "!away see you Monday" still parses as Away.
        let word = trimmed.split_whitespace().next().unwrap_or(trimmed);

        Some(match word {
            "!away" => Self::Away,
            "!back" => Self::Back,
            "!status" => Self::Status,
            "!clear" => Self::Clear,
            _ => Self::Unknown,
        })
    }

    /// Short usage text sent in response to unknown commands.
    pub fn usage() -> &'static str {
        "Available commands: !away, !back, !status, !clear"
    }
}
