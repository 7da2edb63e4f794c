//! Awaybot - away-mode auto-reply bot for Matrix
//!
//! This library provides the core functionality for Awaybot: the
//! away-session state machine, activity ledger, reply suppression, and
//! missed-message summaries, plus the Matrix transport and configuration.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `engine`: Away-session state machine, activity ledger, reply
//!   suppressor, and summary builder
//! - `transport`: Chat transport abstraction and the Matrix implementation
//! - `storage`: SQLite-backed durable state
//! - `command`: Management-room command parsing
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use awaybot::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     // Engine wiring would go here
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use command::Command;
pub use config::Config;
pub use engine::{AwaySessionManager, Summary};
pub use error::{AwaybotError, Result};
