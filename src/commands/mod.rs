//! CLI command handlers
//!
//! Thin handlers that wire configuration, storage, and the transport
//! together for each subcommand. The interesting logic lives in
//! [`crate::engine`]; these modules only bootstrap and report.

use crate::config::Config;
use crate::error::Result;
use crate::storage::SqliteStore;

pub mod clear;
pub mod run;
pub mod sessions;
pub mod status;

/// Open the state store configured for this invocation.
///
/// An explicit `storage.path` (from config, CLI, or environment) wins;
/// otherwise the store lives in the user's data directory.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    match &config.storage.path {
        Some(path) => SqliteStore::new_with_path(path),
        None => SqliteStore::new(),
    }
}
