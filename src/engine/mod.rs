//! Away-session engine: state machine, ledger, suppressor, and summary
//!
//! This is the core of the bot. The [`AwaySessionManager`] owns the
//! away/back state machine and routes inbound messages through the
//! [`ActivityLedger`] (what happened while away) and the
//! [`ReplySuppressor`] (at-most-once auto-reply); the [`SummaryBuilder`]
//! turns the ledger into the return summary.

pub mod ledger;
pub mod metrics;
pub mod session;
pub mod summary;
pub mod suppressor;

pub use ledger::ActivityLedger;
pub use session::{new_session_id, AwaySessionManager};
pub use summary::{Summary, SummaryBuilder, SummaryLine};
pub use suppressor::ReplySuppressor;
