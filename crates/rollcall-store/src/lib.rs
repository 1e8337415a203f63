//! rollcall-store — persistence for the attendance system.
//!
//! Roster records live in a SQLite database keyed by USN; computed
//! sessions are appended to per-scope ledger text files and forwarded
//! to any registered [`SessionSink`]. The ledger text format is
//! append-only and parsed back by the statistics module.

pub mod ledger;
pub mod roster;
pub mod sink;
pub mod stats;

pub use ledger::{LedgerError, SessionLedger};
pub use roster::{RosterStore, StoreError, UpsertOutcome};
pub use sink::{sheet_rows, SessionSink, SinkError};
pub use stats::{compute_stats, StudentRecord};
