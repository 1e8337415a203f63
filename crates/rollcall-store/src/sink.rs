//! External sync seam for computed sessions.
//!
//! The session builder and ledger never talk to a network. Anything
//! that forwards a session elsewhere (a collaborator spreadsheet, a
//! message bus) implements [`SessionSink`] and is registered with the
//! engine. Sink failures surface as a partial-success signal on the
//! attendance reply; roster and ledger state already written is never
//! rolled back.

use thiserror::Error;

use rollcall_core::AttendanceSession;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sync failed: {0}")]
    Sync(String),
}

/// Fire-and-forget consumer of a computed session.
pub trait SessionSink: Send {
    /// Short name for logging ("sheets", "webhook", ...).
    fn name(&self) -> &str;

    fn sync_session(&self, session: &AttendanceSession) -> Result<(), SinkError>;
}

/// Project a session into the two spreadsheet rows the collaborator
/// contract expects: one appended to the "Present" range, one to the
/// "Absent" range, each `[timestamp, "Name (USN)", ...]`.
pub fn sheet_rows(session: &AttendanceSession) -> (Vec<String>, Vec<String>) {
    let row = |entries: &std::collections::BTreeSet<(String, String)>| {
        std::iter::once(session.timestamp_str())
            .chain(entries.iter().map(|(name, usn)| format!("{name} ({usn})")))
            .collect::<Vec<String>>()
    };
    (row(&session.present), row(&session.absent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{Scope, Section, Semester};
    use std::collections::BTreeSet;

    #[test]
    fn test_sheet_rows_layout() {
        let session = AttendanceSession {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 11, 4)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            subject: "DBMS".into(),
            scope: Scope::new(Semester::S3, Section::A),
            present: BTreeSet::from([
                ("Asha".to_string(), "U1".to_string()),
                ("Bilal".to_string(), "U2".to_string()),
            ]),
            absent: BTreeSet::from([("Chitra".to_string(), "U3".to_string())]),
        };

        let (present_row, absent_row) = sheet_rows(&session);
        assert_eq!(
            present_row,
            vec!["2024-11-04 09:30:00", "Asha (U1)", "Bilal (U2)"]
        );
        assert_eq!(absent_row, vec!["2024-11-04 09:30:00", "Chitra (U3)"]);
    }
}
