//! Append-only per-scope session ledger.
//!
//! One text file per `(subject, section)` scope key; each session
//! appends one block and blocks are never rewritten. The exact text
//! layout is compatibility-relevant: the statistics module (and an
//! external statistics tool) parse it back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use rollcall_core::AttendanceSession;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes session blocks to per-scope ledger files under one directory.
pub struct SessionLedger {
    dir: PathBuf,
}

impl SessionLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ledger file name for a scope key. Path separators in the
    /// subject are replaced so the file can never escape the ledger
    /// directory; the documented `attendance_{subject}_{section}.txt`
    /// shape is unchanged for ordinary subjects.
    pub fn file_name(subject: &str, section: &str) -> String {
        let subject: String = subject
            .chars()
            .map(|c| {
                if std::path::is_separator(c) || c == '\\' {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("attendance_{subject}_{section}.txt")
    }

    /// Path the given session's block lands in.
    pub fn path_for(&self, session: &AttendanceSession) -> PathBuf {
        self.dir
            .join(Self::file_name(&session.subject, session.scope.section.as_str()))
    }

    /// Append one session block. The block is rendered fully and
    /// written with a single call so concurrent appenders to other
    /// scope keys never interleave into this file.
    pub fn append(&self, session: &AttendanceSession) -> Result<PathBuf, LedgerError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(session);
        let block = render_block(session);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(block.as_bytes())?;

        tracing::info!(
            path = %path.display(),
            present = session.present.len(),
            absent = session.absent.len(),
            "session appended to ledger"
        );
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Render one session as the ledger block format:
///
/// ```text
///
/// --- Attendance Session: 2024-11-04 09:30:00 ---
/// Present Students:
/// Name (USN)
///
/// Absent Students:
/// Name (USN)
/// ```
pub fn render_block(session: &AttendanceSession) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n--- Attendance Session: {} ---\n",
        session.timestamp_str()
    ));
    out.push_str("Present Students:\n");
    for (name, usn) in &session.present {
        out.push_str(&format!("{name} ({usn})\n"));
    }
    out.push_str("\nAbsent Students:\n");
    for (name, usn) in &session.absent {
        out.push_str(&format!("{name} ({usn})\n"));
    }
    out
}
