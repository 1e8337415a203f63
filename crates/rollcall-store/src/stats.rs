//! Attendance statistics over a ledger file.
//!
//! Parses the block format written by [`ledger::render_block`] and
//! computes per-student attendance percentages across all sessions in
//! the file.
//!
//! [`ledger::render_block`]: crate::ledger::render_block

use std::collections::BTreeMap;

/// Present/total counters for one `Name (USN)` ledger line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentRecord {
    pub present: u32,
    pub total_sessions: u32,
}

impl StudentRecord {
    pub fn percentage(&self) -> f32 {
        if self.total_sessions == 0 {
            0.0
        } else {
            self.present as f32 / self.total_sessions as f32 * 100.0
        }
    }
}

enum Roll {
    None,
    Present,
    Absent,
}

/// Tally per-student attendance across every session block in the
/// ledger text. Keys are the literal `Name (USN)` lines, so two
/// students sharing a name stay distinct as long as their USNs differ.
pub fn compute_stats(ledger_text: &str) -> BTreeMap<String, StudentRecord> {
    let mut records: BTreeMap<String, StudentRecord> = BTreeMap::new();
    let mut roll = Roll::None;

    for line in ledger_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("--- Attendance Session:") {
            roll = Roll::None;
        } else if line == "Present Students:" {
            roll = Roll::Present;
        } else if line == "Absent Students:" {
            roll = Roll::Absent;
        } else {
            // Lines outside a Present/Absent block are not roster
            // entries and must not materialize a phantom record.
            match roll {
                Roll::Present => {
                    let entry = records.entry(line.to_string()).or_default();
                    entry.present += 1;
                    entry.total_sessions += 1;
                }
                Roll::Absent => {
                    records.entry(line.to_string()).or_default().total_sessions += 1;
                }
                Roll::None => {}
            }
        }
    }

    records
}
