//! Attendance session computation: probes in, present/absent sets out.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::matcher::Matcher;
use crate::types::{AttendanceSession, Embedding, Scope, Student};

/// Build one attendance session from a batch of probe embeddings.
///
/// The roster is first narrowed to students whose `(semester, section)`
/// equals `scope`; students outside the scope are never matched and
/// never appear in either output set. Each probe is matched against
/// the scoped pool in upload order; a matched student contributes one
/// `present` membership no matter how many probes hit them. Probes
/// that match nobody are discarded. `absent` is the scoped pool minus
/// `present`, so the two sets are disjoint and their union is exactly
/// the scoped roster.
pub fn build_session(
    probes: &[Embedding],
    roster: &[Student],
    scope: Scope,
    subject: &str,
    timestamp: NaiveDateTime,
    threshold: f32,
    matcher: &dyn Matcher,
) -> AttendanceSession {
    let scoped: Vec<Student> = roster
        .iter()
        .filter(|s| scope.contains(s))
        .cloned()
        .collect();

    let mut present: BTreeSet<(String, String)> = BTreeSet::new();
    for probe in probes {
        if let Some(student) = matcher.match_probe(probe, &scoped, threshold) {
            present.insert(student.roster_entry());
        }
    }

    let absent: BTreeSet<(String, String)> = scoped
        .iter()
        .map(Student::roster_entry)
        .filter(|entry| !present.contains(entry))
        .collect();

    tracing::debug!(
        %scope,
        subject,
        probes = probes.len(),
        pool = scoped.len(),
        present = present.len(),
        absent = absent.len(),
        "attendance session built"
    );

    AttendanceSession {
        timestamp,
        subject: subject.to_string(),
        scope,
        present,
        absent,
    }
}
