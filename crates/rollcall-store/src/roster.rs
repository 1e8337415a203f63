//! SQLite-backed roster store, keyed by USN.
//!
//! Replaces the whole-file-rewrite persistence of earlier designs with
//! a keyed table behind the same `load_all`/`upsert` contract, so the
//! matcher and session builder never notice the difference. SQLite's
//! transactional writes plus a single writer (the engine thread) rule
//! out the load-then-rewrite lost-update race.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use rollcall_core::{Embedding, Student};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt roster record for usn {usn}: {reason}")]
    Corrupt { usn: String, reason: String },
}

/// Whether an upsert enrolled a new student or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Enrolled,
    Updated,
}

/// Owns the persisted roster. Callers only ever see snapshots from
/// [`load_all`](Self::load_all); mutation goes through
/// [`upsert`](Self::upsert).
pub struct RosterStore {
    conn: Connection,
}

impl RosterStore {
    /// Open (creating if necessary) the roster database at `path`.
    ///
    /// A missing database is not an error: the schema is created so a
    /// first-run `load_all` returns an empty roster and first-time
    /// enrollment succeeds.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS students (
                usn       TEXT PRIMARY KEY,
                name      TEXT NOT NULL,
                semester  TEXT NOT NULL,
                section   TEXT NOT NULL,
                encodings TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Load a snapshot of the full roster, in enrollment order.
    pub fn load_all(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT usn, name, semester, section, encodings FROM students ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut students = Vec::new();
        for row in rows {
            let (usn, name, semester, section, encodings) = row?;
            students.push(decode_student(usn, name, &semester, &section, &encodings)?);
        }
        Ok(students)
    }

    /// Insert the student, or replace an existing record with the same
    /// USN wholesale (name, semester, section, encodings — never merged).
    pub fn upsert(&mut self, student: &Student) -> Result<UpsertOutcome, StoreError> {
        let encodings = encode_embeddings(&student.encodings);
        let tx = self.conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM students WHERE usn = ?1",
                params![student.usn],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;

        if exists {
            tx.execute(
                "UPDATE students SET name = ?2, semester = ?3, section = ?4, encodings = ?5
                 WHERE usn = ?1",
                params![
                    student.usn,
                    student.name,
                    student.semester.as_str(),
                    student.section.as_str(),
                    encodings
                ],
            )?;
        } else {
            tx.execute(
                "INSERT INTO students (usn, name, semester, section, encodings)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    student.usn,
                    student.name,
                    student.semester.as_str(),
                    student.section.as_str(),
                    encodings
                ],
            )?;
        }
        tx.commit()?;

        let outcome = if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Enrolled
        };
        tracing::info!(usn = %student.usn, ?outcome, embeddings = student.encodings.len(), "roster upsert");
        Ok(outcome)
    }

    /// Number of enrolled students.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn encode_embeddings(encodings: &[Embedding]) -> String {
    let raw: Vec<&[f32]> = encodings.iter().map(|e| e.values.as_slice()).collect();
    // Vec<f32> serialization cannot fail.
    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
}

fn decode_student(
    usn: String,
    name: String,
    semester: &str,
    section: &str,
    encodings: &str,
) -> Result<Student, StoreError> {
    let semester = semester.parse().map_err(|e| StoreError::Corrupt {
        usn: usn.clone(),
        reason: format!("{e}"),
    })?;
    let section = section.parse().map_err(|e| StoreError::Corrupt {
        usn: usn.clone(),
        reason: format!("{e}"),
    })?;
    let raw: Vec<Vec<f32>> = serde_json::from_str(encodings).map_err(|e| StoreError::Corrupt {
        usn: usn.clone(),
        reason: format!("bad encodings json: {e}"),
    })?;
    Ok(Student {
        name,
        usn,
        semester,
        section,
        encodings: raw.into_iter().map(Embedding::new).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{Section, Semester};

    fn student(usn: &str, name: &str, encodings: Vec<Vec<f32>>) -> Student {
        Student {
            name: name.into(),
            usn: usn.into(),
            semester: Semester::S3,
            section: Section::A,
            encodings: encodings.into_iter().map(Embedding::new).collect(),
        }
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let store = RosterStore::open_in_memory().unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_round_trip() {
        let mut store = RosterStore::open_in_memory().unwrap();
        let s = student("U1", "Asha", vec![vec![0.125, -0.5, 3.0], vec![1.0, 2.0, 3.0]]);
        assert_eq!(store.upsert(&s).unwrap(), UpsertOutcome::Enrolled);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![s]);
    }

    #[test]
    fn test_reenrollment_replaces_not_duplicates() {
        let mut store = RosterStore::open_in_memory().unwrap();
        store
            .upsert(&student("U1", "Asha", vec![vec![1.0, 2.0]]))
            .unwrap();

        let replacement = student("U1", "Asha K", vec![vec![9.0, 9.0], vec![8.0, 8.0]]);
        assert_eq!(store.upsert(&replacement).unwrap(), UpsertOutcome::Updated);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], replacement);
    }

    #[test]
    fn test_load_preserves_enrollment_order() {
        let mut store = RosterStore::open_in_memory().unwrap();
        for usn in ["U3", "U1", "U2"] {
            store.upsert(&student(usn, usn, vec![vec![0.0]])).unwrap();
        }
        // Re-enrolling U3 must keep its original position.
        store.upsert(&student("U3", "U3 again", vec![vec![1.0]])).unwrap();

        let usns: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|s| s.usn)
            .collect();
        assert_eq!(usns, vec!["U3", "U1", "U2"]);
    }

    #[test]
    fn test_count() {
        let mut store = RosterStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        store.upsert(&student("U1", "A", vec![vec![0.0]])).unwrap();
        store.upsert(&student("U2", "B", vec![vec![0.0]])).unwrap();
        store.upsert(&student("U1", "A2", vec![vec![1.0]])).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }
}
