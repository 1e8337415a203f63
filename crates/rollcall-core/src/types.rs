use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp format used in ledger headers and spreadsheet rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
#[error("invalid {field}: {value}")]
pub struct ParseScopeError {
    pub field: &'static str,
    pub value: String,
}

/// Semester 1 through 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Semester {
    #[serde(rename = "1")]
    S1,
    #[serde(rename = "2")]
    S2,
    #[serde(rename = "3")]
    S3,
    #[serde(rename = "4")]
    S4,
    #[serde(rename = "5")]
    S5,
    #[serde(rename = "6")]
    S6,
    #[serde(rename = "7")]
    S7,
    #[serde(rename = "8")]
    S8,
}

impl Semester {
    pub const ALL: [Semester; 8] = [
        Semester::S1,
        Semester::S2,
        Semester::S3,
        Semester::S4,
        Semester::S5,
        Semester::S6,
        Semester::S7,
        Semester::S8,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::S1 => "1",
            Semester::S2 => "2",
            Semester::S3 => "3",
            Semester::S4 => "4",
            Semester::S5 => "5",
            Semester::S6 => "6",
            Semester::S7 => "7",
            Semester::S8 => "8",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseScopeError {
                field: "semester",
                value: s.to_string(),
            })
    }
}

/// Section A through G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Section {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::A,
        Section::B,
        Section::C,
        Section::D,
        Section::E,
        Section::F,
        Section::G,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::A => "A",
            Section::B => "B",
            Section::C => "C",
            Section::D => "D",
            Section::E => "E",
            Section::F => "F",
            Section::G => "G",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseScopeError {
                field: "section",
                value: s.to_string(),
            })
    }
}

/// Face embedding vector produced by the external encoder.
///
/// Dimension is fixed by the encoder and constant across a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled student: identity plus reference embeddings.
///
/// `usn` is the unique identity key across the roster. A student is
/// enrollable only with at least one reference embedding; a student
/// whose `encodings` list is empty can never be matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub usn: String,
    pub semester: Semester,
    pub section: Section,
    pub encodings: Vec<Embedding>,
}

impl Student {
    /// The `(name, usn)` pair used in present/absent sets and ledger lines.
    pub fn roster_entry(&self) -> (String, String) {
        (self.name.clone(), self.usn.clone())
    }
}

/// The `(semester, section)` pair that restricts matching and
/// present/absent computation to one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub semester: Semester,
    pub section: Section,
}

impl Scope {
    pub fn new(semester: Semester, section: Section) -> Self {
        Self { semester, section }
    }

    pub fn contains(&self, student: &Student) -> bool {
        student.semester == self.semester && student.section == self.section
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.semester, self.section)
    }
}

/// One computed attendance session.
///
/// Invariants: `present` and `absent` are disjoint, and their union is
/// exactly the roster scoped to `scope` at computation time. Entries
/// are `(name, usn)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub timestamp: NaiveDateTime,
    pub subject: String,
    pub scope: Scope,
    pub present: BTreeSet<(String, String)>,
    pub absent: BTreeSet<(String, String)>,
}

impl AttendanceSession {
    /// Timestamp rendered the way the ledger and spreadsheet rows expect it.
    pub fn timestamp_str(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
