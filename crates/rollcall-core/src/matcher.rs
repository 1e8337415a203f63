//! Nearest-neighbor face matching against the enrolled roster.

use crate::types::{Embedding, Student};

/// Maximum Euclidean distance between a probe and a reference embedding
/// still counted as the same identity. Calibrated to the encoder.
pub const DISTANCE_THRESHOLD: f32 = 0.6;

/// Strategy for deciding which enrolled student (if any) a probe
/// embedding belongs to.
pub trait Matcher {
    fn match_probe<'a>(
        &self,
        probe: &Embedding,
        candidates: &'a [Student],
        threshold: f32,
    ) -> Option<&'a Student>;
}

/// Linear first-match scan.
///
/// Candidates are scanned in the order supplied, each candidate's
/// stored embeddings in stored order; the first reference strictly
/// inside the threshold declares the candidate matched and ends the
/// whole scan. A probe at exactly the threshold distance is not a
/// match. The scan order tie-break on ambiguous probes is part of the
/// observable contract, which is why this stays a plain nested loop
/// rather than an indexed nearest-neighbor lookup.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn match_probe<'a>(
        &self,
        probe: &Embedding,
        candidates: &'a [Student],
        threshold: f32,
    ) -> Option<&'a Student> {
        for student in candidates {
            for reference in &student.encodings {
                if probe.euclidean_distance(reference) < threshold {
                    return Some(student);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, Semester};

    fn student(usn: &str, encodings: Vec<Embedding>) -> Student {
        Student {
            name: format!("Student {usn}"),
            usn: usn.into(),
            semester: Semester::S3,
            section: Section::A,
            encodings,
        }
    }

    #[test]
    fn test_match_within_threshold() {
        let roster = vec![student("U1", vec![Embedding::new(vec![0.0, 0.0])])];
        let probe = Embedding::new(vec![0.3, 0.0]);
        let hit = FirstMatchMatcher.match_probe(&probe, &roster, 0.6);
        assert_eq!(hit.map(|s| s.usn.as_str()), Some("U1"));
    }

    #[test]
    fn test_exact_threshold_is_not_a_match() {
        // distance is exactly 1.0, representable in f32
        let roster = vec![student("U1", vec![Embedding::new(vec![0.0])])];
        let probe = Embedding::new(vec![1.0]);
        assert!(FirstMatchMatcher.match_probe(&probe, &roster, 1.0).is_none());
        assert!(FirstMatchMatcher.match_probe(&probe, &roster, 1.001).is_some());
    }

    #[test]
    fn test_first_match_wins_on_ambiguous_probe() {
        // Probe is within threshold of both; U2 is strictly nearer but
        // U1 is scanned first.
        let roster = vec![
            student("U1", vec![Embedding::new(vec![0.5, 0.0])]),
            student("U2", vec![Embedding::new(vec![0.1, 0.0])]),
        ];
        let probe = Embedding::new(vec![0.0, 0.0]);
        let hit = FirstMatchMatcher.match_probe(&probe, &roster, 0.6);
        assert_eq!(hit.map(|s| s.usn.as_str()), Some("U1"));
    }

    #[test]
    fn test_any_stored_embedding_suffices() {
        let roster = vec![student(
            "U1",
            vec![
                Embedding::new(vec![9.0, 9.0]),
                Embedding::new(vec![0.2, 0.0]),
            ],
        )];
        let probe = Embedding::new(vec![0.0, 0.0]);
        assert!(FirstMatchMatcher.match_probe(&probe, &roster, 0.6).is_some());
    }

    #[test]
    fn test_empty_encodings_never_match() {
        let roster = vec![student("U1", vec![])];
        let probe = Embedding::new(vec![0.0, 0.0]);
        assert!(FirstMatchMatcher.match_probe(&probe, &roster, 0.6).is_none());
    }

    #[test]
    fn test_no_candidates() {
        let probe = Embedding::new(vec![0.0]);
        assert!(FirstMatchMatcher.match_probe(&probe, &[], 0.6).is_none());
    }
}
