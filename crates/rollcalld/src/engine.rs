//! Engine thread: the single owner of the roster store and encoder.
//!
//! All enrollment and attendance requests funnel through one dedicated
//! OS thread, so roster mutations (load → upsert) are serialized and
//! ledger appends per scope key never interleave. Attendance requests
//! against disjoint scopes still queue here; at classroom scale the
//! scan is far cheaper than the image encoding that precedes it.

use std::path::PathBuf;

use image::DynamicImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_core::{
    build_session, AttendanceSession, Embedding, EncoderError, FaceEncoder, FirstMatchMatcher,
    Scope, Section, Semester, Student,
};
use rollcall_store::{
    LedgerError, RosterStore, SessionLedger, SessionSink, StoreError, UpsertOutcome,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("no face detected in any submitted photo")]
    NoFaceDetected,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of an enrollment operation.
#[derive(Debug)]
pub struct EnrollOutcome {
    pub outcome: UpsertOutcome,
    /// Number of reference embeddings extracted from the photo set.
    pub embeddings: usize,
}

/// Result of an attendance-taking operation.
pub struct AttendanceOutcome {
    pub session: AttendanceSession,
    pub ledger_path: PathBuf,
    /// False when at least one external sink failed. Ledger and roster
    /// state are already durable either way.
    pub sync_ok: bool,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Enroll {
        name: String,
        usn: String,
        semester: Semester,
        section: Section,
        images: Vec<DynamicImage>,
        reply: oneshot::Sender<Result<EnrollOutcome, EngineError>>,
    },
    TakeAttendance {
        subject: String,
        scope: Scope,
        images: Vec<DynamicImage>,
        reply: oneshot::Sender<Result<AttendanceOutcome, EngineError>>,
    },
    ListStudents {
        reply: oneshot::Sender<Result<Vec<Student>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request enrollment: encode every photo, collect all detected
    /// faces' embeddings, upsert the student by USN.
    pub async fn enroll(
        &self,
        name: String,
        usn: String,
        semester: Semester,
        section: Section,
        images: Vec<DynamicImage>,
    ) -> Result<EnrollOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                name,
                usn,
                semester,
                section,
                images,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request attendance: encode session photos, match against the
    /// scoped roster, append to the ledger, run the sinks.
    pub async fn take_attendance(
        &self,
        subject: String,
        scope: Scope,
        images: Vec<DynamicImage>,
    ) -> Result<AttendanceOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::TakeAttendance {
                subject,
                scope,
                images,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Snapshot of the full roster.
    pub async fn list_students(&self) -> Result<Vec<Student>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ListStudents { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread takes ownership of the store, the encoder, and the sinks
/// and enters a request loop. Encoding and SQLite I/O block only this
/// thread.
pub fn spawn_engine(
    mut store: RosterStore,
    ledger: SessionLedger,
    encoder: Box<dyn FaceEncoder + Send>,
    sinks: Vec<Box<dyn SessionSink>>,
    threshold: f32,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!(threshold, sinks = sinks.len(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll {
                        name,
                        usn,
                        semester,
                        section,
                        images,
                        reply,
                    } => {
                        let result = run_enroll(
                            &mut store,
                            encoder.as_ref(),
                            name,
                            usn,
                            semester,
                            section,
                            &images,
                        );
                        let _ = reply.send(result);
                    }
                    EngineRequest::TakeAttendance {
                        subject,
                        scope,
                        images,
                        reply,
                    } => {
                        let result = run_attendance(
                            &store,
                            &ledger,
                            encoder.as_ref(),
                            &sinks,
                            threshold,
                            subject,
                            scope,
                            &images,
                        );
                        let _ = reply.send(result);
                    }
                    EngineRequest::ListStudents { reply } => {
                        let _ = reply.send(store.load_all().map_err(EngineError::from));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

/// Encode every photo, collect all embeddings, upsert by USN.
/// Zero embeddings across the whole photo set leaves the roster
/// untouched and reports no-face-detected to the caller.
fn run_enroll(
    store: &mut RosterStore,
    encoder: &dyn FaceEncoder,
    name: String,
    usn: String,
    semester: Semester,
    section: Section,
    images: &[DynamicImage],
) -> Result<EnrollOutcome, EngineError> {
    let mut encodings: Vec<Embedding> = Vec::new();
    for (i, image) in images.iter().enumerate() {
        let detections = encoder.encode(image)?;
        tracing::debug!(photo = i, faces = detections.len(), "enroll: photo encoded");
        encodings.extend(detections.into_iter().map(|d| d.embedding));
    }

    if encodings.is_empty() {
        return Err(EngineError::NoFaceDetected);
    }

    let embeddings = encodings.len();
    let student = Student {
        name,
        usn,
        semester,
        section,
        encodings,
    };
    let outcome = store.upsert(&student)?;

    Ok(EnrollOutcome {
        outcome,
        embeddings,
    })
}

/// Encode session photos into probes (upload order, detection order
/// within a photo), build the session against a fresh roster snapshot,
/// append to the ledger, then run every sink. Sink failures degrade to
/// `sync_ok: false`; they never undo the ledger append.
#[allow(clippy::too_many_arguments)]
fn run_attendance(
    store: &RosterStore,
    ledger: &SessionLedger,
    encoder: &dyn FaceEncoder,
    sinks: &[Box<dyn SessionSink>],
    threshold: f32,
    subject: String,
    scope: Scope,
    images: &[DynamicImage],
) -> Result<AttendanceOutcome, EngineError> {
    let mut probes: Vec<Embedding> = Vec::new();
    for (i, image) in images.iter().enumerate() {
        let detections = encoder.encode(image)?;
        tracing::debug!(photo = i, faces = detections.len(), "attendance: photo encoded");
        probes.extend(detections.into_iter().map(|d| d.embedding));
    }

    let roster = store.load_all()?;
    let session = build_session(
        &probes,
        &roster,
        scope,
        &subject,
        chrono::Local::now().naive_local(),
        threshold,
        &FirstMatchMatcher,
    );

    let ledger_path = ledger.append(&session)?;

    let mut sync_ok = true;
    for sink in sinks {
        if let Err(err) = sink.sync_session(&session) {
            tracing::warn!(sink = sink.name(), error = %err, "session sync failed");
            sync_ok = false;
        }
    }

    Ok(AttendanceOutcome {
        session,
        ledger_path,
        sync_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use rollcall_core::{Detection, FaceRegion};
    use rollcall_store::SinkError;

    /// Encoder keyed by image width: returns one canned detection list
    /// per distinct width, so tests can stage multi-photo batches.
    struct FakeEncoder {
        by_width: std::collections::HashMap<u32, Vec<Vec<f32>>>,
    }

    impl FakeEncoder {
        fn new(entries: &[(u32, Vec<Vec<f32>>)]) -> Self {
            Self {
                by_width: entries.iter().cloned().collect(),
            }
        }
    }

    impl FaceEncoder for FakeEncoder {
        fn encode(&self, image: &DynamicImage) -> Result<Vec<Detection>, EncoderError> {
            let faces = self.by_width.get(&image.width()).cloned().unwrap_or_default();
            Ok(faces
                .into_iter()
                .map(|values| Detection {
                    region: FaceRegion {
                        x: 0.0,
                        y: 0.0,
                        width: 10.0,
                        height: 10.0,
                        confidence: 0.99,
                    },
                    embedding: Embedding::new(values),
                })
                .collect())
        }
    }

    struct FailingSink;

    impl SessionSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }
        fn sync_session(&self, _session: &AttendanceSession) -> Result<(), SinkError> {
            Err(SinkError::Sync("quota exceeded".into()))
        }
    }

    fn img(width: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, 8)
    }

    fn temp_ledger(tag: &str) -> (SessionLedger, std::path::PathBuf) {
        let dir =
            std::env::temp_dir().join(format!("rollcall-engine-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        (SessionLedger::new(&dir), dir)
    }

    fn spawn(encoder: FakeEncoder, ledger: SessionLedger, sinks: Vec<Box<dyn SessionSink>>) -> EngineHandle {
        spawn_engine(
            RosterStore::open_in_memory().unwrap(),
            ledger,
            Box::new(encoder),
            sinks,
            rollcall_core::DISTANCE_THRESHOLD,
        )
    }

    #[tokio::test]
    async fn test_enroll_then_attendance_round_trip() {
        let encoder = FakeEncoder::new(&[
            // Enrollment photo: one face at the origin.
            (100, vec![vec![0.0, 0.0]]),
            // Session photo: a noisy re-sighting plus a stranger.
            (200, vec![vec![0.2, 0.0], vec![5.0, 5.0]]),
        ]);
        let (ledger, dir) = temp_ledger("roundtrip");
        let engine = spawn(encoder, ledger, vec![]);

        let enroll = engine
            .enroll(
                "Asha".into(),
                "U1".into(),
                Semester::S3,
                Section::A,
                vec![img(100)],
            )
            .await
            .unwrap();
        assert_eq!(enroll.outcome, UpsertOutcome::Enrolled);
        assert_eq!(enroll.embeddings, 1);

        let outcome = engine
            .take_attendance(
                "DBMS".into(),
                Scope::new(Semester::S3, Section::A),
                vec![img(200)],
            )
            .await
            .unwrap();
        assert!(outcome.sync_ok);
        assert!(outcome
            .session
            .present
            .contains(&("Asha".to_string(), "U1".to_string())));
        assert!(outcome.session.absent.is_empty());

        let text = std::fs::read_to_string(&outcome.ledger_path).unwrap();
        assert!(text.contains("Asha (U1)"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_enroll_no_face_leaves_roster_untouched() {
        let encoder = FakeEncoder::new(&[(100, vec![])]);
        let (ledger, dir) = temp_ledger("noface");
        let engine = spawn(encoder, ledger, vec![]);

        let err = engine
            .enroll(
                "Asha".into(),
                "U1".into(),
                Semester::S3,
                Section::A,
                vec![img(100)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoFaceDetected));
        assert!(engine.list_students().await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reenrollment_replaces_roster_entry() {
        let encoder = FakeEncoder::new(&[
            (100, vec![vec![0.0, 0.0]]),
            (150, vec![vec![1.0, 1.0], vec![2.0, 2.0]]),
        ]);
        let (ledger, dir) = temp_ledger("reenroll");
        let engine = spawn(encoder, ledger, vec![]);

        engine
            .enroll("Asha".into(), "U1".into(), Semester::S3, Section::A, vec![img(100)])
            .await
            .unwrap();
        let second = engine
            .enroll("Asha K".into(), "U1".into(), Semester::S4, Section::B, vec![img(150)])
            .await
            .unwrap();
        assert_eq!(second.outcome, UpsertOutcome::Updated);

        let roster = engine.list_students().await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Asha K");
        assert_eq!(roster[0].semester, Semester::S4);
        assert_eq!(roster[0].encodings.len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_sink_failure_is_partial_success() {
        let encoder = FakeEncoder::new(&[(100, vec![vec![0.0]]), (200, vec![vec![0.1]])]);
        let (ledger, dir) = temp_ledger("sinkfail");
        let engine = spawn(encoder, ledger, vec![Box::new(FailingSink)]);

        engine
            .enroll("Asha".into(), "U1".into(), Semester::S3, Section::A, vec![img(100)])
            .await
            .unwrap();
        let outcome = engine
            .take_attendance(
                "DBMS".into(),
                Scope::new(Semester::S3, Section::A),
                vec![img(200)],
            )
            .await
            .unwrap();

        // Sync failed, but the ledger append stands.
        assert!(!outcome.sync_ok);
        assert!(outcome.ledger_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
