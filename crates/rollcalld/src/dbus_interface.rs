use zbus::interface;

use rollcall_core::{Scope, Section, Semester};

use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
pub struct AttendanceService {
    engine: EngineHandle,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

fn parse_scope(semester: &str, section: &str) -> zbus::fdo::Result<Scope> {
    let semester: Semester = semester
        .parse()
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("{e}")))?;
    let section: Section = section
        .parse()
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("{e}")))?;
    Ok(Scope::new(semester, section))
}

/// Decode images off the executor: `image::open` is ordinary blocking
/// I/O plus CPU-bound decoding, so it runs on the blocking pool while
/// other D-Bus handlers stay responsive.
async fn load_images(paths: Vec<String>) -> zbus::fdo::Result<Vec<image::DynamicImage>> {
    if paths.is_empty() {
        return Err(zbus::fdo::Error::InvalidArgs("no image paths given".into()));
    }
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|p| {
                image::open(p).map_err(|e| zbus::fdo::Error::InvalidArgs(format!("{p}: {e}")))
            })
            .collect()
    })
    .await
    .map_err(|e| zbus::fdo::Error::Failed(format!("image decode task: {e}")))?
}

fn map_engine_error(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::NoFaceDetected => {
            zbus::fdo::Error::Failed("no face detected in the images".into())
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Enroll (or re-enroll) a student from a set of photos.
    async fn enroll(
        &self,
        name: &str,
        usn: &str,
        semester: &str,
        section: &str,
        photo_paths: Vec<String>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(name, usn, semester, section, photos = photo_paths.len(), "enroll requested");
        let scope = parse_scope(semester, section)?;
        let images = load_images(photo_paths).await?;

        let result = self
            .engine
            .enroll(
                name.to_string(),
                usn.to_string(),
                scope.semester,
                scope.section,
                images,
            )
            .await
            .map_err(map_engine_error)?;

        let verb = match result.outcome {
            rollcall_store::UpsertOutcome::Enrolled => "enrolled",
            rollcall_store::UpsertOutcome::Updated => "updated",
        };
        Ok(format!(
            "Student {verb} successfully ({} embeddings).",
            result.embeddings
        ))
    }

    /// Take attendance for one class session from a set of photos.
    /// Returns the computed session as JSON.
    async fn take_attendance(
        &self,
        subject: &str,
        semester: &str,
        section: &str,
        image_paths: Vec<String>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(subject, semester, section, images = image_paths.len(), "attendance requested");
        let scope = parse_scope(semester, section)?;
        let images = load_images(image_paths).await?;

        let outcome = self
            .engine
            .take_attendance(subject.to_string(), scope, images)
            .await
            .map_err(map_engine_error)?;

        let entry = |(name, usn): &(String, String)| format!("{name} ({usn})");
        Ok(serde_json::json!({
            "timestamp": outcome.session.timestamp_str(),
            "subject": outcome.session.subject,
            "scope": outcome.session.scope.to_string(),
            "present": outcome.session.present.iter().map(entry).collect::<Vec<_>>(),
            "absent": outcome.session.absent.iter().map(entry).collect::<Vec<_>>(),
            "ledger": outcome.ledger_path.display().to_string(),
            "sync_ok": outcome.sync_ok,
        })
        .to_string())
    }

    /// List enrolled students (identity fields only) as JSON.
    async fn list_students(&self) -> zbus::fdo::Result<String> {
        let roster = self
            .engine
            .list_students()
            .await
            .map_err(map_engine_error)?;

        let entries: Vec<_> = roster
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "usn": s.usn,
                    "semester": s.semester.to_string(),
                    "section": s.section.to_string(),
                    "embeddings": s.encodings.len(),
                })
            })
            .collect();
        Ok(serde_json::Value::Array(entries).to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let students = self
            .engine
            .list_students()
            .await
            .map(|r| r.len())
            .unwrap_or(0);
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "students": students,
        })
        .to_string())
    }
}
