use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rollcall_core::{Section, Semester};

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn enroll(
        &self,
        name: &str,
        usn: &str,
        semester: &str,
        section: &str,
        photo_paths: Vec<String>,
    ) -> zbus::Result<String>;

    async fn take_attendance(
        &self,
        subject: &str,
        semester: &str,
        section: &str,
        image_paths: Vec<String>,
    ) -> zbus::Result<String>;

    async fn list_students(&self) -> zbus::Result<String>;

    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall classroom attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll (or re-enroll) a student from photos
    Enroll {
        /// Student name
        #[arg(short, long)]
        name: String,
        /// University serial number (unique identity key)
        #[arg(short, long)]
        usn: String,
        /// Semester (1-8)
        #[arg(long)]
        semester: String,
        /// Section (A-G)
        #[arg(long)]
        section: String,
        /// Photo files, each showing the student's face
        photos: Vec<PathBuf>,
    },
    /// Take attendance for one class session from photos
    Attend {
        /// Subject name (keys the ledger file together with the section)
        #[arg(long)]
        subject: String,
        /// Semester (1-8)
        #[arg(long)]
        semester: String,
        /// Section (A-G)
        #[arg(long)]
        section: String,
        /// Classroom photos for this session
        images: Vec<PathBuf>,
    },
    /// List enrolled students
    List,
    /// Show daemon status
    Status,
    /// Compute per-student attendance percentages from a ledger file
    Stats {
        /// Ledger file (attendance_<subject>_<section>.txt)
        ledger: PathBuf,
    },
}

async fn proxy() -> Result<AttendanceProxy<'static>> {
    let connection = zbus::Connection::session()
        .await
        .context("connecting to session bus (is rollcalld running?)")?;
    Ok(AttendanceProxy::new(&connection).await?)
}

fn to_path_strings(paths: Vec<PathBuf>) -> Result<Vec<String>> {
    paths
        .into_iter()
        .map(|p| {
            let p = p
                .canonicalize()
                .with_context(|| format!("resolving {}", p.display()))?;
            Ok(p.to_string_lossy().into_owned())
        })
        .collect()
}

/// Validate scope arguments locally so typos fail before any bus call.
fn check_scope(semester: &str, section: &str) -> Result<()> {
    semester.parse::<Semester>()?;
    section.parse::<Section>()?;
    Ok(())
}

fn print_session(json: &str) -> Result<()> {
    let session: serde_json::Value = serde_json::from_str(json)?;
    println!(
        "Attendance taken for {} ({}) at {}",
        session["subject"].as_str().unwrap_or("?"),
        session["scope"].as_str().unwrap_or("?"),
        session["timestamp"].as_str().unwrap_or("?"),
    );
    for (heading, key) in [("Present:", "present"), ("Absent:", "absent")] {
        println!("{heading}");
        for entry in session[key].as_array().into_iter().flatten() {
            println!("  {}", entry.as_str().unwrap_or("?"));
        }
    }
    if let Some(ledger) = session["ledger"].as_str() {
        println!("Report saved as {ledger}");
    }
    if session["sync_ok"] == serde_json::Value::Bool(false) {
        println!("Warning: external sync failed; attendance is recorded locally.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enroll {
            name,
            usn,
            semester,
            section,
            photos,
        } => {
            check_scope(&semester, &section)?;
            anyhow::ensure!(!photos.is_empty(), "at least one photo is required");
            let message = proxy()
                .await?
                .enroll(&name, &usn, &semester, &section, to_path_strings(photos)?)
                .await?;
            println!("{message}");
        }
        Commands::Attend {
            subject,
            semester,
            section,
            images,
        } => {
            check_scope(&semester, &section)?;
            anyhow::ensure!(!images.is_empty(), "at least one image is required");
            let json = proxy()
                .await?
                .take_attendance(&subject, &semester, &section, to_path_strings(images)?)
                .await?;
            print_session(&json)?;
        }
        Commands::List => {
            let json = proxy().await?.list_students().await?;
            let students: serde_json::Value = serde_json::from_str(&json)?;
            let entries = students.as_array().cloned().unwrap_or_default();
            if entries.is_empty() {
                println!("No students enrolled");
            }
            for s in entries {
                println!(
                    "{} ({}) — semester {}, section {}, {} embeddings",
                    s["name"].as_str().unwrap_or("?"),
                    s["usn"].as_str().unwrap_or("?"),
                    s["semester"].as_str().unwrap_or("?"),
                    s["section"].as_str().unwrap_or("?"),
                    s["embeddings"],
                );
            }
        }
        Commands::Status => {
            let json = proxy().await?.status().await?;
            println!("{json}");
        }
        Commands::Stats { ledger } => {
            let text = std::fs::read_to_string(&ledger)
                .with_context(|| format!("reading {}", ledger.display()))?;
            let stats = rollcall_store::compute_stats(&text);
            if stats.is_empty() {
                println!("No sessions recorded in {}", ledger.display());
            }
            for (student, record) in stats {
                println!(
                    "{student}: {:.1}% ({}/{} sessions)",
                    record.percentage(),
                    record.present,
                    record.total_sessions,
                );
            }
        }
    }

    Ok(())
}
