use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod encoder_cmd;
mod engine;

use config::Config;
use dbus_interface::AttendanceService;
use encoder_cmd::CommandEncoder;
use rollcall_store::{RosterStore, SessionLedger};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    // Open storage synchronously (fail-fast).
    let store = RosterStore::open(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), students = store.count()?, "roster opened");

    let ledger = SessionLedger::new(&config.ledger_dir);
    let encoder = CommandEncoder::new(&config.encoder_cmd);

    let engine = engine::spawn_engine(
        store,
        ledger,
        Box::new(encoder),
        Vec::new(),
        config.distance_threshold,
    );

    let _connection = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", AttendanceService::new(engine))?
        .build()
        .await?;

    tracing::info!("rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
