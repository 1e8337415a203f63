use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite roster database.
    pub db_path: PathBuf,
    /// Directory holding per-scope ledger files.
    pub ledger_dir: PathBuf,
    /// Euclidean distance below which a probe matches a reference embedding.
    pub distance_threshold: f32,
    /// External face-encoder command (reads PNG on stdin, writes detections JSON).
    pub encoder_cmd: String,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("rollcall")
            });

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("roster.db"));

        let ledger_dir = std::env::var("ROLLCALL_LEDGER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("ledger"));

        Self {
            db_path,
            ledger_dir,
            distance_threshold: env_f32(
                "ROLLCALL_DISTANCE_THRESHOLD",
                rollcall_core::DISTANCE_THRESHOLD,
            ),
            encoder_cmd: std::env::var("ROLLCALL_ENCODER_CMD")
                .unwrap_or_else(|_| "rollcall-encoder".to_string()),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; env tests take this
    // lock so they never observe each other's overrides.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_rollcall_env() {
        for key in [
            "ROLLCALL_DATA_DIR",
            "ROLLCALL_DB_PATH",
            "ROLLCALL_LEDGER_DIR",
            "ROLLCALL_DISTANCE_THRESHOLD",
            "ROLLCALL_ENCODER_CMD",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_data_dir_override_moves_db_and_ledger() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_rollcall_env();
        std::env::set_var("ROLLCALL_DATA_DIR", "/srv/rollcall");

        let config = Config::from_env();
        assert_eq!(config.db_path, PathBuf::from("/srv/rollcall/roster.db"));
        assert_eq!(config.ledger_dir, PathBuf::from("/srv/rollcall/ledger"));

        clear_rollcall_env();
    }

    #[test]
    fn test_explicit_paths_beat_data_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_rollcall_env();
        std::env::set_var("ROLLCALL_DATA_DIR", "/srv/rollcall");
        std::env::set_var("ROLLCALL_DB_PATH", "/var/lib/rollcall/roster.db");

        let config = Config::from_env();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/rollcall/roster.db"));
        assert_eq!(config.ledger_dir, PathBuf::from("/srv/rollcall/ledger"));

        clear_rollcall_env();
    }
}

