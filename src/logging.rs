//! Tracing setup: console output filtered by `RUST_LOG` plus a plain-text
//! `latest.log` that is truncated on every start.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "latest.log";

/// Where `latest.log` goes by default.
pub fn default_log_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "frameless-viewer").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Install the global subscriber. Returns the log file path when file
/// logging could be set up. Calling it twice is harmless.
pub fn init(log_dir: Option<&Path>) -> Option<PathBuf> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_target(true).with_filter(console_filter);

    let (file_layer, log_path) = match log_dir.map(open_log_file) {
        Some(Ok((file, path))) => (
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .with_filter(EnvFilter::new("debug")),
            ),
            Some(path),
        ),
        Some(Err(e)) => {
            eprintln!("Warning: Could not initialize file logging: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();

    log_path
}

fn open_log_file(dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = File::create(&path)?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), b"old run").unwrap();

        let (_, path) = open_log_file(dir.path()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let (_, path) = open_log_file(&nested).unwrap();
        assert!(path.exists());
    }
}
