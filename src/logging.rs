//! Structured logging backed by `tracing`.
//!
//! A global subscriber is installed once per process. Console output goes to
//! stderr so stdout stays free for replay output; with `logging.file` set, a
//! plain-text copy rotates daily in the configured log directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "target-lock.log";

static INIT_LOGGING: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn resolve_log_dir(cfg: &LoggingConfig) -> PathBuf {
    match &cfg.dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("target-lock")
            .join("logs"),
    }
}

/// Opens the rotating file writer. The worker guard is parked in `LOG_GUARD`
/// so buffered lines are flushed at exit.
fn open_file_writer(log_dir: &Path) -> io::Result<NonBlocking> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    LOG_GUARD.set(guard).ok();
    Ok(writer)
}

/// Filter precedence: `RUST_LOG`, then `TARGET_LOCK_LOG_LEVEL`, then the
/// configured level.
fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    let fallback = std::env::var("TARGET_LOCK_LOG_LEVEL").unwrap_or_else(|_| cfg.level.clone());
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(cfg: &LoggingConfig) {
    INIT_LOGGING.call_once(|| {
        let log_dir = resolve_log_dir(cfg);
        let file_writer = cfg.file.then(|| open_file_writer(&log_dir));

        let file_layer = match &file_writer {
            Some(Ok(writer)) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer.clone()),
            ),
            _ => None,
        };

        tracing_subscriber::registry()
            .with(build_filter(cfg))
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(io::stderr),
            )
            .with(file_layer)
            .init();

        match file_writer {
            Some(Ok(_)) => info!("Logging to stderr and {} (daily rotation)", log_dir.display()),
            Some(Err(e)) => warn!("Cannot write logs under {}: {}; stderr only", log_dir.display(), e),
            None => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_dir_wins() {
        let cfg = LoggingConfig {
            dir: Some(PathBuf::from("/var/log/lock")),
            ..LoggingConfig::default()
        };
        assert_eq!(resolve_log_dir(&cfg), PathBuf::from("/var/log/lock"));
    }

    #[test]
    fn test_default_dir_is_namespaced() {
        let dir = resolve_log_dir(&LoggingConfig::default());
        assert!(dir.ends_with("target-lock/logs"));
    }

    #[test]
    fn test_file_writer_creates_missing_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("logs");

        assert!(open_file_writer(&dir).is_ok());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_file_writer_fails_on_file_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        assert!(open_file_writer(&blocker.join("logs")).is_err());
    }
}
