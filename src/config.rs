//! Lock Engine Configuration
//!
//! Loaded from target_lock.toml (working directory) or an explicit file, with
//! env-var overrides.
//! Env format: TARGET_LOCK__SECTION__KEY (double underscore separators).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables of the lock decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Box area, as a fraction of the frame, above which a track locks.
    #[serde(default = "default_size_threshold")]
    pub size_threshold: f64,
    /// Observations needed before the anomaly model is fitted.
    #[serde(default = "default_anomaly_buffer_size")]
    pub anomaly_buffer_size: usize,
    /// Frames a lock lasts once triggered.
    #[serde(default = "default_lock_duration_frames")]
    pub lock_duration_frames: u32,
    /// Expected share of anomalous sizes in the fitting data.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
}

fn default_size_threshold() -> f64 {
    0.05
}
fn default_anomaly_buffer_size() -> usize {
    50
}
fn default_lock_duration_frames() -> u32 {
    60
}
fn default_contamination() -> f64 {
    0.05
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            size_threshold: default_size_threshold(),
            anomaly_buffer_size: default_anomaly_buffer_size(),
            lock_duration_frames: default_lock_duration_frames(),
            contamination: default_contamination(),
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.size_threshold > 0.0 && self.size_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "size_threshold",
                reason: format!("{} is not in (0, 1]", self.size_threshold),
            });
        }
        if self.anomaly_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                key: "anomaly_buffer_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.lock_duration_frames == 0 {
            return Err(ConfigError::Invalid {
                key: "lock_duration_frames",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigError::Invalid {
                key: "contamination",
                reason: format!("{} is not in (0, 0.5]", self.contamination),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write a daily-rotated log file next to stderr output.
    #[serde(default)]
    pub file: bool,
    /// Overrides the default `<data dir>/target-lock/logs`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
            dir: None,
        }
    }
}

/// Load configuration from target_lock.toml + environment variable overrides.
///
/// Search order:
///   1. `path` if given (must exist), else ./target_lock.{toml,json,yaml} (optional)
///   2. Environment variables: TARGET_LOCK__LOCK__SIZE_THRESHOLD, etc.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with_env(path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("TARGET_LOCK")
        .separator("__")
        .try_parsing(true)
}

fn load_config_with_env(path: Option<&Path>, env: config::Environment) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name("target_lock").required(false),
    };

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    cfg.lock.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let cfg = LockConfig::default();
        assert_eq!(cfg.size_threshold, 0.05);
        assert_eq!(cfg.anomaly_buffer_size, 50);
        assert_eq!(cfg.lock_duration_frames, 60);
        assert_eq!(cfg.contamination, 0.05);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad = [
            LockConfig { size_threshold: 0.0, ..LockConfig::default() },
            LockConfig { size_threshold: 1.5, ..LockConfig::default() },
            LockConfig { anomaly_buffer_size: 0, ..LockConfig::default() },
            LockConfig { lock_duration_frames: 0, ..LockConfig::default() },
            LockConfig { contamination: 0.0, ..LockConfig::default() },
            LockConfig { contamination: 0.6, ..LockConfig::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })), "{:?}", cfg);
        }
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lock.toml");
        fs::write(&path, "[lock]\nsize_threshold = 0.1\nlock_duration_frames = 30\n").unwrap();

        let cfg = load_config(Some(path.as_path())).unwrap();
        assert_eq!(cfg.lock.size_threshold, 0.1);
        assert_eq!(cfg.lock.lock_duration_frames, 30);
        assert_eq!(cfg.lock.anomaly_buffer_size, 50);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lock.toml");
        fs::write(&path, "[lock]\nsize_threshold = 0.1\nlock_duration_frames = 30\n").unwrap();

        let vars = config::Map::from([
            ("TARGET_LOCK__LOCK__SIZE_THRESHOLD".to_string(), "0.2".to_string()),
            ("TARGET_LOCK__LOCK__ANOMALY_BUFFER_SIZE".to_string(), "20".to_string()),
            ("TARGET_LOCK__LOGGING__LEVEL".to_string(), "debug".to_string()),
            ("OTHER_APP__LOCK__CONTAMINATION".to_string(), "0.4".to_string()),
        ]);
        let cfg = load_config_with_env(Some(path.as_path()), environment().source(Some(vars))).unwrap();

        assert_eq!(cfg.lock.size_threshold, 0.2);
        assert_eq!(cfg.lock.anomaly_buffer_size, 20);
        assert_eq!(cfg.lock.lock_duration_frames, 30);
        assert_eq!(cfg.lock.contamination, 0.05);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn test_env_values_are_validated() {
        let vars = config::Map::from([("TARGET_LOCK__LOCK__LOCK_DURATION_FRAMES".to_string(), "0".to_string())]);
        let err = load_config_with_env(None, environment().source(Some(vars))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "lock_duration_frames", .. }));
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lock.toml");
        fs::write(&path, "[lock]\ncontamination = 0.9\n").unwrap();

        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "contamination", .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
