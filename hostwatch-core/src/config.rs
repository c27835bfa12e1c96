use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-metric maxima in percent. A breach is a sampled value strictly
/// greater than the maximum; equal-to never triggers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: f32,
    pub ram: f32,
    pub disk: f32,
}

/// Watchdog configuration, loaded once at startup and shared read-only by
/// the monitor loop and the status API for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Service units to watch, in check order.
    pub services: Vec<String>,
    pub thresholds: Thresholds,
    /// Seconds between monitor iterations.
    pub interval: u64,
    /// Directory holding the incident log and metrics CSV.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Directory emptied by disk cleanup. Validated before any delete runs.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Filesystem whose usage is reported as disk%.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,
    /// Seconds allowed for each service-manager call before it is treated
    /// as failed/unknown.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_mount_point() -> PathBuf {
    PathBuf::from("/")
}

fn default_command_timeout() -> u64 {
    10
}

impl WatchdogConfig {
    /// Load and validate a configuration document. Any failure here is
    /// fatal at startup; there is no fallback configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::Invalid(
                "interval must be a positive number of seconds".to_string(),
            ));
        }
        if self.command_timeout == 0 {
            return Err(ConfigError::Invalid(
                "command_timeout must be a positive number of seconds".to_string(),
            ));
        }
        for (name, value) in [
            ("cpu", self.thresholds.cpu),
            ("ram", self.thresholds.ram),
            ("disk", self.thresholds.disk),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} threshold must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn incident_log_path(&self) -> PathBuf {
        self.log_dir.join("incidents.log")
    }

    pub fn metrics_csv_path(&self) -> PathBuf {
        self.log_dir.join("metrics.csv")
    }
}
