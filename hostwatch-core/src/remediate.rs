use crate::config::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationOutcome {
    Success,
    Failure,
}

/// Outcome of one corrective action. Transient: the loop converts it into
/// an incident record rather than persisting it on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationResult {
    pub action: String,
    pub target: String,
    pub outcome: RemediationOutcome,
    pub detail: Option<String>,
}

impl RemediationResult {
    fn success(action: &str, target: &str, detail: Option<String>) -> Self {
        Self {
            action: action.to_string(),
            target: target.to_string(),
            outcome: RemediationOutcome::Success,
            detail,
        }
    }

    fn failure(action: &str, target: &str, detail: String) -> Self {
        Self {
            action: action.to_string(),
            target: target.to_string(),
            outcome: RemediationOutcome::Failure,
            detail: Some(detail),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == RemediationOutcome::Success
    }
}

#[async_trait]
pub trait Remediator: Send + Sync {
    /// Restart a service unit. Never retries; a failed restart is left for
    /// the next loop iteration to re-detect.
    async fn restart_service(&self, service: &str) -> RemediationResult;

    /// Recursively empty the scratch directory. The directory itself
    /// survives; only its entries are removed.
    async fn clean_scratch(&self) -> RemediationResult;
}

/// Directories that must never be a cleanup target, even via symlink.
const PROTECTED_DIRS: &[&str] = &[
    "/", "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/lib64", "/opt", "/proc", "/root",
    "/run", "/sbin", "/srv", "/sys", "/usr", "/var",
];

/// A cleanup target that has passed validation. The only way to hand the
/// remediator a scratch path is through `ScratchDir::new`, which keeps the
/// destructive delete pinned to a designated, existing, non-system
/// directory.
#[derive(Debug, Clone)]
pub struct ScratchDir(PathBuf);

impl ScratchDir {
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "scratch_dir must be an absolute path, got {}",
                path.display()
            )));
        }
        let resolved = path.canonicalize().map_err(|err| {
            ConfigError::Invalid(format!(
                "scratch_dir {} is not accessible: {}",
                path.display(),
                err
            ))
        })?;
        if !resolved.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "scratch_dir {} is not a directory",
                resolved.display()
            )));
        }
        if PROTECTED_DIRS.iter().any(|p| Path::new(p) == resolved) {
            return Err(ConfigError::Invalid(format!(
                "scratch_dir {} is a protected system directory",
                resolved.display()
            )));
        }
        Ok(Self(resolved))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Acts on the host: systemctl restarts under a timeout, plus scratch
/// cleanup confined to the validated directory.
pub struct HostRemediator {
    scratch: ScratchDir,
    timeout: Duration,
}

impl HostRemediator {
    pub fn new(scratch: ScratchDir, timeout: Duration) -> Self {
        Self { scratch, timeout }
    }
}

#[async_trait]
impl Remediator for HostRemediator {
    async fn restart_service(&self, service: &str) -> RemediationResult {
        let restart = Command::new("systemctl")
            .args(["restart", service])
            .output();

        match timeout(self.timeout, restart).await {
            Ok(Ok(output)) if output.status.success() => {
                info!(service, "service restarted");
                RemediationResult::success("restart", service, None)
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                warn!(service, detail = %stderr, "service restart failed");
                RemediationResult::failure("restart", service, stderr)
            }
            Ok(Err(err)) => {
                warn!(service, error = %err, "service restart could not run");
                RemediationResult::failure("restart", service, err.to_string())
            }
            Err(_) => {
                let detail = format!("timed out after {}s", self.timeout.as_secs());
                warn!(service, detail = %detail, "service restart timed out");
                RemediationResult::failure("restart", service, detail)
            }
        }
    }

    async fn clean_scratch(&self) -> RemediationResult {
        let target = self.scratch.path();
        let target_display = target.display().to_string();

        match remove_dir_entries(target) {
            Ok(removed) => {
                info!(scratch = %target_display, removed, "scratch directory cleaned");
                RemediationResult::success(
                    "clean",
                    &target_display,
                    Some(format!("removed {} entries", removed)),
                )
            }
            Err(err) => {
                warn!(scratch = %target_display, error = %err, "scratch cleanup failed");
                RemediationResult::failure("clean", &target_display, err.to_string())
            }
        }
    }
}

fn remove_dir_entries(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
        }
        removed += 1;
    }
    Ok(removed)
}
