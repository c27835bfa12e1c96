use crate::metrics::MetricSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Timestamp rendering shared by both sinks.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

pub const METRICS_HEADER: &str = "timestamp,cpu,ram,disk";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to append to {path}: {source}")]
    Append { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

impl IncidentRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        }
    }

    fn as_line(&self) -> String {
        format!(
            "{} {} {}\n",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.severity.as_str(),
            self.message
        )
    }
}

/// Append-only incident log: one UTF-8 line per record, appended with a
/// single write and synced to disk before `append` returns. Arrival order
/// is chronological order; entries are never edited or removed.
#[derive(Debug, Clone)]
pub struct IncidentLog {
    path: PathBuf,
}

impl IncidentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, severity: Severity, message: &str) -> Result<(), StoreError> {
        self.append_record(&IncidentRecord::new(severity, message))
    }

    pub fn append_record(&self, record: &IncidentRecord) -> Result<(), StoreError> {
        let err = |source| StoreError::Append {
            path: self.path.clone(),
            source,
        };
        let line = record.as_line();

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(err)?;
        // One write per record: O_APPEND keeps concurrent appends from
        // interleaving partial lines.
        file.write_all(line.as_bytes()).map_err(err)?;
        file.sync_all().map_err(err)?;
        Ok(())
    }

    /// Last `n` lines, oldest first. A log that does not exist yet reads
    /// as empty.
    pub fn tail(&self, n: usize) -> Result<Vec<String>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].iter().map(|line| line.to_string()).collect())
    }
}

/// Append-only CSV of metric samples. The header row is written exactly
/// once, when the file is first created empty; rows are durable before
/// `append` returns.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, sample: &MetricSample) -> Result<(), StoreError> {
        let err = |source| StoreError::Append {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(err)?;

        let row = format!(
            "{},{:.1},{:.1},{:.1}\n",
            sample.timestamp.format(TIMESTAMP_FORMAT),
            sample.cpu_percent,
            sample.ram_percent,
            sample.disk_percent
        );
        let buf = if file.metadata().map_err(err)?.len() == 0 {
            format!("{}\n{}", METRICS_HEADER, row)
        } else {
            row
        };

        file.write_all(buf.as_bytes()).map_err(err)?;
        file.sync_all().map_err(err)?;
        Ok(())
    }
}
