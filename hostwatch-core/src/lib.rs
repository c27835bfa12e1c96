pub mod config;
pub mod metrics;
pub mod monitor;
pub mod remediate;
pub mod service;
pub mod store;


pub use config::{ConfigError, Thresholds, WatchdogConfig};
pub use metrics::{HostSampler, MetricSample, MetricsSource};
pub use monitor::MonitorLoop;
pub use remediate::{
    HostRemediator, RemediationOutcome, RemediationResult, Remediator, ScratchDir,
};
pub use service::{probe_all, ServiceProbe, ServiceState, ServiceStatus, SystemdProbe};
pub use store::{IncidentLog, IncidentRecord, MetricsStore, Severity, StoreError};
