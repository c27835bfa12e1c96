use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

/// Liveness of a service unit as reported by the service manager. Query
/// errors and timeouts map to `Unknown`, never to `Active` or `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Active,
    Inactive,
    Unknown,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Inactive => "inactive",
            ServiceState::Unknown => "unknown",
        }
    }
}

impl From<&str> for ServiceState {
    fn from(s: &str) -> Self {
        match s.trim() {
            "active" => ServiceState::Active,
            "inactive" | "failed" | "deactivating" | "dead" => ServiceState::Inactive,
            _ => ServiceState::Unknown,
        }
    }
}

/// A service name paired with its probed state. Derived fresh on each probe
/// and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
}

#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn status(&self, service: &str) -> ServiceState;
}

/// Probe every configured service in order. Always yields one entry per
/// name; a probe the service manager cannot answer shows up as `Unknown`
/// rather than a missing entry.
pub async fn probe_all(probe: &dyn ServiceProbe, services: &[String]) -> Vec<ServiceStatus> {
    let mut statuses = Vec::with_capacity(services.len());
    for name in services {
        let state = probe.status(name).await;
        statuses.push(ServiceStatus {
            name: name.clone(),
            state,
        });
    }
    statuses
}

/// Probes units through `systemctl is-active`, bounded by a timeout so a
/// hung service manager cannot stall the monitor loop indefinitely.
pub struct SystemdProbe {
    timeout: Duration,
}

impl SystemdProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ServiceProbe for SystemdProbe {
    async fn status(&self, service: &str) -> ServiceState {
        let query = Command::new("systemctl")
            .args(["is-active", service])
            .output();

        match timeout(self.timeout, query).await {
            // systemctl exits nonzero for inactive units but still prints
            // the state, so the exit status is ignored here.
            Ok(Ok(output)) => ServiceState::from(String::from_utf8_lossy(&output.stdout).as_ref()),
            Ok(Err(err)) => {
                warn!(service, error = %err, "service status query failed");
                ServiceState::Unknown
            }
            Err(_) => {
                warn!(
                    service,
                    timeout_secs = self.timeout.as_secs(),
                    "service status query timed out"
                );
                ServiceState::Unknown
            }
        }
    }
}
