use crate::config::WatchdogConfig;
use crate::metrics::MetricsSource;
use crate::remediate::{RemediationResult, Remediator};
use crate::service::{ServiceProbe, ServiceState};
use crate::store::{IncidentLog, MetricsStore, Severity, StoreError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The watchdog control loop: sample, persist, evaluate thresholds,
/// remediate, sleep. Strictly sequential; iterations never overlap.
///
/// Probe and remediation failures are converted into incident records and
/// the loop continues. Only a failed durable append terminates the loop,
/// since running blind would defeat the point of the record.
pub struct MonitorLoop {
    config: Arc<WatchdogConfig>,
    sampler: Arc<dyn MetricsSource>,
    probe: Arc<dyn ServiceProbe>,
    remediator: Arc<dyn Remediator>,
    incidents: IncidentLog,
    metrics: MetricsStore,
}

impl MonitorLoop {
    pub fn new(
        config: Arc<WatchdogConfig>,
        sampler: Arc<dyn MetricsSource>,
        probe: Arc<dyn ServiceProbe>,
        remediator: Arc<dyn Remediator>,
        incidents: IncidentLog,
        metrics: MetricsStore,
    ) -> Self {
        Self {
            config,
            sampler,
            probe,
            remediator,
            incidents,
            metrics,
        }
    }

    /// Run until process termination, or until a storage append fails.
    pub async fn run(&self) -> Result<(), StoreError> {
        info!(
            interval_secs = self.config.interval,
            services = self.config.services.len(),
            "monitor loop started"
        );
        loop {
            self.tick().await?;
            tokio::time::sleep(self.config.sampling_interval()).await;
        }
    }

    /// One full iteration. Split out from `run` so a single cycle can be
    /// driven directly in tests.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let sample = self.sampler.sample();
        self.metrics.append(&sample)?;
        debug!(
            cpu = sample.cpu_percent,
            ram = sample.ram_percent,
            disk = sample.disk_percent,
            "sample persisted"
        );

        let thresholds = &self.config.thresholds;

        if sample.cpu_percent > thresholds.cpu {
            // Logging only: there is no safe generic action for CPU load.
            error!(cpu = sample.cpu_percent, max = thresholds.cpu, "CPU overload");
            self.incidents.append(Severity::Error, "CPU overload")?;
        }

        if sample.ram_percent > thresholds.ram {
            error!(ram = sample.ram_percent, max = thresholds.ram, "RAM overload");
            self.incidents.append(Severity::Error, "RAM overload")?;
        }

        if sample.disk_percent > thresholds.disk {
            error!(
                disk = sample.disk_percent,
                max = thresholds.disk,
                "disk usage critical"
            );
            self.incidents.append(Severity::Error, "Disk usage critical")?;

            let result = self.remediator.clean_scratch().await;
            if result.succeeded() {
                self.incidents
                    .append(Severity::Warning, "Disk cleanup executed")?;
            } else {
                self.incidents.append(
                    Severity::Error,
                    &format!("Disk cleanup failed: {}", detail_of(&result)),
                )?;
            }
        }

        for service in &self.config.services {
            let state = self.probe.status(service).await;
            if state == ServiceState::Active {
                continue;
            }

            // `unknown` counts as down: a probe the service manager cannot
            // answer is treated the same as an inactive unit.
            warn!(%service, state = state.as_str(), "service is not active");
            self.incidents
                .append(Severity::Error, &format!("Service {} is DOWN", service))?;

            let result = self.remediator.restart_service(service).await;
            if result.succeeded() {
                self.incidents.append(
                    Severity::Warning,
                    &format!("Service {} restarted", service),
                )?;
            } else {
                self.incidents.append(
                    Severity::Error,
                    &format!("Restart failed for {}: {}", service, detail_of(&result)),
                )?;
            }
        }

        Ok(())
    }
}

fn detail_of(result: &RemediationResult) -> &str {
    result.detail.as_deref().unwrap_or("unknown error")
}
