use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};

/// One point-in-time reading of the host, produced once per loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub disk_percent: f32,
}

/// Source of metric samples. `sample` must never fail: counters that cannot
/// be read yield 0 so a read glitch never stalls the monitor loop.
pub trait MetricsSource: Send + Sync {
    fn sample(&self) -> MetricSample;
}

/// Samples the local host through sysinfo. The `System` and `Disks` handles
/// persist across calls so CPU% is measured over the window since the
/// previous refresh rather than since process start.
pub struct HostSampler {
    system: RwLock<System>,
    disks: RwLock<Disks>,
    mount_point: PathBuf,
}

impl HostSampler {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // Prime the CPU counters so the first sample has a window to
        // measure over instead of reporting zero forever.
        system.refresh_cpu_usage();
        system.refresh_memory();

        Self {
            system: RwLock::new(system),
            disks: RwLock::new(Disks::new_with_refreshed_list()),
            mount_point: mount_point.into(),
        }
    }
}

impl MetricsSource for HostSampler {
    fn sample(&self) -> MetricSample {
        let (cpu, ram) = {
            let mut system = self.system.write();
            system.refresh_cpu_usage();
            system.refresh_memory();

            let total = system.total_memory();
            let ram = if total > 0 {
                (system.used_memory() as f64 / total as f64 * 100.0) as f32
            } else {
                0.0
            };
            (system.global_cpu_usage(), ram)
        };

        let disk = {
            let mut disks = self.disks.write();
            disks.refresh();
            disk_usage_percent(&disks, &self.mount_point)
        };

        MetricSample {
            timestamp: Utc::now(),
            cpu_percent: cpu.clamp(0.0, 100.0),
            ram_percent: ram.clamp(0.0, 100.0),
            disk_percent: disk.clamp(0.0, 100.0),
        }
    }
}

/// Usage of the filesystem holding `target`: among mount points that prefix
/// the target path, the deepest one wins. Unknown mounts report 0.
fn disk_usage_percent(disks: &Disks, target: &Path) -> f32 {
    let mut best: Option<(usize, f32)> = None;

    for disk in disks.list() {
        let mount = disk.mount_point();
        if !target.starts_with(mount) {
            continue;
        }
        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let used = total.saturating_sub(disk.available_space());
        let percent = (used as f64 / total as f64 * 100.0) as f32;
        let depth = mount.components().count();

        if best.map_or(true, |(d, _)| depth >= d) {
            best = Some((depth, percent));
        }
    }

    best.map(|(_, percent)| percent).unwrap_or(0.0)
}
