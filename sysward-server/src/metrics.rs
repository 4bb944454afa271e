//! System metrics collection.
//!
//! Live readings go through the [`MetricsSource`] trait so handlers can be
//! exercised against fakes; the production implementation sits on sysinfo
//! for CPU/RAM/disk/processes and the battery crate for power state. Fixed
//! host facts are captured once at startup into [`HostInfo`] and injected
//! where needed.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use sysinfo::System;
use tracing::debug;

/// CPU and RAM are read in one pass; the underlying sampler produces both.
#[derive(Debug, Clone, Copy)]
pub struct CpuRamSample {
    pub cpu_percent: f32,
    pub ram_percent: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct BatteryReading {
    pub percent: f32,
    pub charging: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DiskReading {
    pub percent_used: f32,
    pub used_gb: u64,
    pub total_gb: u64,
}

/// Live metric queries. All calls are synchronous and may block; the CPU/RAM
/// sample in particular holds for the configured sampling window. A reading
/// that is not available on the host comes back as `Ok(None)`, never as an
/// error.
pub trait MetricsSource: Send + Sync {
    fn sample_cpu_ram(&self) -> Result<CpuRamSample>;
    fn battery(&self) -> Result<Option<BatteryReading>>;
    fn disk_usage(&self) -> Result<Option<DiskReading>>;
    /// Best-effort process name collection: entries that cannot be read are
    /// skipped, never propagated.
    fn running_processes(&self) -> Result<Vec<String>>;
}

/// Production metrics backed by sysinfo and the battery crate.
pub struct SysinfoMetrics {
    sample_window: Duration,
}

impl SysinfoMetrics {
    pub fn new(sample_window: Duration) -> Self {
        Self { sample_window }
    }
}

impl MetricsSource for SysinfoMetrics {
    fn sample_cpu_ram(&self) -> Result<CpuRamSample> {
        let mut sys = System::new();
        // Two refreshes separated by the sampling window give a usable delta.
        sys.refresh_cpu_usage();
        std::thread::sleep(self.sample_window);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_percent = sys.global_cpu_info().cpu_usage();
        let ram_percent = if sys.total_memory() > 0 {
            (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
        } else {
            0.0
        };

        debug!(cpu_percent, ram_percent, "sampled cpu/ram");
        Ok(CpuRamSample {
            cpu_percent,
            ram_percent,
        })
    }

    fn battery(&self) -> Result<Option<BatteryReading>> {
        let manager = battery::Manager::new().context("failed to initialize battery manager")?;
        let mut batteries = manager
            .batteries()
            .context("failed to enumerate batteries")?;

        match batteries.next() {
            Some(bat) => {
                let bat = bat.context("failed to read battery state")?;
                let percent = bat
                    .state_of_charge()
                    .get::<battery::units::ratio::percent>();
                let charging = matches!(bat.state(), battery::State::Charging | battery::State::Full);
                Ok(Some(BatteryReading { percent, charging }))
            }
            None => Ok(None),
        }
    }

    fn disk_usage(&self) -> Result<Option<DiskReading>> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        // Root filesystem when mounted as "/", otherwise the first disk.
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.list().first());

        let Some(disk) = disk else {
            return Ok(None);
        };
        let total = disk.total_space();
        if total == 0 {
            return Ok(None);
        }
        let used = total - disk.available_space();

        const GB: u64 = 1024 * 1024 * 1024;
        Ok(Some(DiskReading {
            percent_used: (used as f32 / total as f32) * 100.0,
            used_gb: used / GB,
            total_gb: total / GB,
        }))
    }

    fn running_processes(&self) -> Result<Vec<String>> {
        let mut sys = System::new();
        sys.refresh_processes();

        // Nameless entries (vanished mid-enumeration) are dropped here.
        let names = sys
            .processes()
            .values()
            .map(|p| p.name().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names)
    }
}

/// Fixed facts about the host, captured once at startup and shared read-only
/// with every handler that needs them.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub cpu_physical: Option<usize>,
    pub cpu_logical: usize,
    pub boot_time: DateTime<Local>,
}

impl HostInfo {
    pub fn detect() -> Self {
        let sys = System::new_all();

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| "unknown".to_string()),
            System::os_version().unwrap_or_default()
        );
        let boot_time = Local
            .timestamp_opt(System::boot_time() as i64, 0)
            .single()
            .unwrap_or_else(Local::now);

        Self {
            hostname,
            os,
            cpu_physical: sys.physical_core_count(),
            cpu_logical: sys.cpus().len(),
            boot_time,
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Local::now() - self.boot_time).num_seconds().max(0)
    }
}
