//! Command dispatch: token to handler mapping and outcome classification.
//!
//! Every decoded token produces exactly one command-log row. An unknown
//! token is a well-formed negative answer (`"Invalid command"`, SUCCESS);
//! only a handler fault, persistence failures included, is logged FAILED.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::task;
use tracing::{debug, info, warn};

use crate::alerts::{self, MetricKind, Thresholds};
use crate::control::{ControlOutcome, PlatformControl};
use crate::metrics::{HostInfo, MetricsSource};
use crate::store::{now_stamp, Store, TIMESTAMP_FORMAT};

/// Cap on the process names returned by the running-apps command.
pub const RUNNING_APPS_LIMIT: usize = 10;

/// How a handled command went, as recorded in the command log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    CpuUsage,
    RamUsage,
    Battery,
    RunningApps,
    LockScreen,
    Shutdown,
    Restart,
    DiskUsage,
    Uptime,
    OsInfo,
    LatestAlert,
}

impl Command {
    /// Fixed token table. Anything unlisted is an unknown command.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Command::Ping),
            "1" => Some(Command::CpuUsage),
            "2" => Some(Command::RamUsage),
            "3" => Some(Command::Battery),
            "4" => Some(Command::RunningApps),
            "5" => Some(Command::LockScreen),
            "6" => Some(Command::Shutdown),
            "7" => Some(Command::Restart),
            "8" => Some(Command::DiskUsage),
            "9" => Some(Command::Uptime),
            "10" => Some(Command::OsInfo),
            "11" => Some(Command::LatestAlert),
            _ => None,
        }
    }
}

/// Maps command tokens to handlers and records one outcome per command.
pub struct Dispatcher {
    metrics: Arc<dyn MetricsSource>,
    control: Arc<dyn PlatformControl>,
    store: Store,
    host: HostInfo,
    thresholds: Thresholds,
}

impl Dispatcher {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        control: Arc<dyn PlatformControl>,
        store: Store,
        host: HostInfo,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            metrics,
            control,
            store,
            host,
            thresholds,
        }
    }

    /// Runs the handler for `token` and writes the command-log row with the
    /// original token text. A persistence failure while recording a success
    /// downgrades the command to FAILED.
    pub async fn dispatch(&self, token: &str) -> (String, Outcome) {
        match self.execute(token).await {
            Ok(response) => match self.store.log_command(token, Outcome::Success).await {
                Ok(()) => (response, Outcome::Success),
                Err(e) => {
                    let outcome = self.record_failed(token).await;
                    (format!("Error: {e}"), outcome)
                }
            },
            Err(e) => {
                warn!(token, error = %e, "command handler failed");
                let outcome = self.record_failed(token).await;
                (format!("Error: {e:#}"), outcome)
            }
        }
    }

    /// Best-effort FAILED record; the response text already carries the error.
    pub async fn record_failed(&self, token: &str) -> Outcome {
        if let Err(e) = self.store.log_command(token, Outcome::Failed).await {
            warn!(token, error = %e, "failed to record command outcome");
        }
        Outcome::Failed
    }

    async fn execute(&self, token: &str) -> Result<String> {
        let Some(command) = Command::parse(token) else {
            debug!(token, "unknown command token");
            return Ok("Invalid command".to_string());
        };

        match command {
            Command::Ping => Ok("PONG".to_string()),
            Command::CpuUsage => self.metric_reading(MetricKind::Cpu).await,
            Command::RamUsage => self.metric_reading(MetricKind::Ram).await,
            Command::Battery => self.battery(),
            Command::RunningApps => self.running_apps(),
            Command::LockScreen => Self::control_text(self.control.lock_screen()?),
            Command::Shutdown => Self::control_text(self.control.shutdown()?),
            Command::Restart => Self::control_text(self.control.restart()?),
            Command::DiskUsage => self.disk_usage(),
            Command::Uptime => Ok(self.uptime()),
            Command::OsInfo => Ok(self.os_info()),
            Command::LatestAlert => self.latest_alert().await,
        }
    }

    /// CPU and RAM come out of one sampling pass, so either request writes a
    /// single usage row; the alert policy then runs on the requested metric
    /// only.
    async fn metric_reading(&self, kind: MetricKind) -> Result<String> {
        let source = Arc::clone(&self.metrics);
        let sample = task::spawn_blocking(move || source.sample_cpu_ram()).await??;
        self.store
            .log_usage(sample.cpu_percent as f64, sample.ram_percent as f64)
            .await?;

        let (value, threshold) = match kind {
            MetricKind::Cpu => (sample.cpu_percent, self.thresholds.cpu),
            MetricKind::Ram => (sample.ram_percent, self.thresholds.ram),
        };

        let stamp = now_stamp();
        match alerts::evaluate(kind, value, threshold) {
            Some(alert) => {
                info!(%kind, value, threshold, "threshold exceeded");
                self.store.log_alert(&alert).await?;
                Ok(format!("[{stamp}] ALERT: High {kind} Usage - {value}%"))
            }
            None => Ok(format!("[{stamp}] {kind} Usage: {value}%")),
        }
    }

    fn battery(&self) -> Result<String> {
        let stamp = now_stamp();
        match self.metrics.battery()? {
            Some(reading) => Ok(format!(
                "[{stamp}] Battery: {:.0}%, Charging: {}",
                reading.percent, reading.charging
            )),
            None => Ok(format!("[{stamp}] No battery detected")),
        }
    }

    fn running_apps(&self) -> Result<String> {
        let names = self.metrics.running_processes()?;
        let unique: BTreeSet<String> = names.into_iter().collect();
        let listed: Vec<String> = unique.into_iter().take(RUNNING_APPS_LIMIT).collect();
        Ok(format!(
            "[{}] Running Apps:\n{}",
            now_stamp(),
            listed.join(", ")
        ))
    }

    fn control_text(outcome: ControlOutcome) -> Result<String> {
        let stamp = now_stamp();
        match outcome {
            ControlOutcome::Done(message) => Ok(format!("[{stamp}] {message}")),
            ControlOutcome::Unsupported(message) => {
                debug!(reason = message, "control action unavailable on this platform");
                Ok(format!("[{stamp}] {message}"))
            }
        }
    }

    fn disk_usage(&self) -> Result<String> {
        let stamp = now_stamp();
        match self.metrics.disk_usage()? {
            Some(disk) => Ok(format!(
                "[{stamp}] Disk Usage: {:.1}% used ({}GB / {}GB)",
                disk.percent_used, disk.used_gb, disk.total_gb
            )),
            None => Ok(format!("[{stamp}] Disk usage not available")),
        }
    }

    fn uptime(&self) -> String {
        let secs = self.host.uptime_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        format!("[{}] System Uptime: {hours} hrs {minutes} mins", now_stamp())
    }

    fn os_info(&self) -> String {
        let cores = match self.host.cpu_physical {
            Some(physical) => format!("{physical} Physical / {} Logical", self.host.cpu_logical),
            None => format!("{} Logical", self.host.cpu_logical),
        };
        format!(
            "[{}]\nHostname: {}\nOS: {}\nCPU Cores: {cores}\nBoot Time: {}",
            now_stamp(),
            self.host.hostname,
            self.host.os,
            self.host.boot_time.format(TIMESTAMP_FORMAT),
        )
    }

    async fn latest_alert(&self) -> Result<String> {
        match self.store.latest_alert().await? {
            Some(row) => Ok(format!("[{}] ALERT: {} = {}", row.timestamp, row.kind, row.value)),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Alert;
    use crate::metrics::{BatteryReading, CpuRamSample, DiskReading};
    use anyhow::anyhow;
    use chrono::Local;

    struct FakeMetrics {
        cpu: f32,
        ram: f32,
        processes: Vec<String>,
        fail_sampling: bool,
    }

    impl Default for FakeMetrics {
        fn default() -> Self {
            Self {
                cpu: 10.0,
                ram: 20.0,
                processes: vec!["init".to_string()],
                fail_sampling: false,
            }
        }
    }

    impl MetricsSource for FakeMetrics {
        fn sample_cpu_ram(&self) -> Result<CpuRamSample> {
            if self.fail_sampling {
                return Err(anyhow!("sampler offline"));
            }
            Ok(CpuRamSample {
                cpu_percent: self.cpu,
                ram_percent: self.ram,
            })
        }

        fn battery(&self) -> Result<Option<BatteryReading>> {
            Ok(None)
        }

        fn disk_usage(&self) -> Result<Option<DiskReading>> {
            Ok(Some(DiskReading {
                percent_used: 42.0,
                used_gb: 100,
                total_gb: 250,
            }))
        }

        fn running_processes(&self) -> Result<Vec<String>> {
            Ok(self.processes.clone())
        }
    }

    struct FakeControl {
        supported: bool,
    }

    impl PlatformControl for FakeControl {
        fn lock_screen(&self) -> Result<ControlOutcome> {
            Ok(if self.supported {
                ControlOutcome::Done("Screen locked".to_string())
            } else {
                ControlOutcome::Unsupported("Lock screen not supported")
            })
        }

        fn shutdown(&self) -> Result<ControlOutcome> {
            Ok(if self.supported {
                ControlOutcome::Done("Shutting down".to_string())
            } else {
                ControlOutcome::Unsupported("Shutdown not supported")
            })
        }

        fn restart(&self) -> Result<ControlOutcome> {
            Ok(if self.supported {
                ControlOutcome::Done("Restarting".to_string())
            } else {
                ControlOutcome::Unsupported("Restart not supported")
            })
        }
    }

    fn test_host() -> HostInfo {
        HostInfo {
            hostname: "testhost".to_string(),
            os: "TestOS 1.0".to_string(),
            cpu_physical: Some(4),
            cpu_logical: 8,
            boot_time: Local::now(),
        }
    }

    fn dispatcher(
        metrics: FakeMetrics,
        control: FakeControl,
    ) -> (Dispatcher, Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(metrics),
            Arc::new(control),
            store.clone(),
            test_host(),
            Thresholds::default(),
        );
        (dispatcher, store, dir)
    }

    #[tokio::test]
    async fn ping_responds_pong_and_logs_success() {
        let (dispatcher, store, _dir) =
            dispatcher(FakeMetrics::default(), FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("0").await;
        assert_eq!(response, "PONG");
        assert_eq!(outcome, Outcome::Success);

        let history = store.command_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command, "0");
        assert_eq!(history[0].status, "SUCCESS");
    }

    #[tokio::test]
    async fn unknown_token_is_a_negative_answer_not_a_failure() {
        let (dispatcher, store, _dir) =
            dispatcher(FakeMetrics::default(), FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("99").await;
        assert_eq!(response, "Invalid command");
        assert_eq!(outcome, Outcome::Success);

        let history = store.command_history().await.unwrap();
        assert_eq!(history[0].command, "99");
        assert_eq!(history[0].status, "SUCCESS");
    }

    #[tokio::test]
    async fn cpu_over_threshold_writes_sample_and_alert() {
        let metrics = FakeMetrics {
            cpu: 95.0,
            ram: 40.0,
            ..FakeMetrics::default()
        };
        let (dispatcher, store, _dir) = dispatcher(metrics, FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("1").await;
        assert!(response.contains("ALERT: High CPU Usage - 95%"), "{response}");
        assert_eq!(outcome, Outcome::Success);

        let usage = store.recent_usage(10).await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].cpu, 95.0);
        assert_eq!(usage[0].ram, 40.0);

        let alerts = store.recent_alerts(5).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "CPU");
        assert_eq!(alerts[0].value, 95.0);
    }

    #[tokio::test]
    async fn cpu_at_threshold_stays_quiet() {
        let metrics = FakeMetrics {
            cpu: 80.0,
            ram: 40.0,
            ..FakeMetrics::default()
        };
        let (dispatcher, store, _dir) = dispatcher(metrics, FakeControl { supported: true });

        let (response, _) = dispatcher.dispatch("1").await;
        assert!(response.contains("CPU Usage: 80%"), "{response}");
        assert!(store.recent_alerts(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ram_request_alerts_on_ram_only() {
        let metrics = FakeMetrics {
            cpu: 95.0,
            ram: 50.0,
            ..FakeMetrics::default()
        };
        let (dispatcher, store, _dir) = dispatcher(metrics, FakeControl { supported: true });

        // RAM is under threshold even though the coupled CPU reading is not.
        let (response, _) = dispatcher.dispatch("2").await;
        assert!(response.contains("RAM Usage: 50%"), "{response}");
        assert!(store.recent_alerts(5).await.unwrap().is_empty());
        assert_eq!(store.recent_usage(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn running_apps_are_deduplicated_and_capped() {
        let names: Vec<String> = (0..15)
            .flat_map(|i| vec![format!("proc-{i:02}"), format!("proc-{i:02}")])
            .collect();
        let metrics = FakeMetrics {
            processes: names,
            ..FakeMetrics::default()
        };
        let (dispatcher, _store, _dir) = dispatcher(metrics, FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("4").await;
        assert_eq!(outcome, Outcome::Success);

        let listed: Vec<&str> = response
            .split_once('\n')
            .map(|(_, list)| list.split(", ").collect())
            .unwrap();
        assert_eq!(listed.len(), RUNNING_APPS_LIMIT);
        let unique: BTreeSet<&str> = listed.iter().copied().collect();
        assert_eq!(unique.len(), listed.len());
    }

    #[tokio::test]
    async fn unsupported_control_action_is_logged_success() {
        let (dispatcher, store, _dir) =
            dispatcher(FakeMetrics::default(), FakeControl { supported: false });

        let (response, outcome) = dispatcher.dispatch("6").await;
        assert!(response.ends_with("not supported"), "{response}");
        assert_eq!(outcome, Outcome::Success);

        let history = store.command_history().await.unwrap();
        assert_eq!(history[0].status, "SUCCESS");
    }

    #[tokio::test]
    async fn handler_fault_is_logged_failed() {
        let metrics = FakeMetrics {
            fail_sampling: true,
            ..FakeMetrics::default()
        };
        let (dispatcher, store, _dir) = dispatcher(metrics, FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("1").await;
        assert!(response.starts_with("Error:"), "{response}");
        assert_eq!(outcome, Outcome::Failed);

        let history = store.command_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command, "1");
        assert_eq!(history[0].status, "FAILED");
    }

    #[tokio::test]
    async fn latest_alert_is_empty_without_history_then_most_recent() {
        let (dispatcher, store, _dir) =
            dispatcher(FakeMetrics::default(), FakeControl { supported: true });

        let (response, outcome) = dispatcher.dispatch("11").await;
        assert_eq!(response, "");
        assert_eq!(outcome, Outcome::Success);

        store
            .log_alert(&Alert {
                kind: MetricKind::Cpu,
                value: 92.0,
            })
            .await
            .unwrap();
        store
            .log_alert(&Alert {
                kind: MetricKind::Ram,
                value: 88.0,
            })
            .await
            .unwrap();

        let (response, _) = dispatcher.dispatch("11").await;
        assert!(response.contains("ALERT: RAM = 88"), "{response}");
    }

    #[tokio::test]
    async fn os_info_reports_the_injected_host_facts() {
        let (dispatcher, _store, _dir) =
            dispatcher(FakeMetrics::default(), FakeControl { supported: true });

        let (response, _) = dispatcher.dispatch("10").await;
        assert!(response.contains("Hostname: testhost"));
        assert!(response.contains("OS: TestOS 1.0"));
        assert!(response.contains("CPU Cores: 4 Physical / 8 Logical"));
    }

    #[tokio::test]
    async fn every_known_token_resolves_to_a_command() {
        for token in 0..=11 {
            assert!(Command::parse(&token.to_string()).is_some(), "token {token}");
        }
        assert!(Command::parse("12").is_none());
        assert!(Command::parse("").is_none());
        assert!(Command::parse("ping").is_none());
    }
}
