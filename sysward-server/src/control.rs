//! Platform control actions: lock screen, shutdown, restart.
//!
//! Actions are fire-and-forget: the platform command is spawned and the
//! confirmation goes back immediately, before the action completes. A
//! platform with no way to perform an action answers `Unsupported`, which is
//! a valid response, not a failure.

use anyhow::{Context, Result};
use std::process::Command;
use tracing::{debug, info};

const POWER_DELAY_SECS: u32 = 5;

/// What became of a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The platform command was spawned; the action completes on its own.
    Done(String),
    /// The current platform cannot perform this action.
    Unsupported(&'static str),
}

pub trait PlatformControl: Send + Sync {
    fn lock_screen(&self) -> Result<ControlOutcome>;
    fn shutdown(&self) -> Result<ControlOutcome>;
    fn restart(&self) -> Result<ControlOutcome>;
}

/// Control actions backed by the operating system's own tools.
pub struct OsControl;

impl OsControl {
    fn spawn(program: &str, args: &[&str]) -> Result<()> {
        debug!(program, ?args, "spawning control command");
        Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        Ok(())
    }
}

impl PlatformControl for OsControl {
    fn lock_screen(&self) -> Result<ControlOutcome> {
        if cfg!(target_os = "windows") {
            Self::spawn("rundll32.exe", &["user32.dll,LockWorkStation"])?;
            info!("screen lock requested");
            Ok(ControlOutcome::Done("Screen locked".to_string()))
        } else if cfg!(target_os = "linux") {
            Self::spawn("loginctl", &["lock-session"])?;
            info!("screen lock requested");
            Ok(ControlOutcome::Done("Screen locked".to_string()))
        } else {
            Ok(ControlOutcome::Unsupported("Lock screen not supported"))
        }
    }

    fn shutdown(&self) -> Result<ControlOutcome> {
        if cfg!(target_os = "windows") {
            let delay = POWER_DELAY_SECS.to_string();
            Self::spawn("shutdown", &["/s", "/t", &delay])?;
            info!(delay_secs = POWER_DELAY_SECS, "shutdown requested");
            Ok(ControlOutcome::Done(format!(
                "Shutting down in {POWER_DELAY_SECS} seconds"
            )))
        } else if cfg!(target_os = "linux") {
            Self::spawn("systemctl", &["poweroff"])?;
            info!("shutdown requested");
            Ok(ControlOutcome::Done("Shutting down".to_string()))
        } else {
            Ok(ControlOutcome::Unsupported("Shutdown not supported"))
        }
    }

    fn restart(&self) -> Result<ControlOutcome> {
        if cfg!(target_os = "windows") {
            let delay = POWER_DELAY_SECS.to_string();
            Self::spawn("shutdown", &["/r", "/t", &delay])?;
            info!(delay_secs = POWER_DELAY_SECS, "restart requested");
            Ok(ControlOutcome::Done(format!(
                "Restarting in {POWER_DELAY_SECS} seconds"
            )))
        } else if cfg!(target_os = "linux") {
            Self::spawn("systemctl", &["reboot"])?;
            info!("restart requested");
            Ok(ControlOutcome::Done("Restarting".to_string()))
        } else {
            Ok(ControlOutcome::Unsupported("Restart not supported"))
        }
    }
}
