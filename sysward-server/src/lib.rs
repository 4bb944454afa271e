//! Sysward server library.
//!
//! A TCP command server exposing machine state and control actions:
//! - One-shot line protocol: receive a token, send a response, close
//! - System metrics via sysinfo (CPU, RAM, disk, processes, host facts)
//! - Threshold alerting on CPU and RAM readings
//! - SQLite history of usage samples, alerts and command outcomes

pub mod alerts;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod metrics;
pub mod server;
pub mod store;
