//! Sysward server - remote system monitoring and control over TCP.
//!
//! Accepts one command per connection, answers with a text response, and
//! records usage samples, threshold alerts and command outcomes to SQLite.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use sysward_server::config::ServerConfig;
use sysward_server::control::OsControl;
use sysward_server::dispatch::Dispatcher;
use sysward_server::metrics::{HostInfo, SysinfoMetrics};
use sysward_server::server::Server;
use sysward_server::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let config = ServerConfig::load()
        .await
        .context("failed to load configuration")?;
    info!(db = %config.storage.db_path.display(), "opening store");
    let store = Store::open(&config.storage.db_path).context("failed to open database")?;

    let host = HostInfo::detect();
    info!(hostname = %host.hostname, os = %host.os, "host detected");

    let metrics = Arc::new(SysinfoMetrics::new(Duration::from_millis(
        config.monitoring.sample_window_ms,
    )));
    let dispatcher = Arc::new(Dispatcher::new(
        metrics,
        Arc::new(OsControl),
        store,
        host,
        config.thresholds(),
    ));

    let server = Server::bind(&config.bind_addr(), dispatcher)
        .await
        .context("failed to start server")?;
    server.serve().await
}
