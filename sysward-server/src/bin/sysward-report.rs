//! Offline report over the recorded monitoring data: recent alerts, the
//! command history, the latest usage samples and the all-time averages.

use anyhow::{Context, Result};

use sysward_server::config::ServerConfig;
use sysward_server::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()
        .await
        .context("failed to load configuration")?;
    let store = Store::open(&config.storage.db_path).context("failed to open database")?;

    println!("\n================ RECENT ALERTS ================");
    let alerts = store.recent_alerts(5).await?;
    if alerts.is_empty() {
        println!("No alerts recorded");
    }
    for alert in &alerts {
        println!(
            "Time: {} | Type: {} | Value: {}%",
            alert.timestamp, alert.kind, alert.value
        );
    }

    println!("\n============== COMMAND HISTORY ===============");
    let commands = store.command_history().await?;
    if commands.is_empty() {
        println!("No command logs found");
    }
    for entry in &commands {
        println!(
            "Time: {} | Command: {} | Status: {}",
            entry.timestamp, entry.command, entry.status
        );
    }

    println!("\n============= USAGE TRENDS (Last 10) =========");
    let usage = store.recent_usage(10).await?;
    if usage.is_empty() {
        println!("No usage data found");
    }
    for sample in &usage {
        println!(
            "Time: {} | CPU: {}% | RAM: {}%",
            sample.timestamp, sample.cpu, sample.ram
        );
    }

    println!("\n=========== USAGE SUMMARY (AVERAGE) ==========");
    match store.usage_average().await? {
        Some((cpu, ram)) => {
            println!("Average CPU Usage: {cpu:.2}%");
            println!("Average RAM Usage: {ram:.2}%");
        }
        None => println!("Not enough data for average"),
    }

    Ok(())
}
