//! Server configuration.
//!
//! Loaded from the OS config directory with sensible defaults; the default
//! file is written on first run so operators have something to edit.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::alerts::{Thresholds, DEFAULT_CPU_THRESHOLD, DEFAULT_RAM_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub bind_host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub cpu_threshold: f32,
    pub ram_threshold: f32,
    /// How long the coupled CPU/RAM sampler holds between refreshes.
    pub sample_window_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                bind_host: "0.0.0.0".to_string(),
                port: 5000,
            },
            storage: StorageConfig {
                db_path: PathBuf::from("system_data.db"),
            },
            monitoring: MonitoringConfig {
                cpu_threshold: DEFAULT_CPU_THRESHOLD,
                ram_threshold: DEFAULT_RAM_THRESHOLD,
                sample_window_ms: 1000,
            },
        }
    }
}

impl ServerConfig {
    /// Load config from the OS-specific location, falling back to defaults.
    pub async fn load() -> Result<Self> {
        let path = Self::config_file_path()?;

        if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!(error = %e, "could not write default config");
            }
            Ok(config)
        }
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().context("could not find config directory")?;
        path.push("sysward");
        path.push("config.toml");
        Ok(path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind_host, self.network.port)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpu: self.monitoring.cpu_threshold,
            ram: self.monitoring.ram_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_wire_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.monitoring.cpu_threshold, 80.0);
        assert_eq!(config.monitoring.ram_threshold, 80.0);
    }

    #[test]
    fn config_file_path_is_os_specific() {
        let path = ServerConfig::config_file_path().unwrap();
        assert!(path.to_string_lossy().contains("sysward"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = ServerConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, config.network.port);
        assert_eq!(parsed.storage.db_path, config.storage.db_path);
    }
}
