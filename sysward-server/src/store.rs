//! SQLite persistence for usage samples, alerts and command logs.
//!
//! Three independent append-only tables; row ids define insertion order,
//! which is the tiebreak for "latest" queries. The connection is shared
//! across connection tasks behind a mutex, so writes are serialized and rows
//! land in the order their commands completed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::alerts::Alert;
use crate::dispatch::Outcome;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wall-clock timestamp in the store's column format.
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AlertRow {
    pub timestamp: String,
    pub kind: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct CommandLogRow {
    pub timestamp: String,
    pub command: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct UsageRow {
    pub timestamp: String,
    pub cpu: f64,
    pub ram: f64,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database and its schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                type TEXT,
                value REAL
            );

            CREATE TABLE IF NOT EXISTS command_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                command TEXT,
                status TEXT
            );

            CREATE TABLE IF NOT EXISTS usage_trends (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                cpu REAL,
                ram REAL
            );
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn log_usage(&self, cpu: f64, ram: f64) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO usage_trends (timestamp, cpu, ram) VALUES (?1, ?2, ?3)",
            params![now_stamp(), cpu, ram],
        )?;
        Ok(())
    }

    pub async fn log_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO alerts (timestamp, type, value) VALUES (?1, ?2, ?3)",
            params![now_stamp(), alert.kind.as_str(), alert.value as f64],
        )?;
        Ok(())
    }

    pub async fn log_command(&self, command: &str, outcome: Outcome) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO command_logs (timestamp, command, status) VALUES (?1, ?2, ?3)",
            params![now_stamp(), command, outcome.as_str()],
        )?;
        Ok(())
    }

    /// Most recently written alert, by insertion order.
    pub async fn latest_alert(&self) -> Result<Option<AlertRow>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT timestamp, type, value FROM alerts ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(AlertRow {
                        timestamp: row.get(0)?,
                        kind: row.get(1)?,
                        value: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRow>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT timestamp, type, value FROM alerts ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AlertRow {
                    timestamp: row.get(0)?,
                    kind: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full command log, newest first.
    pub async fn command_history(&self) -> Result<Vec<CommandLogRow>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT timestamp, command, status FROM command_logs ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CommandLogRow {
                    timestamp: row.get(0)?,
                    command: row.get(1)?,
                    status: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn recent_usage(&self, limit: usize) -> Result<Vec<UsageRow>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT timestamp, cpu, ram FROM usage_trends ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(UsageRow {
                    timestamp: row.get(0)?,
                    cpu: row.get(1)?,
                    ram: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All-time average CPU/RAM, `None` until at least one sample exists.
    pub async fn usage_average(&self) -> Result<Option<(f64, f64)>, StoreError> {
        let conn = self.conn.lock().await;
        let averages: (Option<f64>, Option<f64>) = conn.query_row(
            "SELECT AVG(cpu), AVG(ram) FROM usage_trends",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(match averages {
            (Some(cpu), Some(ram)) => Some((cpu, ram)),
            _ => None,
        })
    }
}
