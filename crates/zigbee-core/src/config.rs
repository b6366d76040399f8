//! Core configuration with serde defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler tick while requests are queued
    pub request_interval_ms: u64,
    /// Neighbour-table refresh period
    pub neighbors_interval_secs: u64,
    /// Poll period for properties read on a timer
    pub poll_interval_secs: u64,
    /// Per-device interview deadline
    pub interview_timeout_secs: u64,
    /// Device catalogue storage
    pub database_file: PathBuf,
    /// Live property value storage
    pub properties_file: PathBuf,
    /// Name given to the coordinator's own catalogue entry
    pub coordinator_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_interval_ms: 250,
            neighbors_interval_secs: 300,
            poll_interval_secs: 60,
            interview_timeout_secs: 10,
            database_file: PathBuf::from("database.json"),
            properties_file: PathBuf::from("properties.json"),
            coordinator_name: "Coordinator".to_string(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    #[must_use]
    pub fn neighbors_interval(&self) -> Duration {
        Duration::from_secs(self.neighbors_interval_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn interview_timeout(&self) -> Duration {
        Duration::from_secs(self.interview_timeout_secs)
    }
}
