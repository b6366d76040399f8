//! Catalogue persistence using JSON file storage

use crate::device::Device;
use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

/// On-disk catalogue layout
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub permit_join: bool,
    #[serde(default)]
    pub adapter_type: String,
    #[serde(default)]
    pub adapter_version: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Load the device database, starting fresh when absent or unreadable
pub async fn load_database(path: &Path) -> Database {
    match fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<Database>(&contents) {
            Ok(database) => {
                tracing::info!("Loaded {} devices from {:?}", database.devices.len(), path);
                database
            }
            Err(e) => {
                tracing::warn!("Failed to parse database file {:?}: {}", path, e);
                Database::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No database file found at {:?}, starting fresh", path);
            Database::default()
        }
        Err(e) => {
            tracing::warn!("Failed to read database file {:?}: {}", path, e);
            Database::default()
        }
    }
}

/// Save the device database atomically (tmp file + rename)
pub async fn save_database(path: &Path, database: &Database) -> Result<(), ControllerError> {
    write_json(path, &serde_json::to_value(database)?).await?;
    tracing::debug!("Saved {} devices to {:?}", database.devices.len(), path);
    Ok(())
}

/// Save the live property snapshot atomically
pub async fn save_properties(path: &Path, snapshot: &Value) -> Result<(), ControllerError> {
    write_json(path, snapshot).await
}

async fn write_json(path: &Path, value: &Value) -> Result<(), ControllerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}
