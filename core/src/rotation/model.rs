//! Snapshot backup descriptors, grounded in spec section 3: names carry a
//! timestamp and parse unambiguously.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupType {
    Rotation,
    Manual,
    PreRestore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDescriptor {
    pub name: String,
    pub path: std::path::PathBuf,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BackupType,
}
