//! `config.json` plus the environment variables the core honors directly
//! (`CONFIG_DIR`, `TOKEN`), per spec section 6.
//!
//! Grounded on `gpu_stats_persistence.rs`'s "missing file is empty state"
//! discipline: a missing `config.json` is not an error, just defaults.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::repository::atomic::read_if_exists;

pub const DEFAULT_ROTATION_BACKUP_COUNT: u32 = 1;
const CONFIG_DIR_ENV: &str = "CONFIG_DIR";
const TOKEN_ENV: &str = "TOKEN";
const DEFAULT_DIR_NAME: &str = ".simple-secrets";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    rotation_backup_count: Option<u32>,
}

/// Merged view of `config.json` and the ambient environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: Option<String>,
    pub rotation_backup_count: u32,
}

impl Config {
    pub fn load(config_dir: &std::path::Path) -> CoreResult<Config> {
        let file = match read_if_exists(&config_dir.join("config.json"))? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => ConfigFile::default(),
        };

        let token = env::var(TOKEN_ENV).ok().or(file.token);
        let rotation_backup_count = file
            .rotation_backup_count
            .unwrap_or(DEFAULT_ROTATION_BACKUP_COUNT)
            .max(1);

        Ok(Config {
            token,
            rotation_backup_count,
        })
    }
}

/// Resolves the configuration root: `$CONFIG_DIR` if set, else
/// `~/.simple-secrets`.
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::atomic::write_atomic;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.rotation_backup_count, DEFAULT_ROTATION_BACKUP_COUNT);
        assert!(config.token.is_none());
    }

    #[test]
    fn reads_rotation_backup_count_from_file() {
        let dir = TempDir::new().unwrap();
        write_atomic(
            &dir.path().join("config.json"),
            br#"{"rotation_backup_count": 3}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.rotation_backup_count, 3);
    }
}
