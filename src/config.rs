use std::{fs, path::{Path, PathBuf}};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{Result, StickyError};

/// Name of the store file inside the data directory.
pub const STORE_FILE_NAME: &str = "stickynotes.json";

/// Process configuration. Application options live in `Settings`, inside
/// the store; this only says where things are.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "ConfigFile")]
pub struct Config {
    /// Directory holding the store file
    pub data_dir: PathBuf,

    /// File name of the store inside `data_dir`
    pub store_file: String,

    /// Directory for backups
    pub backup_dir: PathBuf,
}

/// Config as written on disk; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    store_file: Option<String>,
    backup_dir: Option<PathBuf>,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let mut config = match file.data_dir {
            Some(data_dir) => Config::with_data_dir(data_dir),
            None => Config::default(),
        };
        if let Some(store_file) = file.store_file {
            config.store_file = store_file;
        }
        if let Some(backup_dir) = file.backup_dir {
            config.backup_dir = backup_dir;
        }
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("dev", "stickynotes", "StickyNotes")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".stickynotes"));

        Self::with_data_dir(data_dir)
    }
}

impl Config {
    /// Configuration rooted at `data_dir`, backups in `data_dir/backups`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backup_dir: data_dir.join("backups"),
            store_file: STORE_FILE_NAME.to_string(),
            data_dir,
        }
    }

    /// Moves the data directory, and the backups with it, keeping the store
    /// file name.
    pub fn set_data_dir(&mut self, data_dir: impl Into<PathBuf>) {
        self.data_dir = data_dir.into();
        self.backup_dir = self.data_dir.join("backups");
    }

    /// Reads a JSON config file, or falls back to defaults when no path is
    /// given and none exists at the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = Self::default().data_dir.join("config.json");
                if !default_path.exists() {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
                default_path
            }
        };

        info!("Loading config from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| StickyError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| StickyError::ConfigError {
            message: format!("invalid config {}: {}", path.display(), e),
        })
    }

    /// Full path of the store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_data_dir() {
        let config = Config::with_data_dir("/tmp/sn");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/sn/stickynotes.json"));
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/sn/backups"));
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"data_dir":"/var/sn","store_file":"s.json"}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/var/sn/s.json"));
    }

    #[test]
    fn backups_follow_a_configured_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"data_dir":"/var/sn"}"#).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backup_dir, PathBuf::from("/var/sn/backups"));
        assert_eq!(config.store_file, STORE_FILE_NAME);

        fs::write(&path, r#"{"data_dir":"/var/sn","backup_dir":"/mnt/bk"}"#).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backup_dir, PathBuf::from("/mnt/bk"));
    }

    #[test]
    fn data_dir_override_keeps_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"data_dir":"/var/sn","store_file":"s.json"}"#).unwrap();

        let mut config = Config::load(Some(&path)).unwrap();
        config.set_data_dir("/tmp/other");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/other/s.json"));
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/other/backups"));
    }

    #[test]
    fn load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Config::load(Some(&path)),
            Err(StickyError::ConfigError { .. })
        ));
    }
}
