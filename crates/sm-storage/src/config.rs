// config.rs — Storage configuration (storage.toml or the [storage] table
// of the manager config).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Where and how the SQLite database is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; created on first open.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// How long a writer waits for a competing lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("secmgrstorage.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl StorageConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let config_error = |reason: String| StorageError::Config {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        toml::from_str(&content).map_err(|e| config_error(e.to_string()))
    }

    /// Load from a TOML file, falling back to defaults if it is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.path, PathBuf::from("secmgrstorage.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "path = \"/var/lib/secmgr/fleet.db\"\n").unwrap();

        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/secmgr/fleet.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "busy_timeout_ms = \"soon\"\n").unwrap();

        assert!(matches!(
            StorageConfig::load(&path),
            Err(StorageError::Config { .. })
        ));
        assert_eq!(StorageConfig::load_or_default(&path), StorageConfig::default());
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, StorageConfig::default());
    }
}
