// config.rs — Manager configuration (manager.toml).
//
// ```toml
// issuer_name = "building-7"
// identity_validity_secs = 315360000
// sync_workers = 4
//
// [storage]
// path = "/var/lib/secmgr/fleet.db"
// ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sm_storage::StorageConfig;

use crate::error::ManagerError;

const YEAR_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Common name written as the issuer of every certificate.
    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,

    #[serde(default = "default_identity_validity_secs")]
    pub identity_validity_secs: u64,

    #[serde(default = "default_membership_validity_secs")]
    pub membership_validity_secs: u64,

    /// Threads used by a fleet synchronization. 0 behaves as 1.
    #[serde(default = "default_sync_workers")]
    pub sync_workers: usize,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            issuer_name: default_issuer_name(),
            identity_validity_secs: default_identity_validity_secs(),
            membership_validity_secs: default_membership_validity_secs(),
            sync_workers: default_sync_workers(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_issuer_name() -> String {
    "security-manager".to_string()
}

fn default_identity_validity_secs() -> u64 {
    10 * YEAR_SECS
}

fn default_membership_validity_secs() -> u64 {
    YEAR_SECS
}

fn default_sync_workers() -> usize {
    8
}

impl ManagerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ManagerError> {
        let config_error = |reason: String| ManagerError::Config {
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
