//! Configuration for the backup manager
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (backup.toml)
//! - Environment variables (ADKAR_BACKUP__*)
//!
//! ## Example config file (backup.toml):
//! ```toml
//! [versions]
//! current = "3.0.0"
//! supported = ["1.0", "1.0.0", "2.0", "2.0.0", "3.0", "3.0.0"]
//!
//! [limits]
//! warn_size_mb = 5.0
//! max_size_mb = 10.0
//!
//! [store]
//! dir = "./backups"
//! keep = 10
//!
//! [metadata]
//! app_version = "1.4.0"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::diagnostic::{Diagnostician, SizeLimits};
use crate::error::Result;
use crate::metadata::MetadataManager;
use crate::repair::Repairer;
use crate::store::SnapshotStore;
use crate::version::{VersionManager, VersionPolicy};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Current version and the allow-list
    #[serde(default)]
    pub versions: VersionPolicy,

    /// Serialized size thresholds
    #[serde(default)]
    pub limits: SizeLimits,

    /// Snapshot directory and retention
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `backup-*.json` snapshots
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// How many snapshots `prune` keeps
    #[serde(default = "default_keep")]
    pub keep: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Recorded as `appVersion` in every snapshot
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_keep() -> usize {
    10
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            keep: default_keep(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
        }
    }
}

impl BackupConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["backup.toml", ".backup.toml", "config/backup.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "adkar", "backup") {
            let xdg_config = config_dir.config_dir().join("backup.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ADKAR_BACKUP__LIMITS__MAX_SIZE_MB=20
        builder = builder.add_source(
            Environment::with_prefix("ADKAR_BACKUP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Version manager for the configured policy
    pub fn version_manager(&self) -> Result<VersionManager> {
        VersionManager::new(self.versions.clone())
    }

    pub fn diagnostician(&self) -> Result<Diagnostician> {
        Ok(Diagnostician::new(self.version_manager()?, self.limits))
    }

    pub fn repairer(&self) -> Result<Repairer> {
        Ok(Repairer::new(self.version_manager()?))
    }

    pub fn metadata_manager(&self) -> MetadataManager {
        MetadataManager::new(self.metadata.app_version.clone(), self.versions.current.clone())
    }

    /// Snapshot store rooted at the configured directory
    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(self.store_dir(), self.store.keep)
            .with_metadata(self.metadata_manager())
    }

    /// Store directory, resolved against the working directory when relative
    pub fn store_dir(&self) -> PathBuf {
        if self.store.dir.is_absolute() {
            self.store.dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BackupConfig::default();
        assert_eq!(config.versions.current, "3.0.0");
        assert_eq!(config.versions.supported.len(), 6);
        assert_eq!(config.limits.max_size_mb, 10.0);
        assert_eq!(config.store.keep, 10);
        assert!(config.version_manager().is_ok());
    }

    #[test]
    fn test_serialize_config() {
        let config = BackupConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[versions]"));
        assert!(toml_str.contains("[limits]"));
        assert!(toml_str.contains("[store]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[limits]\nmax_size_mb = 2.5\n\n[store]\nkeep = 3\n",
        )
        .unwrap();

        let config = BackupConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.limits.max_size_mb, 2.5);
        assert_eq!(config.limits.warn_size_mb, 5.0);
        assert_eq!(config.store.keep, 3);
        assert_eq!(config.versions.current, "3.0.0");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = BackupConfig::default();
        config.metadata.app_version = "2.1.0".to_string();
        config.save(&path).unwrap();

        let loaded = BackupConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.metadata.app_version, "2.1.0");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(BackupConfig::load_from(Some("/nonexistent/backup.toml")).is_err());
    }
}
