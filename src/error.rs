//! Error types for the backup manager

use thiserror::Error;

/// Result type for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Backup manager errors
///
/// Data-quality problems inside a backup are not errors: they are reported
/// as issues by the validator and the diagnostic engine.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Unsupported backup version: {version}. Supported versions: {supported}")]
    UnsupportedVersion { version: String, supported: String },

    #[error("No migration path from version {from} to {to}")]
    NoMigrationPath { from: String, to: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Backup is empty")]
    EmptyInput,

    #[error("Backup is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl BackupError {
    /// Whether this error means the backup can never be migrated
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::UnsupportedVersion { .. } | Self::NoMigrationPath { .. })
    }
}
