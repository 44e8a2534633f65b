//! Restore preparation
//!
//! Turns the raw bytes of an uploaded or on-disk backup into data that is
//! safe to hand to the bot's store: decoded, checksum-verified, migrated to
//! the current version and validated. Writing the data is the caller's job.

use serde::Serialize;
use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::{BackupError, Result};
use crate::metadata::without_metadata;
use crate::validate::{ValidationReport, Validator};
use crate::version::VersionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumStatus {
    /// A checksum was stored and matches
    Verified,
    /// The backup carries no checksum
    Absent,
}

/// Everything a restore needs, computed without touching the store
#[derive(Debug, Clone, Serialize)]
pub struct RestorePlan {
    pub source_version: String,
    pub checksum: ChecksumStatus,
    pub migration_log: Vec<String>,
    pub validation: ValidationReport,
    /// The migrated data block
    pub data: Value,
}

#[derive(Default)]
pub struct RestorePlanner {
    versions: VersionManager,
    validator: Validator,
}

impl RestorePlanner {
    pub fn new(versions: VersionManager) -> Self {
        Self {
            versions,
            validator: Validator::new(),
        }
    }

    pub fn prepare(&self, bytes: &[u8]) -> Result<RestorePlan> {
        let text = std::str::from_utf8(bytes)?;
        if text.trim().is_empty() {
            return Err(BackupError::EmptyInput);
        }

        let doc: Value = serde_json::from_str(text)?;
        self.prepare_value(&doc)
    }

    /// Same as [`RestorePlanner::prepare`] for an already parsed document
    pub fn prepare_value(&self, doc: &Value) -> Result<RestorePlan> {
        let checksum = verify_stored_checksum(doc)?;
        let source_version = self.versions.detect_version(doc);

        let mut migration_log: Vec<String> = Vec::new();
        let migrated = self.versions.migrate(doc, &mut migration_log)?;

        let validation = self.validator.validate_document(&migrated);
        if !validation.valid {
            return Err(BackupError::InvalidBackup(validation.error_summary()));
        }

        tracing::info!(
            source_version = %source_version,
            checksum = ?checksum,
            warnings = validation.summary.total_warnings,
            "backup ready to restore"
        );

        Ok(RestorePlan {
            source_version,
            checksum,
            migration_log,
            validation,
            data: migrated.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Decode, verify, migrate and validate a backup with the default version policy
pub fn prepare_restore(bytes: &[u8]) -> Result<RestorePlan> {
    RestorePlanner::default().prepare(bytes)
}

fn verify_stored_checksum(doc: &Value) -> Result<ChecksumStatus> {
    let stored = match doc.pointer("/metadata/checksum").and_then(Value::as_str) {
        Some(stored) if !stored.is_empty() => stored,
        _ => return Ok(ChecksumStatus::Absent),
    };

    let actual = Checksum::from_json(&without_metadata(doc));
    if actual.as_str() != stored {
        return Err(BackupError::ChecksumMismatch {
            expected: stored.to_string(),
            actual: actual.to_string(),
        });
    }

    Ok(ChecksumStatus::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataManager;
    use serde_json::json;

    #[test]
    fn test_rejects_blank_input() {
        assert!(matches!(prepare_restore(b""), Err(BackupError::EmptyInput)));
        assert!(matches!(prepare_restore(b"   \n\t  "), Err(BackupError::EmptyInput)));
    }

    #[test]
    fn test_rejects_invalid_utf8_and_json() {
        assert!(matches!(prepare_restore(&[0xff, 0xfe, 0x00]), Err(BackupError::Encoding(_))));
        assert!(matches!(prepare_restore(b"{not json"), Err(BackupError::Json(_))));
    }

    #[test]
    fn test_verified_checksum() {
        let backup = MetadataManager::default().create_backup_with_metadata(
            &json!({"categories": [{"id": 1, "name": "أذكار الصباح"}], "adkar": [], "groups": []}),
            "",
        );
        let bytes = serde_json::to_vec_pretty(&backup).unwrap();
        let plan = prepare_restore(&bytes).unwrap();
        assert_eq!(plan.checksum, ChecksumStatus::Verified);
        assert_eq!(plan.source_version, "3.0.0");
        assert_eq!(plan.data["categories"][0]["id"], 1);
    }

    #[test]
    fn test_tampered_checksum() {
        let mut backup = MetadataManager::default()
            .create_backup_with_metadata(&json!({"categories": [{"id": 1, "name": "A"}]}), "");
        backup["data"]["categories"][0]["name"] = json!("B");
        let bytes = serde_json::to_vec(&backup).unwrap();
        assert!(matches!(prepare_restore(&bytes), Err(BackupError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_legacy_backup_is_migrated() {
        let bytes = br#"{"groups": [{"chat_id": -100, "title": "G"}], "adkar": [{"category_id": 0, "type": "text"}]}"#;
        let plan = prepare_restore(bytes).unwrap();
        assert_eq!(plan.source_version, "1.0.0");
        assert_eq!(plan.checksum, ChecksumStatus::Absent);
        assert_eq!(plan.data["adkar"][0]["content_type"], "text");
        assert!(!plan.migration_log.is_empty());
    }

    #[test]
    fn test_invalid_data_is_rejected() {
        let bytes = br#"{"version": "3.0.0", "data": {"categories": [{"id": 1}]}}"#;
        let err = prepare_restore(bytes).unwrap_err();
        match err {
            BackupError::InvalidBackup(msg) => assert!(msg.contains("Category #1 is missing name")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let bytes = br#"{"version": "9.9.9", "data": {}}"#;
        assert!(prepare_restore(bytes).unwrap_err().is_unsupported_version());
    }
}
