//! Backup metadata: checksums, statistics and descriptive fields
//!
//! The checksum covers the whole envelope except the `metadata` key itself.
//! It is computed before metadata is attached and verified by recomputing
//! over the envelope with `metadata` removed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checksum::Checksum;
use crate::model::{self, truthy};
use crate::version::now_iso;

/// Entity counts and serialized size of a data block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub groups: usize,
    pub adkar: usize,
    pub categories: usize,
    pub total_size: usize,
    #[serde(default)]
    pub formatted_size: String,
}

/// Where the backup was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub arch: String,
}

impl SystemInfo {
    fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Metadata attached to a backup envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub created_at: String,
    pub app_version: String,
    pub backup_version: String,
    #[serde(default)]
    pub description: String,
    pub statistics: Statistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
}

/// Metadata pulled out of an existing backup for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub version: String,
    pub timestamp: String,
    pub created_at: Option<String>,
    pub app_version: Option<String>,
    pub description: String,
    pub statistics: Statistics,
    pub has_checksum: bool,
    pub checksum_valid: Option<bool>,
}

/// Outcome of [`validate_metadata`]
#[derive(Debug, Clone, Serialize)]
pub struct MetadataValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// SHA-256 over the compact serialization of `data`
pub fn checksum(data: &Value) -> Checksum {
    Checksum::from_json(data)
}

/// Recompute the envelope checksum and compare it with the stored one.
/// Returns false when no checksum is stored.
pub fn verify_checksum(envelope: &Value) -> bool {
    let Some(stored) = envelope.pointer("/metadata/checksum").and_then(Value::as_str) else {
        return false;
    };
    if stored.is_empty() {
        return false;
    }

    Checksum::from(stored).verify_json(&without_metadata(envelope))
}

/// The envelope with its `metadata` key removed
pub fn without_metadata(envelope: &Value) -> Value {
    match envelope {
        Value::Object(map) => {
            let stripped: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| k.as_str() != "metadata")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(stripped)
        }
        other => other.clone(),
    }
}

/// Count the entities of a data block and measure its serialized size
pub fn statistics(data: &Value) -> Statistics {
    let count = |key: &str| data.get(key).and_then(Value::as_array).map(Vec::len).unwrap_or(0);
    let total_size = serde_json::to_string(data).map(|s| s.len()).unwrap_or(0);

    Statistics {
        groups: count("groups"),
        adkar: count("adkar"),
        categories: count("categories"),
        total_size,
        formatted_size: format_bytes(total_size as u64),
    }
}

/// Human-readable size, 1024-based, at most two decimals
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", scaled);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Builds metadata and metadata-carrying envelopes
#[derive(Debug, Clone)]
pub struct MetadataManager {
    app_version: String,
    backup_version: String,
}

impl Default for MetadataManager {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"), "3.0.0")
    }
}

impl MetadataManager {
    pub fn new(app_version: impl Into<String>, backup_version: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
            backup_version: backup_version.into(),
        }
    }

    /// Metadata for a data block, without checksum
    pub fn create_metadata(&self, data: &Value, description: &str) -> Metadata {
        Metadata {
            created_at: now_iso(),
            app_version: self.app_version.clone(),
            backup_version: self.backup_version.clone(),
            description: description.to_string(),
            statistics: statistics(data),
            system: Some(SystemInfo::current()),
            checksum: None,
        }
    }

    /// Wrap a data block into a current-version envelope with metadata and
    /// checksum attached.
    pub fn create_backup_with_metadata(&self, data: &Value, description: &str) -> Value {
        let mut envelope = Map::new();
        envelope.insert("version".to_string(), Value::String(self.backup_version.clone()));
        envelope.insert("timestamp".to_string(), Value::String(now_iso()));
        envelope.insert("data".to_string(), data.clone());

        let mut metadata = self.create_metadata(data, description);
        metadata.checksum = Some(checksum(&Value::Object(envelope.clone())));

        let metadata = serde_json::to_value(&metadata).unwrap_or(Value::Null);
        envelope.insert("metadata".to_string(), metadata);

        tracing::debug!(
            backup_version = %self.backup_version,
            description,
            "created backup envelope"
        );
        Value::Object(envelope)
    }
}

/// Summarize an existing backup's metadata. Returns `None` for a null backup.
pub fn extract_metadata(doc: &Value) -> Option<BackupSummary> {
    if !model::is_truthy(doc) {
        return None;
    }

    let text = |v: Option<&Value>| v.map(model::display_value);
    let mut summary = BackupSummary {
        version: text(truthy(doc, "version")).unwrap_or_else(|| "unknown".to_string()),
        timestamp: text(truthy(doc, "timestamp")).unwrap_or_else(|| "unknown".to_string()),
        created_at: None,
        app_version: None,
        description: String::new(),
        statistics: Statistics {
            formatted_size: format_bytes(0),
            ..Statistics::default()
        },
        has_checksum: false,
        checksum_valid: None,
    };

    if let Some(metadata) = truthy(doc, "metadata") {
        summary.created_at = text(truthy(metadata, "createdAt")).or_else(|| text(truthy(doc, "timestamp")));
        summary.app_version = text(truthy(metadata, "appVersion"));
        summary.description = text(truthy(metadata, "description")).unwrap_or_default();
        summary.has_checksum = truthy(metadata, "checksum").is_some();

        if summary.has_checksum {
            summary.checksum_valid = Some(verify_checksum(doc));
        }

        if let Some(stats) = truthy(metadata, "statistics")
            .and_then(|s| serde_json::from_value::<Statistics>(s.clone()).ok())
        {
            summary.statistics = stats;
        }
    }

    if let Some(data) = truthy(doc, "data") {
        if summary.statistics.groups == 0 && summary.statistics.adkar == 0 {
            summary.statistics = statistics(data);
        }
    }

    Some(summary)
}

/// Check that a metadata object carries the fields a restore relies on
pub fn validate_metadata(metadata: &Value) -> MetadataValidation {
    let mut errors = Vec::new();

    if !model::is_truthy(metadata) {
        errors.push("Metadata is missing".to_string());
        return MetadataValidation { valid: false, errors };
    }

    if truthy(metadata, "createdAt").is_none() {
        errors.push("Missing createdAt in metadata".to_string());
    }

    if truthy(metadata, "backupVersion").is_none() && truthy(metadata, "version").is_none() {
        errors.push("Missing version in metadata".to_string());
    }

    if let Some(stats) = truthy(metadata, "statistics") {
        for counter in ["groups", "adkar", "categories"] {
            if !stats.get(counter).map(Value::is_number).unwrap_or(false) {
                errors.push(format!("Invalid statistics.{} - must be a number", counter));
            }
        }
    }

    MetadataValidation {
        valid: errors.is_empty(),
        errors,
    }
}
