//! Backup schema versions and the migration chain
//!
//! Three generations of backup exist:
//!
//! ```text
//! 1.x  { groups: [], adkar: [], categories: [] }            flat, legacy field names
//! 2.x  { version, timestamp, data: { ... } }                nested, names may be legacy
//! 3.x  { version, timestamp, data: { ... }, metadata? }     current
//! ```
//!
//! Every older generation migrates to the current one in a single step.

use chrono::{SecondsFormat, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{BackupError, Result};
use crate::model::{
    self, truthy, truthy_in, AdkarShape, AdkarView, DEFAULT_SCHEDULE_DATES, DEFAULT_SCHEDULE_DAYS,
    DEFAULT_SCHEDULE_MONTHS, DEFAULT_SCHEDULE_TIME, DEFAULT_SCHEDULE_TYPE,
};
use crate::sink::LogSink;

/// Returned by [`VersionManager::detect_version`] when nothing matches
pub const UNKNOWN_VERSION: &str = "unknown";

/// Which versions exist and which one is current
///
/// Membership in `supported` is an exact string match: "1.0" and "1.0.0"
/// are separate tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    #[serde(default = "default_current")]
    pub current: String,

    #[serde(default = "default_supported")]
    pub supported: Vec<String>,
}

fn default_current() -> String {
    "3.0.0".to_string()
}

fn default_supported() -> Vec<String> {
    ["1.0", "1.0.0", "2.0", "2.0.0", "3.0", "3.0.0"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            current: default_current(),
            supported: default_supported(),
        }
    }
}

/// Version metadata for display
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub current: String,
    pub supported: Vec<String>,
    pub description: String,
}

/// Parse a version token leniently: `v` prefix allowed, "1.0" means 1.0.0
pub fn parse_version(token: &str) -> Option<Version> {
    let token = token.strip_prefix('v').unwrap_or(token);
    if let Ok(version) = Version::parse(token) {
        return Some(version);
    }

    let parts: Vec<u64> = token
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        _ => None,
    }
}

/// Detects, checks and migrates backup schema versions
#[derive(Debug, Clone)]
pub struct VersionManager {
    policy: VersionPolicy,
    current: Version,
}

impl Default for VersionManager {
    fn default() -> Self {
        Self {
            policy: VersionPolicy::default(),
            current: Version::new(3, 0, 0),
        }
    }
}

impl VersionManager {
    /// Build a manager from a policy. The current version must parse and be
    /// in the allow-list.
    pub fn new(policy: VersionPolicy) -> Result<Self> {
        let current = parse_version(&policy.current)
            .ok_or_else(|| BackupError::InvalidVersion(policy.current.clone()))?;

        if !policy.supported.contains(&policy.current) {
            return Err(BackupError::InvalidVersion(format!(
                "current version {} is not in the supported list",
                policy.current
            )));
        }

        Ok(Self { policy, current })
    }

    pub fn current_version(&self) -> &str {
        &self.policy.current
    }

    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            current: self.policy.current.clone(),
            supported: self.policy.supported.clone(),
            description: "Backup version management for the adkar bot".to_string(),
        }
    }

    /// Detect the schema version of a backup from its `version` field, or
    /// from its shape when the field is missing.
    pub fn detect_version(&self, doc: &Value) -> String {
        if let Some(version) = truthy(doc, "version") {
            return model::display_value(version);
        }

        if truthy(doc, "data").is_some() {
            "2.0.0".to_string()
        } else if ["groups", "adkar", "categories"].iter().any(|k| truthy(doc, k).is_some()) {
            "1.0.0".to_string()
        } else {
            UNKNOWN_VERSION.to_string()
        }
    }

    pub fn is_supported(&self, version: &str) -> bool {
        self.policy.supported.iter().any(|v| v == version)
    }

    /// Same schema as the current version ("3.0" counts as "3.0.0")
    pub fn is_current(&self, version: &str) -> bool {
        version == self.policy.current || parse_version(version).as_ref() == Some(&self.current)
    }

    /// Semver-older than the current version. Unparseable tokens are not older.
    pub fn is_older(&self, version: &str) -> bool {
        parse_version(version).map(|v| v < self.current).unwrap_or(false)
    }

    pub fn supported_list(&self) -> String {
        self.policy.supported.join(", ")
    }

    /// Migrate a backup to the current version
    ///
    /// Returns a new document; the input is never touched. Running it again
    /// on its own output is a no-op.
    pub fn migrate(&self, doc: &Value, sink: &mut dyn LogSink) -> Result<Value> {
        let version = self.detect_version(doc);
        sink.line(format!("Detected backup version: {}", version));

        if !self.is_supported(&version) {
            tracing::warn!(version = %version, "refusing to migrate unsupported backup");
            return Err(BackupError::UnsupportedVersion {
                version,
                supported: self.supported_list(),
            });
        }

        if self.is_current(&version) {
            sink.line("Backup is already at current version".to_string());
            return Ok(doc.clone());
        }

        let major = parse_version(&version).map(|v| v.major);
        tracing::debug!(from = %version, to = %self.policy.current, "migrating backup");

        match major {
            Some(1) => Ok(self.migrate_v1(doc, sink)),
            Some(2) => Ok(self.migrate_v2(doc, sink)),
            Some(m) if m == self.current.major => {
                sink.line(format!("Version {} shares the current schema, nothing to migrate", version));
                Ok(doc.clone())
            }
            _ => Err(BackupError::NoMigrationPath {
                from: version,
                to: self.policy.current.clone(),
            }),
        }
    }

    /// v1 -> current: wrap the flat collections into `data`, rename legacy
    /// fields and backfill every schedule default.
    fn migrate_v1(&self, doc: &Value, sink: &mut dyn LogSink) -> Value {
        sink.line(format!("Migrating backup from v1.0 to v{}", self.policy.current));

        let mut data = Map::new();
        for key in model::COLLECTIONS {
            data.insert(key.to_string(), collection_or_empty(doc, key));
        }
        sink.line("Wrapped top-level groups, adkar and categories into data".to_string());

        let mut envelope = self.envelope(doc, Value::Object(data), sink);
        if let Some(adkar) = envelope.pointer_mut("/data/adkar").and_then(Value::as_array_mut) {
            for (index, item) in adkar.iter_mut().enumerate() {
                if let Some(item) = item.as_object_mut() {
                    rename_legacy_fields(item, index, sink);
                    backfill_schedule_defaults(item, index, sink);
                }
            }
        }

        sink.line(format!("Migration complete: v1.0 -> v{}", self.policy.current));
        envelope
    }

    /// v2 -> current: keep `data` as it is, rename legacy fields only.
    fn migrate_v2(&self, doc: &Value, sink: &mut dyn LogSink) -> Value {
        sink.line(format!("Migrating backup from v2.0 to v{}", self.policy.current));

        let data = match truthy(doc, "data") {
            Some(data) => data.clone(),
            None => json!({"categories": [], "adkar": [], "groups": []}),
        };

        let mut envelope = self.envelope(doc, data, sink);
        if let Some(adkar) = envelope.pointer_mut("/data/adkar").and_then(Value::as_array_mut) {
            for (index, item) in adkar.iter_mut().enumerate() {
                if let Some(item) = item.as_object_mut() {
                    rename_legacy_fields(item, index, sink);
                }
            }
        }

        sink.line(format!("Migration complete: v2.0 -> v{}", self.policy.current));
        envelope
    }

    fn envelope(&self, doc: &Value, data: Value, sink: &mut dyn LogSink) -> Value {
        let timestamp = match truthy(doc, "timestamp") {
            Some(ts) => ts.clone(),
            None => {
                sink.line("Added missing timestamp during migration".to_string());
                Value::String(now_iso())
            }
        };

        let mut envelope = Map::new();
        envelope.insert("version".to_string(), Value::String(self.policy.current.clone()));
        envelope.insert("timestamp".to_string(), timestamp);
        envelope.insert("data".to_string(), data);
        if let Some(metadata) = truthy(doc, "metadata") {
            envelope.insert("metadata".to_string(), metadata.clone());
        }
        Value::Object(envelope)
    }
}

/// Current time as ISO-8601 with millisecond precision
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn collection_or_empty(doc: &Value, key: &str) -> Value {
    truthy(doc, key).cloned().unwrap_or_else(|| Value::Array(Vec::new()))
}

/// Rename `type` -> `content_type` and `days_of_week` -> `schedule_days`
/// when the new name is not already set. The renamed field moves to the end
/// of the item.
pub(crate) fn rename_legacy_fields(item: &mut Map<String, Value>, index: usize, sink: &mut dyn LogSink) {
    let AdkarView { shape, renames, .. } = AdkarView::resolve(item);
    if shape == AdkarShape::CurrentShape {
        return;
    }

    for (old, new) in renames {
        if let Some(value) = item.shift_remove(old) {
            item.insert(new.to_string(), value);
            sink.line(format!("Migrated adkar #{}: {} -> {}", index + 1, old, new));
        }
    }
}

fn backfill_schedule_defaults(item: &mut Map<String, Value>, index: usize, sink: &mut dyn LogSink) {
    let defaults = [
        ("schedule_days", DEFAULT_SCHEDULE_DAYS),
        ("schedule_dates", DEFAULT_SCHEDULE_DATES),
        ("schedule_months", DEFAULT_SCHEDULE_MONTHS),
        ("schedule_time", DEFAULT_SCHEDULE_TIME),
        ("schedule_type", DEFAULT_SCHEDULE_TYPE),
    ];

    for (field, default) in defaults {
        if truthy_in(item, field).is_none() {
            item.insert(field.to_string(), Value::String(default.to_string()));
            sink.line(format!("Adkar #{}: added default {} = {}", index + 1, field, default));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_version("1.0"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_version("v2.1.3"), Some(Version::new(2, 1, 3)));
        assert_eq!(parse_version("3"), Some(Version::new(3, 0, 0)));
        assert_eq!(parse_version("unknown"), None);
    }

    #[test]
    fn test_detect_version() {
        let vm = VersionManager::default();
        assert_eq!(vm.detect_version(&json!({"version": "2.0"})), "2.0");
        assert_eq!(vm.detect_version(&json!({"data": {}})), "2.0.0");
        assert_eq!(vm.detect_version(&json!({"groups": []})), "1.0.0");
        assert_eq!(vm.detect_version(&json!({"other": 1})), UNKNOWN_VERSION);
        assert_eq!(vm.detect_version(&json!(null)), UNKNOWN_VERSION);
    }

    #[test]
    fn test_supported_is_exact_match() {
        let vm = VersionManager::default();
        assert!(vm.is_supported("1.0"));
        assert!(vm.is_supported("1.0.0"));
        assert!(!vm.is_supported("1.0.1"));
        assert!(!vm.is_supported("v1.0.0"));
    }

    #[test]
    fn test_unsupported_version_fails() {
        let vm = VersionManager::default();
        let err = vm.migrate(&json!({"version": "0.5.0", "data": {}}), &mut NullSink).unwrap_err();
        assert!(err.is_unsupported_version());
    }

    #[test]
    fn test_current_version_is_noop() {
        let vm = VersionManager::default();
        let doc = json!({"version": "3.0.0", "timestamp": "t", "data": {"adkar": [{"type": "audio"}]}});
        let mut log: Vec<String> = Vec::new();
        let migrated = vm.migrate(&doc, &mut log).unwrap();
        assert_eq!(migrated, doc);
        assert!(log.iter().any(|l| l.contains("already at current version")));
    }

    #[test]
    fn test_v1_backfills_defaults() {
        let vm = VersionManager::default();
        let doc = json!({"timestamp": "2024-01-01T00:00:00.000Z", "adkar": [{"id": 1, "category_id": 1}]});
        let migrated = vm.migrate(&doc, &mut NullSink).unwrap();
        let item = &migrated["data"]["adkar"][0];
        assert_eq!(item["schedule_days"], DEFAULT_SCHEDULE_DAYS);
        assert_eq!(item["schedule_dates"], DEFAULT_SCHEDULE_DATES);
        assert_eq!(item["schedule_months"], DEFAULT_SCHEDULE_MONTHS);
        assert_eq!(item["schedule_time"], DEFAULT_SCHEDULE_TIME);
        assert_eq!(item["schedule_type"], DEFAULT_SCHEDULE_TYPE);
        assert_eq!(migrated["data"]["groups"], json!([]));
        assert_eq!(migrated["timestamp"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_v2_renames_without_defaults() {
        let vm = VersionManager::default();
        let doc = json!({"version": "2.0", "data": {"adkar": [{"id": 1, "type": "pdf"}]}});
        let mut log: Vec<String> = Vec::new();
        let migrated = vm.migrate(&doc, &mut log).unwrap();
        let item = &migrated["data"]["adkar"][0];
        assert_eq!(item["content_type"], "pdf");
        assert!(item.get("type").is_none());
        assert!(item.get("schedule_time").is_none());
        assert_eq!(migrated["version"], "3.0.0");
        assert_eq!(log.iter().filter(|l| l.contains("type -> content_type")).count(), 1);
    }

    #[test]
    fn test_renamed_field_moves_to_end() {
        let vm = VersionManager::default();
        let doc = json!({"version": "2.0", "data": {"adkar": [{"id": 1, "type": "pdf", "category_id": 2}]}});
        let migrated = vm.migrate(&doc, &mut NullSink).unwrap();
        let keys: Vec<&str> = migrated["data"]["adkar"][0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["id", "category_id", "content_type"]);

        let top: Vec<&str> = migrated.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(top, vec!["version", "timestamp", "data"]);
    }

    #[test]
    fn test_each_default_logged_once() {
        let vm = VersionManager::default();
        let doc = json!({"adkar": [{"category_id": 1, "schedule_time": "08:00"}]});
        let mut log: Vec<String> = Vec::new();
        vm.migrate(&doc, &mut log).unwrap();
        let defaults: Vec<_> = log.iter().filter(|l| l.contains("added default")).collect();
        assert_eq!(defaults.len(), 4);
        assert!(!defaults.iter().any(|l| l.contains("schedule_time")));
    }

    #[test]
    fn test_version_info_reflects_policy() {
        let info = VersionManager::default().version_info();
        assert_eq!(info.current, "3.0.0");
        assert_eq!(info.supported.len(), 6);
        assert!(info.supported.contains(&"1.0".to_string()));
    }

    #[test]
    fn test_is_older() {
        let vm = VersionManager::default();
        assert!(vm.is_older("1.0"));
        assert!(vm.is_older("v2.0.0"));
        assert!(!vm.is_older("3.0"));
        assert!(!vm.is_older("3.1.0"));
        assert!(!vm.is_older("unknown"));
    }

    #[test]
    fn test_policy_must_list_current() {
        let policy = VersionPolicy {
            current: "4.0.0".to_string(),
            supported: vec!["3.0.0".to_string()],
        };
        assert!(matches!(VersionManager::new(policy), Err(BackupError::InvalidVersion(_))));
    }

    #[test]
    fn test_no_migration_path_for_future_major() {
        let policy = VersionPolicy {
            current: "3.0.0".to_string(),
            supported: vec!["3.0.0".to_string(), "0.9".to_string()],
        };
        let vm = VersionManager::new(policy).unwrap();
        let err = vm.migrate(&json!({"version": "0.9", "data": {}}), &mut NullSink).unwrap_err();
        assert!(matches!(err, BackupError::NoMigrationPath { .. }));
    }
}
