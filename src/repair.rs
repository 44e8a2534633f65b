//! Automatic structural repair
//!
//! Repair works on its own copy of the document and returns a new one along
//! with one log line per action taken. It normalizes structure only; callers
//! re-diagnose the output to find out whether that was enough.
//!
//! A backup whose stored checksum verified before repair gets a fresh one
//! over the repaired envelope. A checksum that was already wrong is left as
//! it is.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::metadata::{checksum, verify_checksum, without_metadata};
use crate::model::{self, truthy_in, ARRAY_SCHEDULE_FIELDS, DEFAULT_SCHEDULE_DAYS, DEFAULT_SCHEDULE_TIME};
use crate::sink::LogSink;
use crate::version::{now_iso, VersionManager};

/// Result of a repair attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    pub success: bool,
    /// The repaired document, or as far as repair got before failing.
    /// `Null` when there was nothing to repair.
    pub repaired_data: Value,
    pub repair_log: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Repairer {
    versions: VersionManager,
}

impl Repairer {
    pub fn new(versions: VersionManager) -> Self {
        Self { versions }
    }

    pub fn repair(&self, doc: &Value) -> RepairOutcome {
        let mut log: Vec<String> = Vec::new();

        if !model::is_truthy(doc) {
            log.line("Cannot repair null or undefined backup".to_string());
            return RepairOutcome {
                success: false,
                repaired_data: Value::Null,
                repair_log: log,
            };
        }

        let mut repaired = doc.clone();
        if let Some(envelope) = repaired.as_object_mut() {
            if truthy_in(envelope, "version").is_none() {
                let detected = self.versions.detect_version(doc);
                envelope.insert("version".to_string(), Value::String(detected.clone()));
                log.line(format!("Added missing version field: {}", detected));
            }

            if truthy_in(envelope, "timestamp").is_none() {
                envelope.insert("timestamp".to_string(), Value::String(now_iso()));
                log.line("Added missing timestamp".to_string());
            }
        }

        let mut repaired = match self.versions.migrate(&repaired, &mut log) {
            Ok(migrated) => migrated,
            Err(e) => {
                tracing::warn!(error = %e, "repair aborted by migration failure");
                log.line(format!("Migration failed: {}", e));
                return RepairOutcome {
                    success: false,
                    repaired_data: repaired,
                    repair_log: log,
                };
            }
        };

        if let Some(adkar) = repaired.pointer_mut("/data/adkar").and_then(Value::as_array_mut) {
            for (index, item) in adkar.iter_mut().enumerate() {
                if let Some(item) = item.as_object_mut() {
                    encode_schedule_arrays(item, index, &mut log);
                    add_schedule_defaults(item, index, &mut log);
                }
            }
        }

        if let Some(groups) = repaired.pointer_mut("/data/groups").and_then(Value::as_array_mut) {
            for (index, group) in groups.iter_mut().enumerate() {
                if let Some(group) = group.as_object_mut() {
                    encode_settings(group, index, &mut log);
                }
            }
        }

        refresh_checksum(doc, &mut repaired, &mut log);

        tracing::info!(actions = log.len(), "repair complete");
        RepairOutcome {
            success: true,
            repaired_data: repaired,
            repair_log: log,
        }
    }
}

fn encode_schedule_arrays(item: &mut Map<String, Value>, index: usize, sink: &mut dyn LogSink) {
    for field in ARRAY_SCHEDULE_FIELDS {
        let encoded = match item.get(field) {
            Some(values @ Value::Array(_)) => values.to_string(),
            _ => continue,
        };
        item.insert(field.to_string(), Value::String(encoded));
        sink.line(format!("Adkar #{}: Converted {} array to JSON string", index + 1, field));
    }
}

/// Only `schedule_time` and `schedule_days` get defaults here; migration from
/// v1 is what fills `schedule_dates` and `schedule_months`.
fn add_schedule_defaults(item: &mut Map<String, Value>, index: usize, sink: &mut dyn LogSink) {
    for (field, default) in [
        ("schedule_time", DEFAULT_SCHEDULE_TIME),
        ("schedule_days", DEFAULT_SCHEDULE_DAYS),
    ] {
        if truthy_in(item, field).is_none() {
            item.insert(field.to_string(), Value::String(default.to_string()));
            sink.line(format!("Adkar #{}: Added default {}", index + 1, field));
        }
    }
}

fn encode_settings(group: &mut Map<String, Value>, index: usize, sink: &mut dyn LogSink) {
    let encoded = match group.get("settings") {
        Some(settings @ (Value::Object(_) | Value::Array(_))) => settings.to_string(),
        _ => return,
    };

    group.insert("settings".to_string(), Value::String(encoded));
    sink.line(format!("Group #{}: Converted settings object to JSON string", index + 1));
}

fn refresh_checksum(original: &Value, repaired: &mut Value, sink: &mut dyn LogSink) {
    if repaired == original || !verify_checksum(original) {
        return;
    }

    let fresh = checksum(&without_metadata(repaired));
    if let Some(metadata) = repaired.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert("checksum".to_string(), Value::String(fresh.to_string()));
        sink.line("Recomputed metadata checksum".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataManager;
    use serde_json::json;

    fn repair(doc: Value) -> RepairOutcome {
        Repairer::default().repair(&doc)
    }

    #[test]
    fn test_null_input_fails() {
        let outcome = repair(Value::Null);
        assert!(!outcome.success);
        assert_eq!(outcome.repaired_data, Value::Null);
        assert_eq!(outcome.repair_log, vec!["Cannot repair null or undefined backup"]);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let doc = json!({"version": "3.0.0", "data": {"groups": [{"chat_id": 1, "title": "G", "settings": {"a": 1}}]}});
        let before = doc.clone();
        let outcome = Repairer::default().repair(&doc);
        assert_eq!(doc, before);
        assert_eq!(outcome.repaired_data["data"]["groups"][0]["settings"], "{\"a\":1}");
    }

    #[test]
    fn test_unsupported_version_keeps_partial_fixes() {
        let outcome = repair(json!({"version": "0.5.0", "data": {}}));
        assert!(!outcome.success);
        assert!(outcome.repaired_data["timestamp"].is_string());
        assert_eq!(outcome.repair_log[0], "Added missing timestamp");
        assert!(outcome.repair_log.last().unwrap().starts_with("Migration failed: Unsupported backup version: 0.5.0"));
    }

    #[test]
    fn test_missing_version_and_timestamp_added() {
        let outcome = repair(json!({"data": {"categories": [{"id": 1, "name": "A"}]}}));
        assert!(outcome.success);
        assert_eq!(outcome.repair_log[0], "Added missing version field: 2.0.0");
        assert_eq!(outcome.repair_log[1], "Added missing timestamp");
        assert_eq!(outcome.repaired_data["version"], "3.0.0");
    }

    #[test]
    fn test_native_arrays_become_strings() {
        let outcome = repair(json!({
            "version": "3.0.0",
            "timestamp": "t",
            "data": {"adkar": [{"category_id": 1, "schedule_days": [1, 2], "schedule_dates": [15], "schedule_time": "08:00"}]}
        }));
        let item = &outcome.repaired_data["data"]["adkar"][0];
        assert_eq!(item["schedule_days"], "[1,2]");
        assert_eq!(item["schedule_dates"], "[15]");
        assert_eq!(
            outcome.repair_log,
            vec![
                "Detected backup version: 3.0.0",
                "Backup is already at current version",
                "Adkar #1: Converted schedule_days array to JSON string",
                "Adkar #1: Converted schedule_dates array to JSON string",
            ]
        );
    }

    #[test]
    fn test_defaults_time_and_days_only() {
        let outcome = repair(json!({"version": "3.0.0", "timestamp": "t", "data": {"adkar": [{"category_id": 1}]}}));
        let item = &outcome.repaired_data["data"]["adkar"][0];
        assert_eq!(item["schedule_time"], "12:00");
        assert_eq!(item["schedule_days"], "[0,1,2,3,4,5,6]");
        // migration backfills these two, repair does not
        assert!(item.get("schedule_dates").is_none());
        assert!(item.get("schedule_months").is_none());
    }

    #[test]
    fn test_array_settings_encoded() {
        let outcome = repair(json!({"version": "3.0.0", "timestamp": "t", "data": {"groups": [{"settings": [1]}, {"settings": "{}"}]}}));
        assert_eq!(outcome.repaired_data["data"]["groups"][0]["settings"], "[1]");
        assert_eq!(outcome.repaired_data["data"]["groups"][1]["settings"], "{}");
        assert_eq!(
            outcome.repair_log.iter().filter(|l| l.starts_with("Group #")).count(),
            1
        );
    }

    #[test]
    fn test_checksum_refreshed_after_repair() {
        let backup = MetadataManager::default().create_backup_with_metadata(
            &json!({"groups": [{"chat_id": 1, "title": "G", "settings": {"a": 1}}]}),
            "",
        );
        let outcome = repair(backup);
        assert!(verify_checksum(&outcome.repaired_data));
        assert_eq!(outcome.repair_log.last().unwrap(), "Recomputed metadata checksum");
    }

    #[test]
    fn test_untouched_backup_keeps_checksum() {
        let backup = MetadataManager::default().create_backup_with_metadata(
            &json!({"groups": [{"chat_id": 1, "title": "G", "settings": "{}"}]}),
            "",
        );
        let outcome = repair(backup.clone());
        assert_eq!(outcome.repaired_data, backup);
        assert!(!outcome.repair_log.iter().any(|l| l.contains("checksum")));
    }

    #[test]
    fn test_wrong_checksum_is_not_refreshed() {
        let mut backup = MetadataManager::default().create_backup_with_metadata(
            &json!({"groups": [{"chat_id": 1, "title": "G", "settings": {"a": 1}}]}),
            "",
        );
        backup["data"]["groups"][0]["title"] = json!("changed");
        let outcome = repair(backup);
        assert!(outcome.success);
        assert!(!verify_checksum(&outcome.repaired_data));
    }
}
