//! Field names, defaults and shape resolution for backup entities
//!
//! Backups are handled as `serde_json::Value` documents because the whole
//! point is to inspect input that may not match the schema. Presence checks
//! follow the bot's storage rules: a field counts as set only when
//! it is "truthy" (not null, `false`, `0`, `""`), except identifier fields
//! where a numeric `0` is a legitimate value.

use serde_json::{Map, Value};

/// Allowed values for `content_type`
pub const CONTENT_TYPES: [&str; 5] = ["text", "audio", "image", "video", "pdf"];

pub const DEFAULT_CONTENT_TYPE: &str = "text";
pub const DEFAULT_SCHEDULE_DAYS: &str = "[0,1,2,3,4,5,6]";
pub const DEFAULT_SCHEDULE_DATES: &str = "[]";
pub const DEFAULT_SCHEDULE_MONTHS: &str = "[]";
pub const DEFAULT_SCHEDULE_TIME: &str = "12:00";
pub const DEFAULT_SCHEDULE_TYPE: &str = "daily";
pub const DEFAULT_GROUP_SETTINGS: &str = "{}";

/// The three restorable collections, in the order they are reported
pub const COLLECTIONS: [&str; 3] = ["categories", "adkar", "groups"];

/// Schedule fields that hold a JSON array (natively or encoded as a string)
pub const ARRAY_SCHEDULE_FIELDS: [&str; 3] = ["schedule_days", "schedule_dates", "schedule_months"];

/// Legacy adkar field names and their current replacements
pub const LEGACY_RENAMES: [(&str, &str); 2] = [("type", "content_type"), ("days_of_week", "schedule_days")];

/// JavaScript-style truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Look up `key` and return it only when truthy
pub fn truthy<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| is_truthy(v))
}

/// Same as [`truthy`] over a map
pub fn truthy_in<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| is_truthy(v))
}

/// Whether an identifier field is set. `0` counts, null and absent don't.
pub fn has_identifier(value: Option<&Value>) -> bool {
    match value {
        Some(v) if is_truthy(v) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Render a value for a diagnostic message: strings verbatim, others as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which naming generation an adkar item uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdkarShape {
    /// Carries `type` and/or `days_of_week` that still need renaming
    LegacyV1Shape,
    /// Uses the current field names only
    CurrentShape,
}

/// Whether any of the three collections holds something. An empty array
/// counts as nothing, any other truthy value counts as content.
pub fn has_entities(data: &Value) -> bool {
    COLLECTIONS.iter().any(|&key| match truthy(data, key) {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
        None => false,
    })
}

/// Legacy fields of `item` that would be renamed: the old name is set and the
/// new one is not. When both are set the new name wins and nothing moves.
fn pending_renames(item: &Map<String, Value>) -> Vec<(&'static str, &'static str)> {
    LEGACY_RENAMES
        .iter()
        .copied()
        .filter(|(old, new)| truthy_in(item, old).is_some() && truthy_in(item, new).is_none())
        .collect()
}

/// An adkar item with its legacy aliases resolved to the canonical fields
///
/// Resolution happens once here so neither the validator nor the migration
/// code has to re-derive which name is in use.
#[derive(Debug, Clone)]
pub struct AdkarView<'a> {
    pub shape: AdkarShape,
    /// `(legacy, current)` pairs still to move, empty for [`AdkarShape::CurrentShape`]
    pub renames: Vec<(&'static str, &'static str)>,
    pub category_id: Option<&'a Value>,
    pub content_type: Option<&'a Value>,
    pub schedule_days: Option<&'a Value>,
    pub schedule_dates: Option<&'a Value>,
    pub schedule_months: Option<&'a Value>,
    pub schedule_time: Option<&'a Value>,
}

impl<'a> AdkarView<'a> {
    pub fn resolve(item: &'a Map<String, Value>) -> Self {
        let renames = pending_renames(item);
        let shape = if renames.is_empty() {
            AdkarShape::CurrentShape
        } else {
            AdkarShape::LegacyV1Shape
        };

        Self {
            shape,
            renames,
            category_id: item.get("category_id"),
            content_type: truthy_in(item, "content_type").or_else(|| truthy_in(item, "type")),
            schedule_days: truthy_in(item, "schedule_days").or_else(|| truthy_in(item, "days_of_week")),
            schedule_dates: truthy_in(item, "schedule_dates"),
            schedule_months: truthy_in(item, "schedule_months"),
            schedule_time: truthy_in(item, "schedule_time"),
        }
    }

    /// Resolved value of one of the array-typed schedule fields
    pub fn array_field(&self, field: &str) -> Option<&'a Value> {
        match field {
            "schedule_days" => self.schedule_days,
            "schedule_dates" => self.schedule_dates,
            "schedule_months" => self.schedule_months,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(-5)));
    }

    #[test]
    fn test_identifier_zero_is_present() {
        assert!(has_identifier(Some(&json!(0))));
        assert!(has_identifier(Some(&json!(-100123))));
        assert!(!has_identifier(Some(&json!(null))));
        assert!(!has_identifier(None));
        assert!(!has_identifier(Some(&json!(""))));
    }

    #[test]
    fn test_legacy_shape_resolution() {
        let item = as_map(json!({"type": "audio", "days_of_week": "[0,1]"}));
        let view = AdkarView::resolve(&item);
        assert_eq!(view.shape, AdkarShape::LegacyV1Shape);
        assert_eq!(view.content_type, Some(&json!("audio")));
        assert_eq!(view.schedule_days, Some(&json!("[0,1]")));
        assert_eq!(view.renames, vec![("type", "content_type"), ("days_of_week", "schedule_days")]);
    }

    #[test]
    fn test_new_names_take_precedence() {
        let item = as_map(json!({"type": "audio", "content_type": "video"}));
        let view = AdkarView::resolve(&item);
        assert_eq!(view.shape, AdkarShape::CurrentShape);
        assert_eq!(view.content_type, Some(&json!("video")));
        assert!(view.renames.is_empty());
    }

    #[test]
    fn test_has_entities() {
        assert!(!has_entities(&json!({"categories": [], "adkar": [], "groups": []})));
        assert!(!has_entities(&json!({})));
        assert!(!has_entities(&json!("not an object")));
        assert!(has_entities(&json!({"adkar": [{"id": 1}]})));
        assert!(has_entities(&json!({"groups": "oops"})));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("25:99")), "25:99");
        assert_eq!(display_value(&json!(1200)), "1200");
    }
}
