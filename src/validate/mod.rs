//! Field-level backup validation
//!
//! Each entity validator takes one item, its 0-based index and a shared
//! [`ValidationLog`]. Validators never fail and never return anything: they
//! only append entries to the log, so one pass collects every problem in the
//! document.
//!
//! ## Rules
//! 1. **Adkar**: `category_id` required (0 allowed), `content_type` in the
//!    allowed set after alias resolution, schedule arrays either native
//!    arrays or JSON strings holding arrays, `schedule_time` in 24h `H:MM`.
//! 2. **Groups**: `chat_id` required (0 allowed), `title` required, string
//!    `settings` must parse as JSON.
//! 3. **Categories**: `name` required.
//!
//! An empty document is valid and only produces a warning.

use std::fmt::Write as _;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::model::{
    self, has_identifier, truthy, AdkarView, ARRAY_SCHEDULE_FIELDS, COLLECTIONS, CONTENT_TYPES,
    DEFAULT_CONTENT_TYPE, DEFAULT_SCHEDULE_TIME,
};

/// 24-hour time, hour with or without leading zero
pub const SCHEDULE_TIME_PATTERN: &str = r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryLevel {
    Error,
    Warning,
    Info,
}

/// One message recorded by a validator
#[derive(Debug, Clone, Serialize)]
pub struct ValidationEntry {
    pub level: EntryLevel,
    pub message: String,
    pub field: Option<String>,
    pub suggestion: Option<String>,
}

/// Append-only accumulator shared by the entity validators
#[derive(Debug, Default)]
pub struct ValidationLog {
    pub errors: Vec<ValidationEntry>,
    pub warnings: Vec<ValidationEntry>,
    pub info: Vec<ValidationEntry>,
}

impl ValidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, field: Option<&str>, suggestion: Option<&str>) {
        self.errors.push(ValidationEntry {
            level: EntryLevel::Error,
            message: message.into(),
            field: field.map(str::to_string),
            suggestion: suggestion.map(str::to_string),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>, field: Option<&str>) {
        self.warnings.push(ValidationEntry {
            level: EntryLevel::Warning,
            message: message.into(),
            field: field.map(str::to_string),
            suggestion: None,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.info.push(ValidationEntry {
            level: EntryLevel::Info,
            message: message.into(),
            field: None,
            suggestion: None,
        });
    }

    pub fn report(self) -> ValidationReport {
        let summary = ValidationSummary {
            total_errors: self.errors.len(),
            total_warnings: self.warnings.len(),
            total_info: self.info.len(),
        };

        ValidationReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            info: self.info,
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub total_info: usize,
}

/// Result of validating a whole document
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationEntry>,
    pub warnings: Vec<ValidationEntry>,
    pub info: Vec<ValidationEntry>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// First error messages joined, for error values
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "\n📊 Validation Report\n{}", rule);

        if !self.info.is_empty() {
            let _ = writeln!(out, "\n📌 Information:");
            for item in &self.info {
                let _ = writeln!(out, "  ℹ️  {}", item.message);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\n⚠️  Warnings:");
            for item in &self.warnings {
                let _ = writeln!(out, "  ⚠️  {}", item.message);
                if let Some(field) = &item.field {
                    let _ = writeln!(out, "     Field: {}", field);
                }
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\n❌ Errors:");
            for item in &self.errors {
                let _ = writeln!(out, "  ❌ {}", item.message);
                if let Some(field) = &item.field {
                    let _ = writeln!(out, "     Field: {}", field);
                }
                if let Some(suggestion) = &item.suggestion {
                    let _ = writeln!(out, "     💡 {}", suggestion);
                }
            }
        }

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "✅ Valid: {}", self.valid);
        let _ = writeln!(out, "❌ Errors: {}", self.summary.total_errors);
        let _ = writeln!(out, "⚠️  Warnings: {}", self.summary.total_warnings);
        let _ = writeln!(out, "{}", rule);
        out
    }
}

/// Outcome of a JSON shape check
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCheck {
    pub valid: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl JsonCheck {
    fn ok(value: Value) -> Self {
        Self { valid: true, value: Some(value), error: None, details: None }
    }

    fn failed(error: String, details: String) -> Self {
        Self { valid: false, value: None, error: Some(error), details: Some(details) }
    }
}

/// Whether a value is JSON: non-strings already are, strings must parse.
/// An empty or whitespace-only string does not.
pub fn check_json(value: &Value) -> JsonCheck {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => JsonCheck::ok(parsed),
            Err(e) => JsonCheck::failed("Invalid JSON".to_string(), e.to_string()),
        },
        other => JsonCheck::ok(other.clone()),
    }
}

/// Whether a value is an array, natively or as a JSON string. Unset values
/// count as an empty array.
pub fn check_json_array(value: Option<&Value>, field: &str) -> JsonCheck {
    let value = match value {
        Some(v) if model::is_truthy(v) => v,
        _ => return JsonCheck::ok(Value::Array(Vec::new())),
    };

    match value {
        Value::Array(_) => JsonCheck::ok(value.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Array(_)) => JsonCheck::ok(parsed),
            Ok(_) => JsonCheck::failed(
                format!("Field \"{}\" must be a JSON array", field),
                format!("Current value: {}", text),
            ),
            Err(e) => JsonCheck::failed(
                format!("Field \"{}\" contains invalid JSON", field),
                e.to_string(),
            ),
        },
        other => JsonCheck::failed(
            format!("Field \"{}\" must be a JSON array", field),
            format!("Current value: {}", other),
        ),
    }
}

/// Entity and document validator
pub struct Validator {
    time_pattern: Regex,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            time_pattern: Regex::new(SCHEDULE_TIME_PATTERN).expect("schedule time pattern compiles"),
        }
    }

    pub fn is_valid_time(&self, time: &str) -> bool {
        self.time_pattern.is_match(time)
    }

    pub fn validate_adkar_item(&self, adkar: &Value, index: usize, log: &mut ValidationLog) {
        let item_num = index + 1;
        let Some(item) = adkar.as_object() else {
            log.error(
                format!("Adkar #{} is not an object", item_num),
                None,
                Some("Each adkar entry must be a JSON object"),
            );
            return;
        };
        let view = AdkarView::resolve(item);

        if !has_identifier(view.category_id) {
            log.error(
                format!("Adkar #{} is missing category_id", item_num),
                Some("category_id"),
                Some("Add a valid category_id field (integer)"),
            );
        }

        let content_type = view
            .content_type
            .map(model::display_value)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let content_type_ok = view.content_type.map_or(true, Value::is_string)
            && CONTENT_TYPES.contains(&content_type.as_str());
        if !content_type_ok {
            log.error(
                format!("Adkar #{} has invalid content_type: \"{}\"", item_num, content_type),
                Some("content_type"),
                Some(format!("Use one of: {}", CONTENT_TYPES.join(", ")).as_str()),
            );
        }

        for field in ARRAY_SCHEDULE_FIELDS {
            let check = check_json_array(view.array_field(field), field);
            if let Some(error) = check.error {
                let example = if field == "schedule_days" { "[0,1,2,3,4,5,6]" } else { "[]" };
                let suggestion = format!(
                    "Use JSON array format like \"{}\" or a native array {}",
                    example, example
                );
                log.error(
                    format!("Adkar #{}: {}", item_num, error),
                    Some(field),
                    Some(suggestion.as_str()),
                );
            }
        }

        let time_ok = match view.schedule_time {
            None => true,
            Some(Value::String(s)) => self.is_valid_time(s),
            Some(_) => false,
        };
        if !time_ok {
            let shown = view
                .schedule_time
                .map(model::display_value)
                .unwrap_or_else(|| DEFAULT_SCHEDULE_TIME.to_string());
            log.error(
                format!("Adkar #{} has invalid schedule_time: \"{}\"", item_num, shown),
                Some("schedule_time"),
                Some("Use HH:MM format (e.g., \"08:30\", \"14:00\")"),
            );
        }
    }

    pub fn validate_group_item(&self, group: &Value, index: usize, log: &mut ValidationLog) {
        let item_num = index + 1;
        if !group.is_object() {
            log.error(
                format!("Group #{} is not an object", item_num),
                None,
                Some("Each group entry must be a JSON object"),
            );
            return;
        }

        if !has_identifier(group.get("chat_id")) {
            log.error(
                format!("Group #{} is missing chat_id", item_num),
                Some("chat_id"),
                Some("Add a valid chat_id field (integer, can be negative for supergroups)"),
            );
        }

        if truthy(group, "title").is_none() {
            log.error(
                format!("Group #{} is missing title", item_num),
                Some("title"),
                Some("Add a title field with the group name"),
            );
        }

        if let Some(settings @ Value::String(_)) = truthy(group, "settings") {
            if !check_json(settings).valid {
                log.error(
                    format!("Group #{} has invalid settings JSON", item_num),
                    Some("settings"),
                    Some("Ensure settings is a valid JSON string or object"),
                );
            }
        }
    }

    pub fn validate_category_item(&self, category: &Value, index: usize, log: &mut ValidationLog) {
        let item_num = index + 1;
        if truthy(category, "name").is_none() {
            log.error(
                format!("Category #{} is missing name", item_num),
                Some("name"),
                Some("Add a name field with the category name"),
            );
        }
    }

    /// Dispatch to the entity validator for `collection`
    pub fn validate_item(&self, collection: &str, item: &Value, index: usize, log: &mut ValidationLog) {
        match collection {
            "categories" => self.validate_category_item(item, index, log),
            "adkar" => self.validate_adkar_item(item, index, log),
            "groups" => self.validate_group_item(item, index, log),
            _ => {}
        }
    }

    /// Validate a current-shape backup envelope
    pub fn validate_document(&self, doc: &Value) -> ValidationReport {
        let mut log = ValidationLog::new();
        log.info("Starting backup validation...");

        if !model::is_truthy(doc) {
            log.error("Backup data is null or undefined", None, Some("Provide a valid backup object"));
            return log.report();
        }

        let Some(data) = truthy(doc, "data") else {
            log.error(
                "Backup is missing \"data\" field",
                Some("data"),
                Some("Ensure backup has a \"data\" object containing categories, adkar, and groups"),
            );
            return log.report();
        };

        if !data.is_object() {
            log.error(
                "Field \"data\" must be an object",
                Some("data"),
                Some("Ensure backup has a \"data\" object containing categories, adkar, and groups"),
            );
        }

        if !model::has_entities(data) {
            log.warn("Backup contains no data (empty categories, adkar, and groups)", None);
        }

        for key in COLLECTIONS {
            let count = data.get(key).and_then(Value::as_array).map(Vec::len).unwrap_or(0);
            log.info(format!("Found {} {}", count, key));
        }

        for key in COLLECTIONS {
            match truthy(data, key) {
                None => {}
                Some(Value::Array(items)) => {
                    for (index, item) in items.iter().enumerate() {
                        self.validate_item(key, item, index, &mut log);
                    }
                }
                Some(_) => log.error(
                    format!("Field \"{}\" must be an array", key),
                    Some(key),
                    Some(format!("Ensure {} is an array of objects", key).as_str()),
                ),
            }
        }

        log.info("Validation complete");
        log.report()
    }
}
