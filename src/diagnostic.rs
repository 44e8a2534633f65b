//! Whole-document diagnosis
//!
//! Runs version checks and per-entity validation over one backup and sorts
//! everything it finds by severity. Diagnosis never mutates its input and
//! never fails: a malformed backup is just a report with more issues in it.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{self, truthy, COLLECTIONS};
use crate::validate::{ValidationLog, Validator};
use crate::version::{now_iso, VersionManager, UNKNOWN_VERSION};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ️ ",
            Severity::Warning => "⚠️ ",
            Severity::Error => "❌",
            Severity::Critical => "🚨",
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Severity::Info => "Information",
            Severity::Warning => "Warnings",
            Severity::Error => "Errors",
            Severity::Critical => "Critical Issues",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub field: Option<String>,
    pub suggestion: Option<String>,
    pub timestamp: String,
}

/// Serialized size thresholds in megabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeLimits {
    #[serde(default = "default_warn_size_mb")]
    pub warn_size_mb: f64,

    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,
}

fn default_warn_size_mb() -> f64 {
    5.0
}

fn default_max_size_mb() -> f64 {
    10.0
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            warn_size_mb: default_warn_size_mb(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

/// Issues collected so far
///
/// `fixable` starts true and is cleared for good by the first critical issue.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResult {
    pub issues: Vec<Issue>,
    pub fixable: bool,
}

impl Default for DiagnosticResult {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            fixable: true,
        }
    }

    pub fn add_issue(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        field: Option<&str>,
        suggestion: Option<&str>,
    ) {
        if severity == Severity::Critical {
            self.fixable = false;
        }

        self.issues.push(Issue {
            severity,
            message: message.into(),
            field: field.map(str::to_string),
            suggestion: suggestion.map(str::to_string),
            timestamp: now_iso(),
        });
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn report(&self) -> DiagnosticReport {
        let summary = DiagnosticSummary {
            critical: self.count(Severity::Critical),
            errors: self.count(Severity::Error),
            warnings: self.count(Severity::Warning),
            info: self.count(Severity::Info),
            total: self.issues.len(),
        };

        DiagnosticReport {
            is_healthy: summary.critical == 0 && summary.errors == 0,
            fixable: self.fixable,
            summary,
            issues: self.issues.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSummary {
    pub critical: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub total: usize,
}

/// Terminal state of a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Healthy,
    UnhealthyFixable,
    UnhealthyUnfixable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub is_healthy: bool,
    pub fixable: bool,
    pub summary: DiagnosticSummary,
    pub issues: Vec<Issue>,
}

impl DiagnosticReport {
    pub fn verdict(&self) -> Verdict {
        match (self.is_healthy, self.fixable) {
            (true, _) => Verdict::Healthy,
            (false, true) => Verdict::UnhealthyFixable,
            (false, false) => Verdict::UnhealthyUnfixable,
        }
    }

    pub fn issues_of(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// Multi-section text report, most severe first
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "\n{}\n🔍 Backup Diagnostic Report\n{}", rule, rule);

        for severity in [Severity::Critical, Severity::Error, Severity::Warning, Severity::Info] {
            let mut issues = self.issues_of(severity).peekable();
            if issues.peek().is_none() {
                continue;
            }

            let _ = writeln!(out, "\n{} {}:", severity.icon(), severity.heading());
            for issue in issues {
                let _ = writeln!(out, "  {} {}", severity.icon(), issue.message);
                if severity == Severity::Info {
                    continue;
                }
                if let Some(field) = &issue.field {
                    let _ = writeln!(out, "     Field: {}", field);
                }
                if let Some(suggestion) = &issue.suggestion {
                    let _ = writeln!(out, "     💡 {}", suggestion);
                }
            }
        }

        let _ = writeln!(out, "\n{}\nSummary:", rule);
        let _ = writeln!(out, "  🚨 Critical: {}", self.summary.critical);
        let _ = writeln!(out, "  ❌ Errors: {}", self.summary.errors);
        let _ = writeln!(out, "  ⚠️  Warnings: {}", self.summary.warnings);
        let _ = writeln!(out, "  ℹ️  Info: {}", self.summary.info);
        let _ = writeln!(out, "  ✅ Healthy: {}", self.is_healthy);
        let _ = writeln!(out, "  🔧 Fixable: {}", self.fixable);
        let _ = writeln!(out, "{}", rule);
        out
    }
}

/// Record the serialized size of a backup against the limits
pub fn check_size(size_bytes: usize, limits: &SizeLimits, result: &mut DiagnosticResult) {
    let size_mb = size_bytes as f64 / BYTES_PER_MB;

    result.add_issue(
        Severity::Info,
        format!("Backup file size: {:.2} MB", size_mb),
        Some("file_size"),
        None,
    );

    if size_mb > limits.max_size_mb {
        result.add_issue(
            Severity::Error,
            format!(
                "Backup file is too large ({:.2} MB). Maximum allowed is {} MB.",
                size_mb, limits.max_size_mb
            ),
            Some("file_size"),
            Some("Consider reducing the amount of data or splitting into multiple backups"),
        );
    } else if size_mb > limits.warn_size_mb {
        result.add_issue(
            Severity::Warning,
            format!("Backup file is quite large ({:.2} MB). Upload may be slow.", size_mb),
            Some("file_size"),
            None,
        );
    }
}

/// Runs the diagnostic checks over whole backup documents
#[derive(Default)]
pub struct Diagnostician {
    versions: VersionManager,
    validator: Validator,
    limits: SizeLimits,
}

impl Diagnostician {
    pub fn new(versions: VersionManager, limits: SizeLimits) -> Self {
        Self {
            versions,
            validator: Validator::new(),
            limits,
        }
    }

    pub fn diagnose(&self, doc: &Value) -> DiagnosticReport {
        self.diagnose_into(doc).report()
    }

    /// Same as [`Diagnostician::diagnose`] but returns the raw accumulator
    pub fn diagnose_into(&self, doc: &Value) -> DiagnosticResult {
        let mut result = DiagnosticResult::new();

        if !model::is_truthy(doc) {
            result.add_issue(
                Severity::Critical,
                "Backup data is null or undefined",
                None,
                Some("Ensure the file was loaded correctly and is not empty"),
            );
            return result;
        }

        self.check_version(doc, &mut result);

        let has_data = truthy(doc, "data").is_some();
        let has_legacy = COLLECTIONS.iter().any(|key| truthy(doc, key).is_some());
        if !has_data && !has_legacy {
            result.add_issue(
                Severity::Critical,
                "Backup has no recognizable data structure",
                Some("data"),
                Some("Backup must contain either a \"data\" field or top-level groups/adkar/categories fields"),
            );
            return result;
        }

        let normalized = normalize(doc);
        let data = &normalized["data"];
        if !data.is_object() {
            result.add_issue(
                Severity::Error,
                "Data field is not an object",
                Some("data"),
                Some("Ensure data is an object containing categories, adkar, and groups"),
            );
        }

        self.check_presence(data, &mut result);
        for key in COLLECTIONS {
            self.check_collection(data, key, &mut result);
        }

        let size = serde_json::to_string(&normalized).map(|s| s.len()).unwrap_or(0);
        check_size(size, &self.limits, &mut result);

        tracing::debug!(
            issues = result.issues.len(),
            fixable = result.fixable,
            "diagnosis complete"
        );
        result
    }

    fn check_version(&self, doc: &Value, result: &mut DiagnosticResult) {
        let version = self.versions.detect_version(doc);
        result.add_issue(
            Severity::Info,
            format!("Detected backup version: {}", version),
            Some("version"),
            None,
        );

        if version == UNKNOWN_VERSION {
            result.add_issue(
                Severity::Error,
                "Unable to detect backup version",
                Some("version"),
                Some("Backup may have an unknown or corrupted structure"),
            );
        } else if !self.versions.is_supported(&version) {
            result.add_issue(
                Severity::Critical,
                format!("Unsupported backup version: {}", version),
                Some("version"),
                Some(format!("Supported versions: {}", self.versions.supported_list()).as_str()),
            );
        } else if self.versions.is_older(&version) {
            result.add_issue(
                Severity::Warning,
                format!("Backup is from older version ({}). Migration will be required.", version),
                Some("version"),
                Some("The system will automatically migrate this backup to the current version"),
            );
        }
    }

    fn check_presence(&self, data: &Value, result: &mut DiagnosticResult) {
        if !model::has_entities(data) {
            result.add_issue(
                Severity::Warning,
                "Backup contains no data (empty categories, adkar, and groups)",
                Some("data"),
                Some("This backup will restore an empty database"),
            );
            return;
        }

        let count = |key: &str| data.get(key).and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        result.add_issue(
            Severity::Info,
            format!(
                "Backup contains {} categories, {} adkar, {} groups",
                count("categories"),
                count("adkar"),
                count("groups")
            ),
            None,
            None,
        );
    }

    fn check_collection(&self, data: &Value, key: &str, result: &mut DiagnosticResult) {
        match truthy(data, key) {
            None => {}
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let mut log = ValidationLog::new();
                    self.validator.validate_item(key, item, index, &mut log);
                    for err in log.errors {
                        result.add_issue(
                            Severity::Error,
                            err.message,
                            err.field.as_deref(),
                            err.suggestion.as_deref(),
                        );
                    }
                }
            }
            Some(_) => {
                let label = capitalize(key);
                result.add_issue(
                    Severity::Error,
                    format!("{} field is not an array", label),
                    Some(key),
                    Some(format!("Ensure {} is an array of {} objects", key, singular(key)).as_str()),
                );
            }
        }
    }
}

/// Read-only current-shape view of a document. Flat legacy documents get
/// their top-level collections wrapped into `data`.
fn normalize(doc: &Value) -> Value {
    if truthy(doc, "data").is_some() {
        return doc.clone();
    }

    let collection = |key: &str| truthy(doc, key).cloned().unwrap_or_else(|| json!([]));
    json!({
        "version": "1.0.0",
        "data": {
            "groups": collection("groups"),
            "adkar": collection("adkar"),
            "categories": collection("categories"),
        }
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn singular(collection: &str) -> &str {
    match collection {
        "categories" => "category",
        "groups" => "group",
        other => other,
    }
}
