//! Checksum utilities for backup integrity verification

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// SHA256 checksum of a backup envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn from_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Compute checksum from a JSON value
    ///
    /// Hashes the compact serialization with object keys in insertion
    /// order, which is what the bot's own backup writer produces.
    pub fn from_json(value: &Value) -> Self {
        let compact = serde_json::to_string(value).unwrap_or_default();
        Self::from_text(&compact)
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that JSON value matches this checksum
    pub fn verify_json(&self, value: &Value) -> bool {
        self.0 == Self::from_json(value).0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_is_sha256_hex() {
        let checksum = Checksum::from_json(&json!({"groups": [], "adkar": [], "categories": []}));
        assert_eq!(checksum.as_str().len(), 64);
        assert!(checksum.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_follows_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": [1, 2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": [1, 2], "b": 1}"#).unwrap();
        assert_ne!(Checksum::from_json(&a), Checksum::from_json(&b));
        assert_eq!(Checksum::from_json(&a), Checksum::from_text(r#"{"b":1,"a":[1,2]}"#));
    }

    #[test]
    fn test_matches_bot_backup_writer() {
        // sha256 of the bot's compact JSON.stringify output for this envelope
        let envelope: Value = serde_json::from_str(
            r#"{
                "version": "3.0.0",
                "timestamp": "2024-05-01T06:00:00.000Z",
                "data": {
                    "categories": [{"id": 1, "name": "أذكار الصباح"}],
                    "adkar": [],
                    "groups": [{"id": 1, "chat_id": -1001, "title": "G"}]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            Checksum::from_json(&envelope).as_str(),
            "12ef921980bd35a0f8fe57524fa256ddf197bb2e5987dfd14e40d6d648df22c6"
        );
    }

    #[test]
    fn test_checksum_verification() {
        let value = json!({"name": "صلاة الفجر"});
        let checksum = Checksum::from_json(&value);
        assert!(checksum.verify_json(&value));
        assert!(!checksum.verify_json(&json!({"name": "other"})));
    }
}
