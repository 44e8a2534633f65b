//! Adkar Backup Manager
//!
//! Backup lifecycle tooling for the adkar bot's JSON datastore: snapshots,
//! schema version detection and migration, field-level validation,
//! diagnosis and automatic repair.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─► parse ─► Diagnostician ─► DiagnosticReport
//!                     │  uses VersionManager + Validator
//!                     ▼
//!                  Repairer ─► migrate + field fixes ─► re-diagnose
//! ```
//!
//! ## Backup generations
//!
//! ```text
//! 1.x  { groups, adkar, categories }                  flat, `type` / `days_of_week`
//! 2.x  { version, timestamp, data }                   nested
//! 3.x  { version, timestamp, data, metadata }         current, checksummed
//! ```
//!
//! Everything in the pipeline is a pure function over a `serde_json::Value`;
//! only [`store`] and the binaries touch the filesystem.

pub mod checksum;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod metadata;
pub mod model;
pub mod repair;
pub mod restore;
pub mod sink;
pub mod store;
pub mod validate;
pub mod version;

pub use checksum::Checksum;
pub use config::BackupConfig;
pub use diagnostic::{
    check_size, DiagnosticReport, DiagnosticResult, Diagnostician, Issue, Severity, SizeLimits,
    Verdict,
};
pub use error::{BackupError, Result};
pub use metadata::{
    extract_metadata, format_bytes, statistics, validate_metadata, verify_checksum,
    BackupSummary, Metadata, MetadataManager, Statistics,
};
pub use model::{AdkarShape, AdkarView};
pub use repair::{RepairOutcome, Repairer};
pub use restore::{prepare_restore, ChecksumStatus, RestorePlan, RestorePlanner};
pub use sink::{LogSink, NullSink, TracingSink};
pub use store::{SnapshotInfo, SnapshotStore};
pub use validate::{check_json, check_json_array, ValidationLog, ValidationReport, Validator};
pub use version::{VersionInfo, VersionManager, VersionPolicy};
