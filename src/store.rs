//! Snapshot store: timestamped backup files with rolling retention
//!
//! Snapshots are written as pretty JSON to
//! `<dir>/backup-<YYYY-MM-DDTHH-MM-SS-mmmZ>.json`. The creation time is read
//! back from the filename, so listing never has to open the files. An
//! existing snapshot is never overwritten: a name already taken moves the
//! new one forward by a millisecond.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{BackupError, Result};
use crate::metadata::MetadataManager;

const PREFIX: &str = "backup-";
const SUFFIX: &str = ".json";

/// Filenames tried, one millisecond apart, before giving up on a collision
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// One snapshot file on disk
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub filename: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    keep: usize,
    metadata: MetadataManager,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            keep,
            metadata: MetadataManager::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataManager) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Write a data block as a new metadata-carrying snapshot
    pub fn create_snapshot(&self, data: &Value, description: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let envelope = self.metadata.create_backup_with_metadata(data, description);
        let json = serde_json::to_string_pretty(&envelope)?;

        let now = Utc::now();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let at = now + chrono::Duration::milliseconds(attempt);
            let path = self.dir.join(snapshot_filename(&at));

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(json.as_bytes())?;

            tracing::info!(path = %path.display(), "created snapshot");
            return Ok(path);
        }

        Err(BackupError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free snapshot filename in {}", self.dir.display()),
        )))
    }

    /// All snapshots, newest first. Files not named like a snapshot are skipped.
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| BackupError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            let Some(created_at) = parse_snapshot_filename(&filename) else {
                continue;
            };

            snapshots.push(SnapshotInfo {
                filename,
                path: entry.path().to_path_buf(),
                created_at,
                size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
            });
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    pub fn latest(&self) -> Result<Option<SnapshotInfo>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Read a snapshot, either by path or by filename inside the store
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let resolved = if path.exists() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        };

        if !resolved.exists() {
            return Err(BackupError::SnapshotNotFound(path.display().to_string()));
        }

        let contents = fs::read_to_string(&resolved)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Delete everything but the newest `keep` snapshots
    pub fn prune(&self) -> Result<Vec<PathBuf>> {
        let mut deleted = Vec::new();
        for snapshot in self.list()?.into_iter().skip(self.keep) {
            fs::remove_file(&snapshot.path)?;
            deleted.push(snapshot.path);
        }

        if !deleted.is_empty() {
            tracing::info!(deleted = deleted.len(), keep = self.keep, "pruned snapshots");
        }
        Ok(deleted)
    }
}

/// `backup-2024-03-01T08-30-00-123Z.json`
pub fn snapshot_filename(at: &DateTime<Utc>) -> String {
    format!("{}{}{}", PREFIX, at.format("%Y-%m-%dT%H-%M-%S-%3fZ"), SUFFIX)
}

/// Creation time encoded in a snapshot filename
pub fn parse_snapshot_filename(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename
        .strip_prefix(PREFIX)?
        .strip_suffix(SUFFIX)?
        .strip_suffix('Z')?;

    let (datetime, millis) = stamp.rsplit_once('-')?;
    if millis.len() != 3 {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;

    let naive = NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H-%M-%S").ok()?;
    let naive = naive + chrono::Duration::milliseconds(millis);
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}
