// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the data directory layout.

use std::path::{Path, PathBuf};

/// Base directory for all persistent storage.
pub const DATA_ROOT: &str = "/data";

/// File name of the metadata database.
pub const DATABASE_FILE: &str = "notes.redb";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Blob Paths ==========

    /// Directory containing all ciphertext blobs.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Shard directory for a blob handle (first two characters).
    pub fn blob_shard_dir(&self, handle: &str) -> PathBuf {
        let shard = handle.get(..2).unwrap_or("00");
        self.blobs_dir().join(shard)
    }

    /// Path to the ciphertext bytes of a blob.
    pub fn blob_file(&self, handle: &str) -> PathBuf {
        self.blob_shard_dir(handle).join(format!("{handle}.bin"))
    }

    /// Path to the JSON sidecar describing a blob.
    pub fn blob_meta(&self, handle: &str) -> PathBuf {
        self.blob_shard_dir(handle).join(format!("{handle}.meta.json"))
    }

    // ========== Database Paths ==========

    /// Directory holding the metadata database.
    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    /// Path to the redb metadata database.
    pub fn database_file(&self) -> PathBuf {
        self.db_dir().join(DATABASE_FILE)
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.database_file(),
            PathBuf::from("/tmp/test-data/db/notes.redb")
        );
    }

    #[test]
    fn blob_paths_are_sharded() {
        let paths = StoragePaths::default();
        assert_eq!(paths.blobs_dir(), PathBuf::from("/data/blobs"));
        assert_eq!(
            paths.blob_file("ab12cd"),
            PathBuf::from("/data/blobs/ab/ab12cd.bin")
        );
        assert_eq!(
            paths.blob_meta("ab12cd"),
            PathBuf::from("/data/blobs/ab/ab12cd.meta.json")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-03-01"),
            PathBuf::from("/data/audit/2026-03-01/events.jsonl")
        );
    }
}
