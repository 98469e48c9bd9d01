// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content store for note ciphertext.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/blobs/{shard}/
//!   {handle}.bin         # Ciphertext bytes, exactly as uploaded
//!   {handle}.meta.json   # Display name, tags, size, sha256
//! ```
//!
//! Handles are random, never reused, and only meaningful to the store that
//! issued them. Deleting an unknown handle succeeds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{FileStorage, StorageError};

/// Opaque reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    /// Issue a fresh, globally unique handle.
    pub fn generate() -> Self {
        BlobHandle(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Rebuild a handle previously issued by a store.
    pub fn from_stored(value: impl Into<String>) -> Self {
        BlobHandle(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_well_formed(&self) -> bool {
        self.0.len() == 32 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("malformed blob handle: {0}")]
    InvalidHandle(String),

    #[error("blob {handle} is corrupt: {reason}")]
    Corrupt { handle: String, reason: String },

    #[error("blob storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Metadata tags attached to a blob at upload time.
pub type BlobTags = BTreeMap<String, String>;

/// A content-addressed byte store.
///
/// Implementations must be safe to share across request handlers.
pub trait BlobStore: Send + Sync {
    /// Durably store `bytes` and return a new handle.
    fn put(&self, bytes: &[u8], display_name: &str, tags: &BlobTags) -> BlobResult<BlobHandle>;

    /// Load the full contents of a blob.
    fn get(&self, handle: &BlobHandle) -> BlobResult<Vec<u8>>;

    /// Remove a blob. Removing a missing handle is not an error.
    fn delete(&self, handle: &BlobHandle) -> BlobResult<()>;
}

/// Sidecar record describing a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobInfo {
    pub handle: BlobHandle,
    pub display_name: String,
    #[serde(default)]
    pub tags: BlobTags,
    pub size: u64,
    /// Hex SHA-256 of the stored bytes, for at-rest corruption detection.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Blob store backed by files under the data directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    storage: FileStorage,
}

impl FsBlobStore {
    pub fn new(storage: FileStorage) -> Self {
        Self { storage }
    }

    fn checked(&self, handle: &BlobHandle) -> BlobResult<()> {
        if handle.is_well_formed() {
            Ok(())
        } else {
            Err(BlobError::InvalidHandle(handle.to_string()))
        }
    }

    /// Read the sidecar of a blob.
    pub fn info(&self, handle: &BlobHandle) -> BlobResult<BlobInfo> {
        self.checked(handle)?;
        self.storage
            .read_json(self.storage.paths().blob_meta(handle.as_str()))
            .map_err(|e| match e {
                StorageError::NotFound(_) => BlobError::NotFound(handle.to_string()),
                other => BlobError::Storage(other),
            })
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8], display_name: &str, tags: &BlobTags) -> BlobResult<BlobHandle> {
        let handle = BlobHandle::generate();
        let paths = self.storage.paths();

        let info = BlobInfo {
            handle: handle.clone(),
            display_name: display_name.to_string(),
            tags: tags.clone(),
            size: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
            created_at: Utc::now(),
        };

        // Bytes first: a sidecar without data would look like corruption.
        self.storage.write_raw(paths.blob_file(handle.as_str()), bytes)?;
        if let Err(e) = self
            .storage
            .write_json(paths.blob_meta(handle.as_str()), &info)
        {
            if let Err(cleanup) = self.storage.delete(paths.blob_file(handle.as_str())) {
                tracing::warn!(
                    handle = %handle,
                    error = %cleanup,
                    "Failed to remove blob data after sidecar write failed"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(handle = %handle, size = bytes.len(), "Stored blob");
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> BlobResult<Vec<u8>> {
        let info = self.info(handle)?;
        let data = self
            .storage
            .read_raw(self.storage.paths().blob_file(handle.as_str()))
            .map_err(|e| match e {
                StorageError::NotFound(_) => BlobError::NotFound(handle.to_string()),
                other => BlobError::Storage(other),
            })?;

        if data.len() as u64 != info.size {
            return Err(BlobError::Corrupt {
                handle: handle.to_string(),
                reason: format!("expected {} bytes, found {}", info.size, data.len()),
            });
        }
        if format!("{:x}", Sha256::digest(&data)) != info.sha256 {
            return Err(BlobError::Corrupt {
                handle: handle.to_string(),
                reason: "checksum mismatch".to_string(),
            });
        }

        Ok(data)
    }

    fn delete(&self, handle: &BlobHandle) -> BlobResult<()> {
        self.checked(handle)?;
        let paths = self.storage.paths();
        self.storage.delete(paths.blob_file(handle.as_str()))?;
        self.storage.delete(paths.blob_meta(handle.as_str()))?;
        Ok(())
    }
}
