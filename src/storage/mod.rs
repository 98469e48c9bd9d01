// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state for notes and folders, all under one data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   blobs/{shard}/
//!     {handle}.bin         # Note ciphertext, exactly as uploaded
//!     {handle}.meta.json   # Blob sidecar (size, sha256, tags)
//!   db/
//!     notes.redb           # Note and folder metadata (redb, ACID)
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - Content arrives already encrypted by the client
//! - DO NOT implement any crypto in Rust for storage
//! - Metadata never contains plaintext content or titles

pub mod audit;
pub mod blob_store;
pub mod database;
pub mod fs;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditRepository, AuditSink};
pub use blob_store::{BlobError, BlobHandle, BlobResult, BlobStore, BlobTags, FsBlobStore};
pub use database::{DbError, DbResult, NoteDatabase};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{DocumentRepository, FolderRepository};
