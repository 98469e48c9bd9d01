// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `documents`: owner-scoped key (owner|document_id) → serialized DocumentMetadata
//! - `folders`: owner-scoped key (owner|folder_id) → serialized Folder
//! - `folder_names`: owner|parent|name → folder_id
//!
//! `folder_names` is both the unique constraint on sibling names and the
//! children index used by descendant resolution.
//!
//! ## Owner Scoping
//!
//! Every key starts with the length-prefixed owner id and can only be
//! built through [`OwnerScope`]. A lookup for another user's record misses
//! the same way a lookup for a nonexistent record does.

use std::path::Path;

use redb::{Database, TableDefinition};

use crate::models::{FolderRef, OwnerId};

// =============================================================================
// Table Definitions
// =============================================================================

/// Note metadata: owner|document_id → JSON bytes.
pub(crate) const DOCUMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("documents");

/// Folder records: owner|folder_id → JSON bytes.
pub(crate) const FOLDERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("folders");

/// Sibling name index: owner|parent|name → folder_id.
pub(crate) const FOLDER_NAMES: TableDefinition<&[u8], &str> = TableDefinition::new("folder_names");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidMove(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Owner-Scoped Keys
// =============================================================================

/// Key builder bound to a single owner.
///
/// The prefix is `u32 big-endian length | owner bytes`, so one owner's keys
/// can never be a prefix of another owner's keys.
#[derive(Debug, Clone)]
pub(crate) struct OwnerScope {
    prefix: Vec<u8>,
}

impl OwnerScope {
    pub(crate) fn new(owner: &OwnerId) -> Self {
        let bytes = owner.as_str().as_bytes();
        let mut prefix = Vec::with_capacity(4 + bytes.len());
        push_segment(&mut prefix, bytes);
        Self { prefix }
    }

    /// Prefix shared by every key of this owner.
    pub(crate) fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Key of one record (document or folder).
    pub(crate) fn record(&self, id: &str) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(id.as_bytes());
        key
    }

    /// Prefix of every name-index entry under `parent`.
    pub(crate) fn children(&self, parent: &FolderRef) -> Vec<u8> {
        let mut key = self.prefix.clone();
        let parent_id = parent.folder_id().unwrap_or("");
        push_segment(&mut key, parent_id.as_bytes());
        key
    }

    /// Name-index key of `name` under `parent`.
    pub(crate) fn name(&self, parent: &FolderRef, name: &str) -> Vec<u8> {
        let mut key = self.children(parent);
        key.extend_from_slice(name.as_bytes());
        key
    }
}

fn push_segment(buf: &mut Vec<u8>, segment: &[u8]) {
    buf.extend_from_slice(&(segment.len() as u32).to_be_bytes());
    buf.extend_from_slice(segment);
}

// =============================================================================
// NoteDatabase
// =============================================================================

/// Embedded ACID metadata database.
pub struct NoteDatabase {
    db: Database,
}

impl NoteDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(FOLDERS)?;
            let _ = write_txn.open_table(FOLDER_NAMES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for NoteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteDatabase").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.redb");
        let _db = NoteDatabase::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn owner_prefixes_never_overlap() {
        let short = OwnerScope::new(&owner("ab"));
        let long = OwnerScope::new(&owner("abc"));

        assert!(!long.record("x").starts_with(short.prefix()));
        assert!(!short.record("cx").starts_with(long.prefix()));
    }

    #[test]
    fn record_keys_are_owner_specific() {
        let a = OwnerScope::new(&owner("user_a"));
        let b = OwnerScope::new(&owner("user_b"));
        assert_ne!(a.record("doc-1"), b.record("doc-1"));
        assert!(a.record("doc-1").starts_with(a.prefix()));
    }

    #[test]
    fn name_keys_nest_under_their_parent() {
        let scope = OwnerScope::new(&owner("user_a"));
        let root = FolderRef::Root;
        let f1 = FolderRef::Folder("f1".into());

        assert!(scope.name(&root, "Classes").starts_with(&scope.children(&root)));
        assert!(scope.name(&f1, "Classes").starts_with(&scope.children(&f1)));
        assert_ne!(scope.name(&root, "Classes"), scope.name(&f1, "Classes"));

        // A root-level name cannot masquerade as a child of another folder
        assert!(!scope.name(&root, "f1x").starts_with(&scope.children(&f1)));
    }

    #[test]
    fn owner_ids_with_separators_are_safe() {
        let a = OwnerScope::new(&owner("auth0|123"));
        let b = OwnerScope::new(&owner("auth0"));
        assert!(!a.prefix().starts_with(b.prefix()));
    }
}
