// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note metadata repository.
//!
//! Records live in the `documents` table keyed by owner and note id. Every
//! mutation is a single write transaction that matches on that key and
//! applies the change, so concurrent updates to one note serialize without
//! application-level locks.

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable};

use crate::models::{DocumentMetadata, FolderRef, OwnerId};

use super::super::database::{DbError, DbResult, NoteDatabase, OwnerScope, DOCUMENTS};

/// Repository for note metadata.
pub struct DocumentRepository<'a> {
    db: &'a NoteDatabase,
}

impl<'a> DocumentRepository<'a> {
    /// Create a new DocumentRepository.
    pub fn new(db: &'a NoteDatabase) -> Self {
        Self { db }
    }

    /// Insert a new note. Fails with `Conflict` if the id is taken.
    pub fn insert(&self, doc: &DocumentMetadata) -> DbResult<()> {
        let key = OwnerScope::new(&doc.owner_id).record(&doc.id);
        let json = serde_json::to_vec(doc)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            if table.get(key.as_slice())?.is_some() {
                return Err(DbError::Conflict(format!("Note {} already exists", doc.id)));
            }
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up one of `owner`'s notes.
    pub fn get(&self, owner: &OwnerId, id: &str) -> DbResult<Option<DocumentMetadata>> {
        let key = OwnerScope::new(owner).record(id);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        let bytes = table.get(key.as_slice())?.map(|v| v.value().to_vec());
        let doc = match bytes {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        Ok(doc)
    }

    /// All of `owner`'s notes, in key order.
    pub fn list(&self, owner: &OwnerId) -> DbResult<Vec<DocumentMetadata>> {
        let scope = OwnerScope::new(owner);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        let mut docs = Vec::new();
        for entry in table.range(scope.prefix()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(scope.prefix()) {
                break;
            }
            match serde_json::from_slice::<DocumentMetadata>(value.value()) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(owner_id = %owner, error = %e, "Skipping unreadable note record");
                }
            }
        }
        Ok(docs)
    }

    /// Apply `change` to one note inside a single write transaction.
    ///
    /// The closure may reject the change by returning an error, in which
    /// case nothing is written. Id and owner cannot be changed.
    pub fn modify<F>(&self, owner: &OwnerId, id: &str, change: F) -> DbResult<DocumentMetadata>
    where
        F: FnOnce(&mut DocumentMetadata) -> DbResult<()>,
    {
        let key = OwnerScope::new(owner).record(id);

        let write_txn = self.db.inner().begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(DOCUMENTS)?;

            let existing = table.get(key.as_slice())?.map(|v| v.value().to_vec());
            let existing = existing.ok_or_else(|| DbError::NotFound(format!("Note {id}")))?;

            let mut doc: DocumentMetadata = serde_json::from_slice(&existing)?;
            change(&mut doc)?;
            doc.id = id.to_string();
            doc.owner_id = owner.clone();

            let json = serde_json::to_vec(&doc)?;
            table.insert(key.as_slice(), json.as_slice())?;
            doc
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a note, returning the removed record if it existed.
    pub fn delete(&self, owner: &OwnerId, id: &str) -> DbResult<Option<DocumentMetadata>> {
        let key = OwnerScope::new(owner).record(id);

        let write_txn = self.db.inner().begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let bytes = table.remove(key.as_slice())?.map(|v| v.value().to_vec());
            match bytes {
                Some(bytes) => Some(serde_json::from_slice::<DocumentMetadata>(&bytes)?),
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Move every note of `owner` filed under `folder_id` to the root.
    ///
    /// Returns how many notes were moved. Running it twice is harmless.
    pub fn move_to_root(&self, owner: &OwnerId, folder_id: &str) -> DbResult<usize> {
        let scope = OwnerScope::new(owner);
        let target = FolderRef::Folder(folder_id.to_string());

        let write_txn = self.db.inner().begin_write()?;
        let moved = {
            let mut table = write_txn.open_table(DOCUMENTS)?;

            let mut matches = Vec::new();
            for entry in table.range(scope.prefix()..)? {
                let (key, value) = entry?;
                if !key.value().starts_with(scope.prefix()) {
                    break;
                }
                let doc: DocumentMetadata = match serde_json::from_slice(value.value()) {
                    Ok(doc) => doc,
                    Err(e) => {
                        tracing::warn!(
                            owner_id = %owner,
                            folder_id = %folder_id,
                            error = %e,
                            "Skipping unreadable note record while moving to root"
                        );
                        continue;
                    }
                };
                if doc.folder == target {
                    matches.push((key.value().to_vec(), doc));
                }
            }

            let now = Utc::now();
            let moved = matches.len();
            for (key, mut doc) in matches {
                doc.folder = FolderRef::Root;
                doc.updated_at = now;
                let json = serde_json::to_vec(&doc)?;
                table.insert(key.as_slice(), json.as_slice())?;
            }
            moved
        };
        write_txn.commit()?;
        Ok(moved)
    }
}
