// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Folder repository.
//!
//! A folder is stored twice: its record in `folders`, and its
//! `owner|parent|name` entry in `folder_names`. Both are written in the same
//! transaction, so a taken name key is the sibling-uniqueness constraint and
//! a prefix scan of the name index lists a folder's children.

use std::collections::HashSet;

use redb::{ReadableDatabase, ReadableTable, Table};

use crate::models::{Folder, FolderRef, OwnerId};

use super::super::database::{
    DbError, DbResult, NoteDatabase, OwnerScope, FOLDERS, FOLDER_NAMES,
};

/// Repository for folder records and the sibling name index.
pub struct FolderRepository<'a> {
    db: &'a NoteDatabase,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository.
    pub fn new(db: &'a NoteDatabase) -> Self {
        Self { db }
    }

    /// Insert a new folder.
    ///
    /// Fails with `Conflict` if a sibling already has the same name, and
    /// with `NotFound` if the parent folder does not exist.
    pub fn create(&self, folder: &Folder) -> DbResult<()> {
        let scope = OwnerScope::new(&folder.owner_id);
        let record_key = scope.record(&folder.id);
        let name_key = scope.name(&folder.parent, &folder.name);
        let json = serde_json::to_vec(folder)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let mut names = write_txn.open_table(FOLDER_NAMES)?;

            if let Some(parent_id) = folder.parent.folder_id() {
                if folders.get(scope.record(parent_id).as_slice())?.is_none() {
                    return Err(DbError::NotFound(format!("Folder {parent_id}")));
                }
            }
            if names.get(name_key.as_slice())?.is_some() {
                return Err(name_taken(&folder.name));
            }
            if folders.get(record_key.as_slice())?.is_some() {
                return Err(DbError::Conflict(format!(
                    "Folder {} already exists",
                    folder.id
                )));
            }

            names.insert(name_key.as_slice(), folder.id.as_str())?;
            folders.insert(record_key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up one of `owner`'s folders.
    pub fn get(&self, owner: &OwnerId, id: &str) -> DbResult<Option<Folder>> {
        let key = OwnerScope::new(owner).record(id);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;

        let bytes = table.get(key.as_slice())?.map(|v| v.value().to_vec());
        let folder = match bytes {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        Ok(folder)
    }

    pub fn exists(&self, owner: &OwnerId, id: &str) -> DbResult<bool> {
        let key = OwnerScope::new(owner).record(id);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;
        let found = table.get(key.as_slice())?.is_some();
        Ok(found)
    }

    /// All of `owner`'s folders, in key order.
    pub fn list(&self, owner: &OwnerId) -> DbResult<Vec<Folder>> {
        let scope = OwnerScope::new(owner);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;

        let mut folders = Vec::new();
        for entry in table.range(scope.prefix()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(scope.prefix()) {
                break;
            }
            match serde_json::from_slice::<Folder>(value.value()) {
                Ok(folder) => folders.push(folder),
                Err(e) => {
                    tracing::warn!(owner_id = %owner, error = %e, "Skipping unreadable folder record");
                }
            }
        }
        Ok(folders)
    }

    /// Id of the folder called `name` directly under `parent`, if any.
    pub fn find_by_name(
        &self,
        owner: &OwnerId,
        parent: &FolderRef,
        name: &str,
    ) -> DbResult<Option<String>> {
        let key = OwnerScope::new(owner).name(parent, name);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FOLDER_NAMES)?;
        let id = table.get(key.as_slice())?.map(|v| v.value().to_string());
        Ok(id)
    }

    /// Direct children of `parent`, ordered by name.
    pub fn children(&self, owner: &OwnerId, parent: &FolderRef) -> DbResult<Vec<Folder>> {
        self.children_of_any(owner, std::slice::from_ref(parent))
    }

    /// Direct children of every folder in `parents`, read in one transaction.
    pub fn children_of_any(&self, owner: &OwnerId, parents: &[FolderRef]) -> DbResult<Vec<Folder>> {
        let scope = OwnerScope::new(owner);
        let read_txn = self.db.inner().begin_read()?;
        let names = read_txn.open_table(FOLDER_NAMES)?;
        let folders = read_txn.open_table(FOLDERS)?;

        let mut ids = Vec::new();
        for parent in parents {
            let prefix = scope.children(parent);
            for entry in names.range(prefix.as_slice()..)? {
                let (key, value) = entry?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                ids.push(value.value().to_string());
            }
        }

        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            let bytes = folders
                .get(scope.record(&id).as_slice())?
                .map(|v| v.value().to_vec());
            match bytes {
                Some(bytes) => children.push(serde_json::from_slice::<Folder>(&bytes)?),
                None => {
                    tracing::warn!(owner_id = %owner, folder_id = %id, "Name index points at a missing folder");
                }
            }
        }
        Ok(children)
    }

    /// Apply `change` to one folder inside a single write transaction.
    ///
    /// If the name or parent changed, the name index is moved in the same
    /// transaction: a taken name fails with `Conflict`, a missing parent with
    /// `NotFound`, and a parent inside the folder's own subtree with
    /// `InvalidMove`.
    pub fn update<F>(&self, owner: &OwnerId, id: &str, change: F) -> DbResult<Folder>
    where
        F: FnOnce(&mut Folder) -> DbResult<()>,
    {
        let scope = OwnerScope::new(owner);
        let record_key = scope.record(id);

        let write_txn = self.db.inner().begin_write()?;
        let updated = {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let mut names = write_txn.open_table(FOLDER_NAMES)?;

            let existing = folders
                .get(record_key.as_slice())?
                .map(|v| v.value().to_vec());
            let existing = existing.ok_or_else(|| DbError::NotFound(format!("Folder {id}")))?;

            let mut folder: Folder = serde_json::from_slice(&existing)?;
            let old_parent = folder.parent.clone();
            let old_name_key = scope.name(&folder.parent, &folder.name);

            change(&mut folder)?;
            folder.id = id.to_string();
            folder.owner_id = owner.clone();

            if folder.parent != old_parent {
                if let Some(parent_id) = folder.parent.folder_id() {
                    if parent_id == id || has_ancestor(&folders, &scope, parent_id, id)? {
                        return Err(DbError::InvalidMove(
                            "a folder cannot be moved into itself or its descendants".to_string(),
                        ));
                    }
                    if folders.get(scope.record(parent_id).as_slice())?.is_none() {
                        return Err(DbError::NotFound(format!("Folder {parent_id}")));
                    }
                }
            }

            let new_name_key = scope.name(&folder.parent, &folder.name);
            if new_name_key != old_name_key {
                let holder = names
                    .get(new_name_key.as_slice())?
                    .map(|v| v.value().to_string());
                if holder.is_some_and(|holder| holder != id) {
                    return Err(name_taken(&folder.name));
                }
                names.remove(old_name_key.as_slice())?;
                names.insert(new_name_key.as_slice(), id)?;
            }

            let json = serde_json::to_vec(&folder)?;
            folders.insert(record_key.as_slice(), json.as_slice())?;
            folder
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a folder record and its name entry. Children are untouched.
    ///
    /// Returns the removed folder, or `None` if it did not exist.
    pub fn delete(&self, owner: &OwnerId, id: &str) -> DbResult<Option<Folder>> {
        let scope = OwnerScope::new(owner);
        let record_key = scope.record(id);

        let write_txn = self.db.inner().begin_write()?;
        let removed = {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let mut names = write_txn.open_table(FOLDER_NAMES)?;

            let bytes = folders
                .remove(record_key.as_slice())?
                .map(|v| v.value().to_vec());
            match bytes {
                Some(bytes) => {
                    let folder: Folder = serde_json::from_slice(&bytes)?;
                    let name_key = scope.name(&folder.parent, &folder.name);
                    let holder = names
                        .get(name_key.as_slice())?
                        .map(|v| v.value().to_string());
                    if holder.as_deref() == Some(id) {
                        names.remove(name_key.as_slice())?;
                    }
                    Some(folder)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

fn name_taken(name: &str) -> DbError {
    DbError::Conflict(format!(
        "A folder named '{name}' already exists in this location"
    ))
}

/// Whether `ancestor` appears on the parent chain starting at `start`.
fn has_ancestor(
    folders: &Table<'_, &'static [u8], &'static [u8]>,
    scope: &OwnerScope,
    start: &str,
    ancestor: &str,
) -> DbResult<bool> {
    let mut seen = HashSet::new();
    let mut current = Some(start.to_string());

    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id.clone()) {
            break;
        }
        let bytes = folders
            .get(scope.record(&id).as_slice())?
            .map(|v| v.value().to_vec());
        current = match bytes {
            Some(bytes) => serde_json::from_slice::<Folder>(&bytes)?
                .parent
                .folder_id()
                .map(str::to_string),
            None => None,
        };
    }
    Ok(false)
}
