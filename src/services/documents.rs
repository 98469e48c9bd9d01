// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Document service.
//!
//! Coordinates the envelope codec, the blob store and the note repository.
//!
//! ## Ordering
//!
//! - Create: upload blob, then insert the record. A failed insert deletes
//!   the new blob.
//! - Content update: upload new blob, swap the record if it still points at
//!   the blob that was read, then delete the old blob. A failed swap deletes
//!   the new blob instead.
//! - Delete: remove the record, then delete the blob.
//!
//! Blob deletes after a committed record change are best-effort; a failure
//! leaves an unreferenced blob and is only logged.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::envelope::{blob_name_for, EncryptionEnvelope, EnvelopeError};
use crate::error::{NoteError, NoteResult};
use crate::models::{
    DocumentMetadata, DocumentPatch, FolderFilter, FolderRef, NewDocument, OwnerId,
};
use crate::storage::{
    AuditEventKind, AuditOutcome, AuditSink, BlobHandle, BlobStore, BlobTags, DbError,
    DocumentRepository, FolderRepository, NoteDatabase,
};

/// Orchestrates note create/read/update/delete.
#[derive(Clone)]
pub struct DocumentService {
    db: Arc<NoteDatabase>,
    blobs: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditSink>,
    max_content_bytes: usize,
}

impl DocumentService {
    pub fn new(
        db: Arc<NoteDatabase>,
        blobs: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditSink>,
        max_content_bytes: usize,
    ) -> Self {
        Self {
            db,
            blobs,
            audit,
            max_content_bytes,
        }
    }

    fn repo(&self) -> DocumentRepository<'_> {
        DocumentRepository::new(&self.db)
    }

    /// Store a new note from a client-encrypted envelope.
    pub fn create_document(
        &self,
        owner: &OwnerId,
        envelope: EncryptionEnvelope,
        input: NewDocument,
    ) -> NoteResult<DocumentMetadata> {
        let decoded = envelope.decode(self.max_content_bytes)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let handle = self.upload(owner, &id, &decoded.content, now)?;

        let doc = DocumentMetadata {
            id: id.clone(),
            owner_id: owner.clone(),
            encrypted_title: non_empty(input.encrypted_title),
            folder: input.folder,
            encapsulated_key: decoded.encapsulated_key,
            wrapped_symmetric_key: decoded.wrapped_symmetric_key,
            content_blob_handle: handle.to_string(),
            content_size: decoded.content.len() as u64,
            tags: normalize_tags(input.tags),
            linked_entity_ids: input.linked_entity_ids,
            context: input.context,
            record_hash: decoded.record_hash,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo().insert(&doc) {
            self.discard_blob(&handle, &id);
            self.audit.record(
                owner,
                AuditEventKind::NoteCreated,
                AuditOutcome::Failure,
                json!({ "id": id, "error": e.to_string() }),
            );
            return Err(e.into());
        }

        tracing::info!(
            owner_id = %owner,
            document_id = %id,
            size = doc.content_size,
            "Created note"
        );
        self.audit.record(
            owner,
            AuditEventKind::NoteCreated,
            AuditOutcome::Success,
            json!({ "id": id, "size": doc.content_size }),
        );

        self.resolve_folder(owner, doc)
    }

    /// Metadata of one of `owner`'s notes.
    pub fn get_document(&self, owner: &OwnerId, id: &str) -> NoteResult<DocumentMetadata> {
        let doc = self.load(owner, id)?;
        self.resolve_folder(owner, doc)
    }

    /// Ciphertext of one of `owner`'s notes, exactly as uploaded.
    pub fn get_content(&self, owner: &OwnerId, id: &str) -> NoteResult<Vec<u8>> {
        let doc = self.load(owner, id)?;
        let handle = BlobHandle::from_stored(doc.content_blob_handle.as_str());

        let bytes = self.blobs.get(&handle).map_err(|e| {
            NoteError::ContentUnavailable(format!("note {id}, blob {handle}: {e}"))
        })?;

        if bytes.len() as u64 != doc.content_size {
            return Err(NoteError::ContentUnavailable(format!(
                "note {id}: blob holds {} bytes, record says {}",
                bytes.len(),
                doc.content_size
            )));
        }
        Ok(bytes)
    }

    /// Replace a note's ciphertext and key material.
    pub fn update_content(
        &self,
        owner: &OwnerId,
        id: &str,
        envelope: EncryptionEnvelope,
    ) -> NoteResult<DocumentMetadata> {
        let decoded = envelope.decode(self.max_content_bytes)?;
        let current = self.load(owner, id)?;
        let expected_handle = current.content_blob_handle;
        let now = Utc::now();

        let new_handle = self.upload(owner, id, &decoded.content, now)?;
        let new_handle_str = new_handle.to_string();
        let size = decoded.content.len() as u64;

        let swapped = self.repo().modify(owner, id, |doc| {
            if doc.content_blob_handle != expected_handle {
                return Err(DbError::Conflict(format!(
                    "Note {id} content was replaced concurrently"
                )));
            }
            doc.encapsulated_key = decoded.encapsulated_key;
            doc.wrapped_symmetric_key = decoded.wrapped_symmetric_key;
            doc.content_blob_handle = new_handle_str;
            doc.content_size = size;
            doc.record_hash = decoded.record_hash;
            doc.updated_at = now;
            Ok(())
        });

        let updated = match swapped {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_blob(&new_handle, id);
                self.audit.record(
                    owner,
                    AuditEventKind::NoteContentUpdated,
                    AuditOutcome::Failure,
                    json!({ "id": id, "error": e.to_string() }),
                );
                return Err(e.into());
            }
        };

        self.discard_blob(&BlobHandle::from_stored(expected_handle.as_str()), id);

        tracing::info!(owner_id = %owner, document_id = %id, size, "Replaced note content");
        self.audit.record(
            owner,
            AuditEventKind::NoteContentUpdated,
            AuditOutcome::Success,
            json!({ "id": id, "size": size }),
        );

        self.resolve_folder(owner, updated)
    }

    /// Update non-content fields. Absent patch fields are left unchanged.
    pub fn update_metadata(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: DocumentPatch,
    ) -> NoteResult<DocumentMetadata> {
        if let Some(hash) = &patch.record_hash {
            if hash.trim().is_empty() {
                return Err(EnvelopeError::MissingField("recordHash").into());
            }
        }
        if patch.is_empty() {
            return self.get_document(owner, id);
        }

        let updated = self.repo().modify(owner, id, |doc| {
            if let Some(title) = patch.encrypted_title {
                doc.encrypted_title = non_empty(title);
            }
            if let Some(folder) = patch.folder {
                doc.folder = folder;
            }
            if let Some(tags) = patch.tags {
                doc.tags = normalize_tags(tags);
            }
            if let Some(linked) = patch.linked_entity_ids {
                doc.linked_entity_ids = linked;
            }
            if let Some(context) = patch.context {
                doc.context = context;
            }
            if let Some(hash) = patch.record_hash {
                doc.record_hash = hash;
            }
            doc.updated_at = Utc::now();
            Ok(())
        })?;

        tracing::debug!(owner_id = %owner, document_id = %id, "Updated note metadata");
        self.audit.record(
            owner,
            AuditEventKind::NoteMetadataUpdated,
            AuditOutcome::Success,
            json!({ "id": id }),
        );

        self.resolve_folder(owner, updated)
    }

    /// Delete a note and its ciphertext.
    pub fn remove_document(&self, owner: &OwnerId, id: &str) -> NoteResult<()> {
        let removed = self
            .repo()
            .delete(owner, id)?
            .ok_or_else(|| NoteError::not_found(format!("Note {id}")))?;

        self.discard_blob(
            &BlobHandle::from_stored(removed.content_blob_handle.as_str()),
            id,
        );

        tracing::info!(owner_id = %owner, document_id = %id, "Deleted note");
        self.audit.record(
            owner,
            AuditEventKind::NoteDeleted,
            AuditOutcome::Success,
            json!({ "id": id }),
        );
        Ok(())
    }

    /// Distinct tags across all of `owner`'s notes.
    pub fn user_tags(&self, owner: &OwnerId) -> NoteResult<BTreeSet<String>> {
        let tags = self
            .repo()
            .list(owner)?
            .into_iter()
            .flat_map(|doc| doc.tags)
            .collect();
        Ok(tags)
    }

    /// `owner`'s notes that link to `entity_id`, newest first.
    pub fn backlinks(&self, owner: &OwnerId, entity_id: &str) -> NoteResult<Vec<DocumentMetadata>> {
        let linking = self
            .repo()
            .list(owner)?
            .into_iter()
            .filter(|doc| doc.linked_entity_ids.iter().any(|e| e == entity_id))
            .collect();
        self.resolve_all(owner, linking)
    }

    /// `owner`'s notes matching `filter`, newest first.
    pub fn list_documents(
        &self,
        owner: &OwnerId,
        filter: &FolderFilter,
    ) -> NoteResult<Vec<DocumentMetadata>> {
        let docs = self.resolve_all(owner, self.repo().list(owner)?)?;
        Ok(docs
            .into_iter()
            .filter(|doc| match filter {
                FolderFilter::Any => true,
                FolderFilter::Root => doc.folder.is_root(),
                FolderFilter::In(id) => doc.folder.folder_id() == Some(id.as_str()),
            })
            .collect())
    }

    /// Move every note filed under `folder_id` to the root.
    pub fn move_documents_to_root(&self, owner: &OwnerId, folder_id: &str) -> NoteResult<usize> {
        let moved = self.repo().move_to_root(owner, folder_id)?;
        if moved > 0 {
            tracing::debug!(owner_id = %owner, folder_id = %folder_id, moved, "Moved notes to root");
        }
        Ok(moved)
    }

    // ========== Helpers ==========

    fn load(&self, owner: &OwnerId, id: &str) -> NoteResult<DocumentMetadata> {
        self.repo()
            .get(owner, id)?
            .ok_or_else(|| NoteError::not_found(format!("Note {id}")))
    }

    fn upload(
        &self,
        owner: &OwnerId,
        id: &str,
        content: &[u8],
        at: DateTime<Utc>,
    ) -> NoteResult<BlobHandle> {
        let mut tags = BlobTags::new();
        tags.insert("kind".to_string(), "note-content".to_string());
        tags.insert("documentId".to_string(), id.to_string());

        let handle = self
            .blobs
            .put(content, &blob_name_for(owner, id, at), &tags)?;
        Ok(handle)
    }

    fn discard_blob(&self, handle: &BlobHandle, document_id: &str) {
        if let Err(e) = self.blobs.delete(handle) {
            tracing::warn!(
                error = %e,
                document_id = %document_id,
                handle = %handle,
                "Failed to delete blob, leaving it orphaned"
            );
        }
    }

    /// Report a dangling folder reference as the root.
    fn resolve_folder(&self, owner: &OwnerId, mut doc: DocumentMetadata) -> NoteResult<DocumentMetadata> {
        if let Some(folder_id) = doc.folder.folder_id() {
            if !FolderRepository::new(&self.db).exists(owner, folder_id)? {
                doc.folder = FolderRef::Root;
            }
        }
        Ok(doc)
    }

    fn resolve_all(
        &self,
        owner: &OwnerId,
        mut docs: Vec<DocumentMetadata>,
    ) -> NoteResult<Vec<DocumentMetadata>> {
        let folder_ids: HashSet<String> = FolderRepository::new(&self.db)
            .list(owner)?
            .into_iter()
            .map(|f| f.id)
            .collect();

        for doc in &mut docs {
            let dangling = doc
                .folder
                .folder_id()
                .is_some_and(|id| !folder_ids.contains(id));
            if dangling {
                doc.folder = FolderRef::Root;
            }
        }
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_tags(tags: BTreeSet<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
