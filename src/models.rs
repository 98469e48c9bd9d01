// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Persisted records and the service-level input types for notes and
//! folders.
//!
//! ## Owner Scoping
//!
//! Every lookup takes an [`OwnerId`]. It can only be built from a non-empty
//! string, so a missing owner is rejected before any query runs.
//!
//! ## Folder References
//!
//! A note's folder and a folder's parent are both a [`FolderRef`]: either the
//! tree root or a folder id. References to folders that no longer exist are
//! tolerated and read back as [`FolderRef::Root`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::NoteError;

/// Free-form key/value context attached to a note.
pub type NoteContext = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Owner Identity
// =============================================================================

/// Verified identifier of the user owning a note or folder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap an owner id supplied by the authentication layer.
    pub fn new(value: impl Into<String>) -> Result<Self, NoteError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(NoteError::invalid("owner id must not be empty"));
        }
        Ok(OwnerId(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = NoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OwnerId::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

// =============================================================================
// Folder Reference
// =============================================================================

/// Position in the folder tree: the root, or inside a specific folder.
///
/// Serialized as a nullable folder id (`null` = root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum FolderRef {
    #[default]
    Root,
    Folder(String),
}

impl FolderRef {
    pub fn folder_id(&self) -> Option<&str> {
        match self {
            FolderRef::Root => None,
            FolderRef::Folder(id) => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, FolderRef::Root)
    }
}

impl From<Option<String>> for FolderRef {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) if !id.is_empty() => FolderRef::Folder(id),
            _ => FolderRef::Root,
        }
    }
}

impl From<FolderRef> for Option<String> {
    fn from(value: FolderRef) -> Self {
        match value {
            FolderRef::Root => None,
            FolderRef::Folder(id) => Some(id),
        }
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderRef::Root => write!(f, "root"),
            FolderRef::Folder(id) => write!(f, "{id}"),
        }
    }
}

// =============================================================================
// Folder
// =============================================================================

/// A folder in a user's tree.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    #[schema(value_type = String)]
    pub owner_id: OwnerId,
    /// Unique among siblings with the same owner and parent.
    pub name: String,
    #[serde(rename = "parentId", default)]
    #[schema(value_type = Option<String>)]
    pub parent: FolderRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a folder.
#[derive(Debug, Clone, Default)]
pub struct NewFolder {
    pub name: String,
    pub parent: FolderRef,
    pub color: Option<String>,
}

/// Partial folder update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    /// `Some(FolderRef::Root)` moves the folder to the top level.
    pub parent: Option<FolderRef>,
    /// `Some(None)` clears the color.
    pub color: Option<Option<String>>,
}

/// Outcome of a cascading folder removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolderRemoval {
    /// Target folder plus every descendant removed.
    pub folders_removed: usize,
    /// Notes moved to the root because their folder was removed.
    pub documents_moved: usize,
}

// =============================================================================
// Document
// =============================================================================

/// Persisted metadata of an encrypted note. Never contains plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,
    #[schema(value_type = String)]
    pub owner_id: OwnerId,
    /// Client-encrypted title; absent means untitled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_title: Option<String>,
    #[serde(rename = "folderId", default)]
    #[schema(value_type = Option<String>)]
    pub folder: FolderRef,
    /// KEM ciphertext produced against the owner's public key.
    pub encapsulated_key: String,
    /// Content key wrapped under the encapsulated shared secret.
    pub wrapped_symmetric_key: String,
    /// Opaque handle into the blob store.
    pub content_blob_handle: String,
    /// Exact byte length of the stored ciphertext.
    pub content_size: u64,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub linked_entity_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub context: Option<NoteContext>,
    /// Client-computed integrity hash; not verified here.
    pub record_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentMetadata {
    /// Whether every piece of decryption material is present.
    pub fn has_decryption_material(&self) -> bool {
        !self.encapsulated_key.is_empty()
            && !self.wrapped_symmetric_key.is_empty()
            && !self.content_blob_handle.is_empty()
            && !self.record_hash.is_empty()
    }
}

/// Non-content fields supplied when creating a note.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub folder: FolderRef,
    pub encrypted_title: Option<String>,
    pub tags: BTreeSet<String>,
    pub linked_entity_ids: Vec<String>,
    pub context: Option<NoteContext>,
}

/// Partial metadata update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    /// `Some(None)` removes the title.
    pub encrypted_title: Option<Option<String>>,
    /// `Some(FolderRef::Root)` moves the note to the root.
    pub folder: Option<FolderRef>,
    pub tags: Option<BTreeSet<String>>,
    pub linked_entity_ids: Option<Vec<String>>,
    /// `Some(None)` removes the context.
    pub context: Option<Option<NoteContext>>,
    pub record_hash: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.encrypted_title.is_none()
            && self.folder.is_none()
            && self.tags.is_none()
            && self.linked_entity_ids.is_none()
            && self.context.is_none()
            && self.record_hash.is_none()
    }
}

/// Folder selection when listing notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FolderFilter {
    #[default]
    Any,
    /// Root notes, including those whose folder no longer exists.
    Root,
    In(String),
}
