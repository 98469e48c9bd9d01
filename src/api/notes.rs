// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{double_option, run_blocking};
use crate::{
    auth::Owner,
    envelope::EncryptionEnvelope,
    error::ApiError,
    models::{DocumentMetadata, DocumentPatch, FolderFilter, FolderRef, NewDocument, NoteContext},
    state::AppState,
};

/// Body of `POST /v1/notes`: the encryption envelope plus note metadata.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub encapsulated_key: String,
    #[serde(default, alias = "wrappedSymmetricKey")]
    pub encrypted_symmetric_key: String,
    /// Base64 ciphertext.
    #[serde(default)]
    pub encrypted_content: String,
    #[serde(default)]
    pub encrypted_title: Option<String>,
    #[serde(default, alias = "folderId")]
    pub note_folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub linked_entity_ids: Vec<String>,
    #[serde(default, alias = "context")]
    #[schema(value_type = Option<Object>)]
    pub educational_context: Option<NoteContext>,
    #[serde(default)]
    pub record_hash: String,
}

impl CreateNoteRequest {
    fn into_parts(self) -> (EncryptionEnvelope, NewDocument) {
        let envelope = EncryptionEnvelope {
            encapsulated_key: self.encapsulated_key,
            wrapped_symmetric_key: self.encrypted_symmetric_key,
            encrypted_content: self.encrypted_content,
            record_hash: self.record_hash,
        };
        let input = NewDocument {
            folder: FolderRef::from(self.note_folder_id),
            encrypted_title: self.encrypted_title,
            tags: self.tags.into_iter().collect(),
            linked_entity_ids: self.linked_entity_ids,
            context: self.educational_context,
        };
        (envelope, input)
    }
}

/// Body of `PATCH /v1/notes/{note_id}`. Absent fields are left unchanged;
/// `null` clears a field (`noteFolderId: null` moves the note to the root).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub encrypted_title: Option<Option<String>>,
    #[serde(default, alias = "folderId", deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub note_folder_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub linked_entity_ids: Option<Vec<String>>,
    #[serde(default, alias = "context", deserialize_with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub educational_context: Option<Option<NoteContext>>,
    pub record_hash: Option<String>,
}

impl From<UpdateNoteRequest> for DocumentPatch {
    fn from(request: UpdateNoteRequest) -> Self {
        DocumentPatch {
            encrypted_title: request.encrypted_title,
            folder: request.note_folder_id.map(FolderRef::from),
            tags: request.tags.map(|tags| tags.into_iter().collect()),
            linked_entity_ids: request.linked_entity_ids,
            context: request.educational_context,
            record_hash: request.record_hash,
        }
    }
}

/// Note metadata as returned to the client. Never includes content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_title: Option<String>,
    pub note_folder_id: Option<String>,
    pub encapsulated_key: String,
    pub encrypted_symmetric_key: String,
    pub content_size: u64,
    pub tags: Vec<String>,
    pub linked_entity_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub educational_context: Option<NoteContext>,
    pub record_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentMetadata> for NoteResponse {
    fn from(doc: DocumentMetadata) -> Self {
        NoteResponse {
            id: doc.id,
            encrypted_title: doc.encrypted_title,
            note_folder_id: doc.folder.into(),
            encapsulated_key: doc.encapsulated_key,
            encrypted_symmetric_key: doc.wrapped_symmetric_key,
            content_size: doc.content_size,
            tags: doc.tags.into_iter().collect(),
            linked_entity_ids: doc.linked_entity_ids,
            educational_context: doc.context,
            record_hash: doc.record_hash,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotesQuery {
    /// Folder id, or `root` for notes outside any folder. Omit for all notes.
    pub folder: Option<String>,
}

impl NotesQuery {
    fn filter(self) -> FolderFilter {
        match self.folder.as_deref().map(str::trim) {
            None | Some("") => FolderFilter::Any,
            Some("root") => FolderFilter::Root,
            Some(id) => FolderFilter::In(id.to_string()),
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/notes",
    request_body = CreateNoteRequest,
    tag = "Notes",
    responses(
        (status = 201, body = NoteResponse),
        (status = 400, description = "Malformed encryption envelope"),
        (status = 401, description = "Missing owner identity")
    )
)]
pub async fn create_note(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    let (envelope, input) = request.into_parts();
    let documents = state.documents.clone();
    let doc = run_blocking(move || documents.create_document(&owner, envelope, input)).await?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

#[utoipa::path(
    get,
    path = "/v1/notes",
    params(NotesQuery),
    tag = "Notes",
    responses((status = 200, body = [NoteResponse]))
)]
pub async fn list_notes(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<NoteResponse>>, ApiError> {
    let filter = query.filter();
    let documents = state.documents.clone();
    let docs = run_blocking(move || documents.list_documents(&owner, &filter)).await?;
    Ok(Json(docs.into_iter().map(NoteResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/notes/{note_id}",
    params(("note_id" = String, Path, description = "Note identifier")),
    tag = "Notes",
    responses(
        (status = 200, body = NoteResponse),
        (status = 404, description = "Note not found")
    )
)]
pub async fn get_note(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(note_id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let documents = state.documents.clone();
    let doc = run_blocking(move || documents.get_document(&owner, &note_id)).await?;
    Ok(Json(doc.into()))
}

/// Ciphertext exactly as uploaded, as `application/octet-stream`.
#[utoipa::path(
    get,
    path = "/v1/notes/{note_id}/content",
    params(("note_id" = String, Path, description = "Note identifier")),
    tag = "Notes",
    responses(
        (status = 200, description = "Encrypted content", content_type = "application/octet-stream"),
        (status = 404, description = "Note not found"),
        (status = 503, description = "Content temporarily unavailable")
    )
)]
pub async fn get_note_content(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(note_id): Path<String>,
) -> Result<Response, ApiError> {
    let documents = state.documents.clone();
    let bytes = run_blocking(move || documents.get_content(&owner, &note_id)).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

#[utoipa::path(
    put,
    path = "/v1/notes/{note_id}/content",
    params(("note_id" = String, Path, description = "Note identifier")),
    request_body = EncryptionEnvelope,
    tag = "Notes",
    responses(
        (status = 200, body = NoteResponse),
        (status = 400, description = "Malformed encryption envelope"),
        (status = 404, description = "Note not found"),
        (status = 409, description = "Content replaced concurrently")
    )
)]
pub async fn replace_note_content(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(note_id): Path<String>,
    Json(envelope): Json<EncryptionEnvelope>,
) -> Result<Json<NoteResponse>, ApiError> {
    let documents = state.documents.clone();
    let doc = run_blocking(move || documents.update_content(&owner, &note_id, envelope)).await?;
    Ok(Json(doc.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/notes/{note_id}",
    params(("note_id" = String, Path, description = "Note identifier")),
    request_body = UpdateNoteRequest,
    tag = "Notes",
    responses(
        (status = 200, body = NoteResponse),
        (status = 404, description = "Note not found")
    )
)]
pub async fn update_note(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(note_id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<NoteResponse>, ApiError> {
    let patch = DocumentPatch::from(request);
    let documents = state.documents.clone();
    let doc = run_blocking(move || documents.update_metadata(&owner, &note_id, patch)).await?;
    Ok(Json(doc.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/notes/{note_id}",
    params(("note_id" = String, Path, description = "Note identifier")),
    tag = "Notes",
    responses(
        (status = 204),
        (status = 404, description = "Note not found")
    )
)]
pub async fn delete_note(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(note_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let documents = state.documents.clone();
    run_blocking(move || documents.remove_document(&owner, &note_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/notes/tags",
    tag = "Notes",
    responses((status = 200, body = [String]))
)]
pub async fn list_tags(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<String>>, ApiError> {
    let documents = state.documents.clone();
    let tags = run_blocking(move || documents.user_tags(&owner)).await?;
    Ok(Json(tags.into_iter().collect()))
}

#[utoipa::path(
    get,
    path = "/v1/notes/backlinks/{entity_id}",
    params(("entity_id" = String, Path, description = "Linked entity identifier")),
    tag = "Notes",
    responses((status = 200, body = [NoteResponse]))
)]
pub async fn list_backlinks(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<NoteResponse>>, ApiError> {
    let documents = state.documents.clone();
    let docs = run_blocking(move || documents.backlinks(&owner, &entity_id)).await?;
    Ok(Json(docs.into_iter().map(NoteResponse::from).collect()))
}
