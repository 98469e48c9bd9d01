// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by the services and its HTTP mapping.
//!
//! Services return [`NoteError`]; handlers convert it into [`ApiError`].
//! "Not found" and "owned by someone else" are the same variant so the
//! caller can never probe for other users' documents.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::envelope::EnvelopeError;
use crate::storage::{BlobError, DbError, StorageError};

/// Domain error kinds surfaced by the document and folder services.
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    /// Entity absent, or present but owned by a different user.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness invariant would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Required encryption fields missing or not decodable.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),

    /// Structurally invalid request that is not an envelope problem.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Metadata exists but the referenced blob could not be retrieved.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// Backing-store failure during a read or write.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

/// Result type for service operations.
pub type NoteResult<T> = Result<T, NoteError>;

impl NoteError {
    pub fn not_found(what: impl Into<String>) -> Self {
        NoteError::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        NoteError::InvalidRequest(message.into())
    }
}

impl From<DbError> for NoteError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => NoteError::NotFound(what),
            DbError::Conflict(msg) => NoteError::Conflict(msg),
            DbError::InvalidMove(msg) => NoteError::InvalidRequest(msg),
            other => NoteError::StorageFailure(other.to_string()),
        }
    }
}

impl From<StorageError> for NoteError {
    fn from(e: StorageError) -> Self {
        NoteError::StorageFailure(e.to_string())
    }
}

impl From<BlobError> for NoteError {
    fn from(e: BlobError) -> Self {
        NoteError::StorageFailure(e.to_string())
    }
}

// =============================================================================
// HTTP mapping
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<NoteError> for ApiError {
    fn from(e: NoteError) -> Self {
        match e {
            NoteError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            NoteError::Conflict(msg) => ApiError::conflict(msg),
            NoteError::MalformedEnvelope(inner) => ApiError::bad_request(inner.to_string()),
            NoteError::InvalidRequest(msg) => ApiError::unprocessable(msg),
            NoteError::ContentUnavailable(detail) => {
                tracing::warn!(error = %detail, "Note content unavailable");
                ApiError::unavailable("Note content is temporarily unavailable")
            }
            NoteError::StorageFailure(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                ApiError::internal("Internal storage error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
