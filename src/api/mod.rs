// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use serde::{Deserialize, Deserializer};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    envelope::EncryptionEnvelope,
    error::{ApiError, NoteResult},
    models::FolderRemoval,
    state::AppState,
};

pub mod folders;
pub mod health;
pub mod notes;

/// Request bodies carry base64, which is 4/3 of the decoded size, plus JSON
/// framing and metadata.
fn body_limit(max_content_bytes: usize) -> usize {
    max_content_bytes
        .saturating_mul(4)
        / 3
        + 64 * 1024
}

pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.config.max_content_bytes);

    let v1_routes = Router::new()
        .route("/notes", get(notes::list_notes).post(notes::create_note))
        .route("/notes/tags", get(notes::list_tags))
        .route("/notes/backlinks/{entity_id}", get(notes::list_backlinks))
        .route(
            "/notes/{note_id}",
            get(notes::get_note)
                .patch(notes::update_note)
                .delete(notes::delete_note),
        )
        .route(
            "/notes/{note_id}/content",
            get(notes::get_note_content).put(notes::replace_note_content),
        )
        .route(
            "/folders",
            get(folders::list_folders).post(folders::create_folder),
        )
        .route(
            "/folders/{folder_id}",
            get(folders::get_folder)
                .patch(folders::update_folder)
                .delete(folders::delete_folder),
        )
        .route("/folders/{folder_id}/children", get(folders::list_children))
        .route(
            "/folders/{folder_id}/descendants",
            get(folders::list_descendants),
        )
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Run a synchronous storage workflow off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> NoteResult<T> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Storage task panicked or was cancelled");
        ApiError::internal("Internal server error")
    })?;
    outcome.map_err(ApiError::from)
}

/// Deserialize a field where `null` and "absent" mean different things.
///
/// Use with `#[serde(default)]`: absent → `None`, `null` → `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        notes::create_note,
        notes::list_notes,
        notes::get_note,
        notes::get_note_content,
        notes::replace_note_content,
        notes::update_note,
        notes::delete_note,
        notes::list_tags,
        notes::list_backlinks,
        folders::create_folder,
        folders::list_folders,
        folders::get_folder,
        folders::list_children,
        folders::list_descendants,
        folders::update_folder,
        folders::delete_folder,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            EncryptionEnvelope,
            FolderRemoval,
            notes::CreateNoteRequest,
            notes::UpdateNoteRequest,
            notes::NoteResponse,
            folders::CreateFolderRequest,
            folders::UpdateFolderRequest,
            folders::FolderResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Notes", description = "Encrypted note storage"),
        (name = "Folders", description = "Folder tree management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;


#[cfg(test)]
mod tests {
    use super::test_support::{send, test_state};
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (_temp, state) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (_temp, state) = test_state();
        let app = router(state);

        let (status, body) = send(&app, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/v1/notes"].is_object());
        assert!(doc["paths"]["/v1/folders/{folder_id}"].is_object());
    }

    #[tokio::test]
    async fn requests_without_owner_are_unauthorized() {
        let (_temp, state) = test_state();
        let app = router(state);

        let (status, body) = send(&app, "GET", "/v1/notes", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error_code"], "missing_owner");
    }

    #[test]
    fn body_limit_covers_base64_expansion() {
        assert!(body_limit(3 * 1024) >= 4 * 1024);
        assert_eq!(body_limit(0), 64 * 1024);
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            field: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.field, None);
        let null: Patch = serde_json::from_str(r#"{"field":null}"#).unwrap();
        assert_eq!(null.field, Some(None));
        let set: Patch = serde_json::from_str(r#"{"field":"x"}"#).unwrap();
        assert_eq!(set.field, Some(Some("x".into())));
    }
}
