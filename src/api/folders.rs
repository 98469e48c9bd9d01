// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{double_option, run_blocking};
use crate::{
    auth::Owner,
    error::ApiError,
    models::{Folder, FolderPatch, FolderRef, FolderRemoval, NewFolder},
    state::AppState,
};

/// Path segment addressing the top of the tree in `/folders/{id}/children`.
const ROOT_SEGMENT: &str = "root";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl From<CreateFolderRequest> for NewFolder {
    fn from(request: CreateFolderRequest) -> Self {
        NewFolder {
            name: request.name,
            parent: FolderRef::from(request.parent_id),
            color: request.color,
        }
    }
}

/// `parentId: null` moves the folder to the top level; `color: null` clears it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub color: Option<Option<String>>,
}

impl From<UpdateFolderRequest> for FolderPatch {
    fn from(request: UpdateFolderRequest) -> Self {
        FolderPatch {
            name: request.name,
            parent: request.parent_id.map(FolderRef::from),
            color: request.color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        FolderResponse {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent.into(),
            color: folder.color,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }
}

fn responses(folders: Vec<Folder>) -> Vec<FolderResponse> {
    folders.into_iter().map(FolderResponse::from).collect()
}

#[utoipa::path(
    post,
    path = "/v1/folders",
    request_body = CreateFolderRequest,
    tag = "Folders",
    responses(
        (status = 201, body = FolderResponse),
        (status = 404, description = "Parent folder not found"),
        (status = 409, description = "A sibling already has this name"),
        (status = 422, description = "Blank folder name")
    )
)]
pub async fn create_folder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), ApiError> {
    let folders = state.folders.clone();
    let input = NewFolder::from(request);
    let folder = run_blocking(move || folders.create_folder(&owner, input)).await?;
    Ok((StatusCode::CREATED, Json(folder.into())))
}

#[utoipa::path(
    get,
    path = "/v1/folders",
    tag = "Folders",
    responses((status = 200, body = [FolderResponse]))
)]
pub async fn list_folders(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let folders = state.folders.clone();
    let all = run_blocking(move || folders.find_all(&owner)).await?;
    Ok(Json(responses(all)))
}

#[utoipa::path(
    get,
    path = "/v1/folders/{folder_id}",
    params(("folder_id" = String, Path, description = "Folder identifier")),
    tag = "Folders",
    responses(
        (status = 200, body = FolderResponse),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn get_folder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folders = state.folders.clone();
    let folder = run_blocking(move || folders.find_one(&owner, &folder_id)).await?;
    Ok(Json(folder.into()))
}

/// Direct children of a folder. Use `root` as the id for top-level folders.
#[utoipa::path(
    get,
    path = "/v1/folders/{folder_id}/children",
    params(("folder_id" = String, Path, description = "Folder identifier or `root`")),
    tag = "Folders",
    responses(
        (status = 200, body = [FolderResponse]),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn list_children(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(folder_id): Path<String>,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let parent = if folder_id == ROOT_SEGMENT {
        FolderRef::Root
    } else {
        FolderRef::Folder(folder_id)
    };
    let folders = state.folders.clone();
    let children = run_blocking(move || folders.find_children(&owner, &parent)).await?;
    Ok(Json(responses(children)))
}

#[utoipa::path(
    get,
    path = "/v1/folders/{folder_id}/descendants",
    params(("folder_id" = String, Path, description = "Folder identifier")),
    tag = "Folders",
    responses(
        (status = 200, description = "Ids of every folder below this one", body = [String]),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn list_descendants(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(folder_id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let folders = state.folders.clone();
    let ids = run_blocking(move || folders.find_descendants(&owner, &folder_id)).await?;
    Ok(Json(ids.into_iter().collect()))
}

#[utoipa::path(
    patch,
    path = "/v1/folders/{folder_id}",
    params(("folder_id" = String, Path, description = "Folder identifier")),
    request_body = UpdateFolderRequest,
    tag = "Folders",
    responses(
        (status = 200, body = FolderResponse),
        (status = 404, description = "Folder or new parent not found"),
        (status = 409, description = "A sibling already has this name"),
        (status = 422, description = "Move would create a cycle")
    )
)]
pub async fn update_folder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(folder_id): Path<String>,
    Json(request): Json<UpdateFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folders = state.folders.clone();
    let patch = FolderPatch::from(request);
    let folder = run_blocking(move || folders.update_folder(&owner, &folder_id, patch)).await?;
    Ok(Json(folder.into()))
}

/// Remove a folder with its subtree; notes inside move to the root.
#[utoipa::path(
    delete,
    path = "/v1/folders/{folder_id}",
    params(("folder_id" = String, Path, description = "Folder identifier")),
    tag = "Folders",
    responses(
        (status = 200, body = FolderRemoval),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn delete_folder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderRemoval>, ApiError> {
    let folders = state.folders.clone();
    let summary = run_blocking(move || folders.remove_folder(&owner, &folder_id)).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::{json, send, test_state};
    use axum::Router;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;

    async fn make_folder(app: &Router, owner: &str, name: &str, parent: Option<&str>) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/v1/folders",
            Some(owner),
            Some(json!({ "name": name, "parentId": parent })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "creating {name}");
        json(&body)["id"].as_str().unwrap().to_string()
    }

    async fn make_note(app: &Router, owner: &str, folder: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/v1/notes",
            Some(owner),
            Some(json!({
                "encapsulatedKey": "kem",
                "encryptedSymmetricKey": "wrapped",
                "encryptedContent": STANDARD.encode(b"note"),
                "noteFolderId": folder,
                "recordHash": "h"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json(&body)["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn update_request_separates_null_from_absent() {
        let patch: FolderPatch =
            serde_json::from_value::<UpdateFolderRequest>(json!({ "parentId": null }))
                .unwrap()
                .into();
        assert_eq!(patch.parent, Some(FolderRef::Root));
        assert_eq!(patch.color, None);

        let patch: FolderPatch =
            serde_json::from_value::<UpdateFolderRequest>(json!({ "color": null, "name": "A" }))
                .unwrap()
                .into();
        assert_eq!(patch.parent, None);
        assert_eq!(patch.color, Some(None));
        assert_eq!(patch.name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn duplicate_sibling_name_is_conflict() {
        let (_temp, state) = test_state();
        let app = router(state);

        make_folder(&app, "u1", "Physics", None).await;
        let (status, _) = send(
            &app,
            "POST",
            "/v1/folders",
            Some("u1"),
            Some(json!({ "name": "Physics" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Same name for another owner is fine
        make_folder(&app, "u2", "Physics", None).await;
    }

    #[tokio::test]
    async fn moving_into_descendant_is_unprocessable() {
        let (_temp, state) = test_state();
        let app = router(state);

        let a = make_folder(&app, "u1", "A", None).await;
        let b = make_folder(&app, "u1", "B", Some(&a)).await;
        let c = make_folder(&app, "u1", "C", Some(&b)).await;

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/v1/folders/{a}"),
            Some("u1"),
            Some(json!({ "parentId": c })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/v1/folders/{a}/descendants"),
            Some("u1"),
            None,
        )
        .await;
        let mut ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        ids.sort();
        let mut expected = vec![b.clone(), c.clone()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn children_of_root_and_folder() {
        let (_temp, state) = test_state();
        let app = router(state);

        let a = make_folder(&app, "u1", "A", None).await;
        make_folder(&app, "u1", "Z", None).await;
        make_folder(&app, "u1", "B", Some(&a)).await;

        let (status, body) = send(&app, "GET", "/v1/folders/root/children", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<String> = json(&body)
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A", "Z"]);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/v1/folders/{a}/children"),
            Some("u1"),
            None,
        )
        .await;
        assert_eq!(json(&body)[0]["name"], "B");
        assert_eq!(json(&body)[0]["parentId"], a.as_str());
    }

    #[tokio::test]
    async fn delete_cascades_and_moves_notes_to_root() {
        let (_temp, state) = test_state();
        let app = router(state);

        let a = make_folder(&app, "u1", "A", None).await;
        let b = make_folder(&app, "u1", "B", Some(&a)).await;
        let note_in_a = make_note(&app, "u1", &a).await;
        let note_in_b = make_note(&app, "u1", &b).await;

        let (status, body) = send(&app, "DELETE", &format!("/v1/folders/{a}"), Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let summary = json(&body);
        assert_eq!(summary["foldersRemoved"], 2);
        assert_eq!(summary["documentsMoved"], 2);

        let (_, body) = send(&app, "GET", "/v1/folders", Some("u1"), None).await;
        assert!(json(&body).as_array().unwrap().is_empty());

        for note in [note_in_a, note_in_b] {
            let (status, body) =
                send(&app, "GET", &format!("/v1/notes/{note}"), Some("u1"), None).await;
            assert_eq!(status, StatusCode::OK);
            assert!(json(&body)["noteFolderId"].is_null());
        }
    }

    #[tokio::test]
    async fn folders_of_other_owners_are_not_found() {
        let (_temp, state) = test_state();
        let app = router(state);

        let a = make_folder(&app, "u1", "Private", None).await;

        let (status, _) = send(&app, "GET", &format!("/v1/folders/{a}"), Some("u2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/v1/folders/{a}"), Some("u2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "POST",
            "/v1/folders",
            Some("u2"),
            Some(json!({ "name": "Child", "parentId": a })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Still there for its owner
        let (status, _) = send(&app, "GET", &format!("/v1/folders/{a}"), Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn rename_and_clear_color() {
        let (_temp, state) = test_state();
        let app = router(state);

        let (_, body) = send(
            &app,
            "POST",
            "/v1/folders",
            Some("u1"),
            Some(json!({ "name": "Drafts", "color": "#ff0000" })),
        )
        .await;
        let created = json(&body);
        assert_eq!(created["color"], "#ff0000");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/v1/folders/{id}"),
            Some("u1"),
            Some(json!({ "name": "Final", "color": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated = json(&body);
        assert_eq!(updated["name"], "Final");
        assert!(updated["color"].is_null());
    }
}
