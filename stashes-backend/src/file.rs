//! File routes. Writes go through the versioning coordinator; reads check that
//! the file's stash belongs to the caller.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sea_orm::{ConnectionTrait, EntityTrait, ModelTrait};
use stashes_shared::file::{FileChanges, NewFile, RevertRequest};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entity::{file, file_version, stash};
use crate::stash::{owned_stash, WebError};
use crate::versioning::{self, FileWrite};
use crate::SharedState;

/// Fetch a file through its stash, hiding files owned by someone else.
pub(crate) async fn owned_file<C: ConnectionTrait>(
    conn: &C,
    user: CurrentUser,
    id: Uuid,
) -> Result<file::Model, WebError> {
    match file::Entity::find_by_id(id)
        .find_also_related(stash::Entity)
        .one(conn)
        .await?
    {
        Some((file, Some(stash))) if stash.user_id == user.0 => Ok(file),
        Some(_) => {
            debug!(file_id = %id, user = %user.0, "File belongs to another user");
            Err(WebError::not_found(format!("File {} not found", id)))
        }
        None => Err(WebError::not_found(format!("File {} not found", id))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/stash/{id}/file",
    params(("id" = Uuid, Path, description = "Stash id")),
    request_body = NewFile,
    responses(
        (status = 200, description = "File created with version 1", body = FileWrite),
        (status = 400, description = "Invalid file"),
        (status = 404, description = "Stash not found"),
        (status = 409, description = "Version allocation contention, retry"),
    )
)]
#[instrument(level = "info", skip_all, fields(stash_id = %stash_id))]
pub async fn post_file(
    Path(stash_id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(new): Json<NewFile>,
) -> Result<Json<FileWrite>, WebError> {
    let state = state.read().await;
    owned_stash(&state.conn, user, stash_id).await?;
    let write =
        versioning::create_file(&state.conn, &state.versioning, stash_id, new, user.0).await?;
    Ok(Json(write))
}

#[utoipa::path(
    get,
    path = "/api/v1/file/{id}",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "The file", body = file::Model),
        (status = 404, description = "File not found"),
    )
)]
pub async fn get_file(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<file::Model>, WebError> {
    let state = state.read().await;
    Ok(Json(owned_file(&state.conn, user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/file/{id}",
    params(("id" = Uuid, Path, description = "File id")),
    request_body = FileChanges,
    responses(
        (status = 200, description = "File updated, with the new version if the content changed", body = FileWrite),
        (status = 400, description = "Invalid change"),
        (status = 404, description = "File not found"),
        (status = 409, description = "Version allocation contention, retry"),
        (status = 503, description = "Transaction timed out"),
    )
)]
#[instrument(level = "info", skip_all, fields(file_id = %id))]
pub async fn update_file(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(changes): Json<FileChanges>,
) -> Result<Json<FileWrite>, WebError> {
    let state = state.read().await;
    owned_file(&state.conn, user, id).await?;
    let write = versioning::update_file(&state.conn, &state.versioning, id, changes, user.0).await?;
    Ok(Json(write))
}

#[utoipa::path(
    post,
    path = "/api/v1/file/{id}/revert",
    params(("id" = Uuid, Path, description = "File id")),
    request_body = RevertRequest,
    responses(
        (status = 200, description = "Old content appended as a new version", body = FileWrite),
        (status = 404, description = "File or version not found"),
        (status = 409, description = "Version allocation contention, retry"),
        (status = 503, description = "Transaction timed out"),
    )
)]
#[instrument(level = "info", skip_all, fields(file_id = %id))]
pub async fn revert_file(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(revert): Json<RevertRequest>,
) -> Result<Json<FileWrite>, WebError> {
    let state = state.read().await;
    owned_file(&state.conn, user, id).await?;
    let write =
        versioning::revert_file(&state.conn, &state.versioning, id, revert.version, user.0)
            .await?;
    Ok(Json(write))
}

#[utoipa::path(
    delete,
    path = "/api/v1/file/{id}",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "File and its versions deleted"),
        (status = 404, description = "File not found"),
    )
)]
#[instrument(level = "info", skip_all, fields(file_id = %id))]
pub async fn delete_file(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, WebError> {
    let state = state.read().await;
    let file = owned_file(&state.conn, user, id).await?;
    let res = file.delete(&state.conn).await?;
    debug!(rows = res.rows_affected, "Deleted file");
    Ok((StatusCode::OK, "File deleted successfully".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/file/{id}/versions",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "Version history, newest first", body = Vec<file_version::Model>),
        (status = 404, description = "File not found"),
    )
)]
pub async fn get_versions(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<Vec<file_version::Model>>, WebError> {
    let state = state.read().await;
    owned_file(&state.conn, user, id).await?;
    Ok(Json(versioning::list_versions(&state.conn, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/file/{id}/version/{version}",
    params(
        ("id" = Uuid, Path, description = "File id"),
        ("version" = i32, Path, description = "Version number"),
    ),
    responses(
        (status = 200, description = "The version", body = file_version::Model),
        (status = 404, description = "File or version not found"),
    )
)]
pub async fn get_version(
    Path((id, version)): Path<(Uuid, i32)>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<file_version::Model>, WebError> {
    let state = state.read().await;
    owned_file(&state.conn, user, id).await?;
    versioning::get_version(&state.conn, id, version)
        .await?
        .map(Json)
        .ok_or_else(|| WebError::not_found(format!("Version {} of file {} not found", version, id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/file/{id}/versions/latest",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "The newest version", body = file_version::Model),
        (status = 404, description = "File not found, or it has no versions"),
    )
)]
pub async fn get_latest_version(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<file_version::Model>, WebError> {
    let state = state.read().await;
    owned_file(&state.conn, user, id).await?;
    versioning::latest_version(&state.conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| WebError::not_found(format!("File {} has no versions", id)))
}
