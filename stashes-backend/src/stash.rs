use axum::extract::{Path, State};
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};
use stashes_shared::error::StashError;
use stashes_shared::stash::NewStash;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entity::{file, stash};
use crate::SharedState;

/// Seconds a client should wait before retrying a contended write
pub const RETRY_AFTER_SECS: u32 = 1;

#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl WebError {
    pub fn new(status: StatusCode, message: String) -> Self {
        WebError {
            status,
            message,
            retryable: false,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn not_found(message: String) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: String) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        let mut response = axum::response::Response::new(body.to_string().into());
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

impl From<DbErr> for WebError {
    fn from(err: DbErr) -> Self {
        StashError::from(err).into()
    }
}

impl From<StashError> for WebError {
    fn from(err: StashError) -> Self {
        let retryable = err.is_retryable();
        let web = match err {
            StashError::NotFound(message) => WebError::not_found(message),
            StashError::ValidationError(message) => WebError::new(StatusCode::BAD_REQUEST, message),
            StashError::Unauthorized(message) => WebError::unauthorized(message),
            // contention, not corruption
            StashError::Conflict(message) => WebError::new(StatusCode::CONFLICT, message),
            StashError::Timeout(message) => {
                WebError::new(StatusCode::SERVICE_UNAVAILABLE, message)
            }
            StashError::Database(err) => {
                error!(error = ?err, "Database error");
                WebError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {:?}", err),
                )
            }
            other => WebError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        match retryable {
            true => web.retryable(),
            false => web,
        }
    }
}

/// Fetch a stash, hiding stashes owned by someone else.
pub(crate) async fn owned_stash<C: ConnectionTrait>(
    conn: &C,
    user: CurrentUser,
    id: Uuid,
) -> Result<stash::Model, WebError> {
    match stash::Entity::find_by_id(id).one(conn).await? {
        Some(stash) if stash.user_id == user.0 => Ok(stash),
        Some(_) => {
            debug!(stash_id = %id, user = %user.0, "Stash belongs to another user");
            Err(WebError::not_found(format!("Stash {} not found", id)))
        }
        None => Err(WebError::not_found(format!("Stash {} not found", id))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/stash",
    request_body = NewStash,
    responses(
        (status = 200, description = "Stash created", body = stash::Model),
        (status = 400, description = "Invalid stash"),
        (status = 401, description = "No caller identity"),
    )
)]
#[instrument(level = "info", skip_all, fields(user = %user.0))]
pub async fn post_stash(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(new): Json<NewStash>,
) -> Result<Json<stash::Model>, WebError> {
    if new.name.trim().is_empty() {
        return Err(WebError::new(
            StatusCode::BAD_REQUEST,
            "Stash name cannot be empty".to_string(),
        ));
    }

    let stash = stash::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.0),
        name: Set(new.name),
        description: Set(new.description),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(&state.read().await.conn)
    .await
    .inspect_err(|err| error!("Failed to save stash: {:?}", err))?;

    debug!("Created stash: {:?}", stash);
    Ok(Json(stash))
}

#[utoipa::path(
    get,
    path = "/api/v1/stashes",
    responses(
        (status = 200, description = "The caller's stashes", body = Vec<stash::Model>),
        (status = 401, description = "No caller identity"),
    )
)]
pub async fn get_stashes(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<Vec<stash::Model>>, WebError> {
    let stashes = stash::Entity::find()
        .filter(stash::Column::UserId.eq(user.0))
        .order_by_asc(stash::Column::Name)
        .all(&state.read().await.conn)
        .await?;
    Ok(Json(stashes))
}

#[utoipa::path(
    get,
    path = "/api/v1/stash/{id}",
    params(("id" = Uuid, Path, description = "Stash id")),
    responses(
        (status = 200, description = "The stash", body = stash::Model),
        (status = 404, description = "Stash not found"),
    )
)]
pub async fn get_stash(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<stash::Model>, WebError> {
    let state = state.read().await;
    Ok(Json(owned_stash(&state.conn, user, id).await?))
}

/// Deletes the stash, its files and their versions.
#[utoipa::path(
    delete,
    path = "/api/v1/stash/{id}",
    params(("id" = Uuid, Path, description = "Stash id")),
    responses(
        (status = 200, description = "Stash deleted"),
        (status = 404, description = "Stash not found"),
    )
)]
#[instrument(level = "info", skip_all, fields(stash_id = %id))]
pub async fn delete_stash(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, WebError> {
    let state = state.read().await;
    let stash = owned_stash(&state.conn, user, id).await?;
    let res = stash.delete(&state.conn).await?;
    debug!(rows = res.rows_affected, "Deleted stash");
    Ok((StatusCode::OK, "Stash deleted successfully".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/stash/{id}/files",
    params(("id" = Uuid, Path, description = "Stash id")),
    responses(
        (status = 200, description = "Files in the stash", body = Vec<file::Model>),
        (status = 404, description = "Stash not found"),
    )
)]
pub async fn get_files_by_stash(
    Path(id): Path<Uuid>,
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<Vec<file::Model>>, WebError> {
    let state = state.read().await;
    let stash = owned_stash(&state.conn, user, id).await?;
    let files = stash
        .find_related(file::Entity)
        .order_by_asc(file::Column::Path)
        .order_by_asc(file::Column::Name)
        .all(&state.conn)
        .await
        .inspect_err(|err| error!("Failed to get files for stash {}: {:?}", id, err))?;
    Ok(Json(files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (StashError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (StashError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (StashError::Conflict("x".into()), StatusCode::CONFLICT),
            (StashError::Timeout("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                StashError::Database(DbErr::Custom("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StashError::Other("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(WebError::from(err).status(), status);
        }
    }

    #[test]
    fn test_error_body_is_json() {
        let res = WebError::not_found("gone".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            res.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert!(res.headers().get(RETRY_AFTER).is_none());
    }

    #[test]
    fn test_contention_asks_for_retry() {
        for err in [
            StashError::Conflict("busy".into()),
            StashError::Timeout("slow".into()),
        ] {
            let res = WebError::from(err).into_response();
            assert_eq!(
                res.headers().get(RETRY_AFTER),
                Some(&HeaderValue::from(RETRY_AFTER_SECS))
            );
        }

        let res = WebError::from(StashError::ValidationError("bad".into())).into_response();
        assert!(res.headers().get(RETRY_AFTER).is_none());
    }
}
