pub mod auth;
pub mod cli;
pub mod entity;
pub mod file;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod stash;
pub mod storage;
pub mod versioning;
#[cfg(test)]
mod tests;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use file::{
    delete_file, get_file, get_latest_version, get_version, get_versions, post_file, revert_file,
    update_file,
};
use sea_orm::DatabaseConnection;
use stash::{delete_stash, get_files_by_stash, get_stash, get_stashes, post_stash};
use stashes_shared::error::StashError;
use std::{borrow::Cow, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tower::{BoxError, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer};
use tracing::error;

use crate::{cli::CliOpts, logging::logging_layer, versioning::Versioning};

/// Largest request body we accept, file content included
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub type SharedState = Arc<RwLock<AppState>>;

pub struct AppState {
    pub conn: DatabaseConnection,
    pub versioning: Versioning,
}

impl AppState {
    pub async fn new(cli: &CliOpts) -> Result<Self, StashError> {
        let conn = storage::start_db(&cli.db_location(), cli.slow_query_ms).await?;
        Ok(Self {
            conn,
            versioning: cli.versioning(),
        })
    }

    #[cfg(test)]
    pub async fn test() -> Self {
        let conn = storage::start_db(&storage::DbLocation::Memory, None)
            .await
            .expect("Failed to start test DB");
        Self {
            conn,
            versioning: Versioning::default(),
        }
    }
}

pub fn build_app<T>(shared_state: &SharedState) -> Router<T> {
    // Build our application by composing routes
    let router = Router::new()
        .route("/api/v1/stash", post(post_stash))
        .route("/api/v1/stashes", get(get_stashes))
        .route("/api/v1/stash/{id}", get(get_stash).delete(delete_stash))
        .route("/api/v1/stash/{id}/file", post(post_file))
        .route("/api/v1/stash/{id}/files", get(get_files_by_stash))
        .route(
            "/api/v1/file/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
        .route("/api/v1/file/{id}/revert", post(revert_file))
        .route("/api/v1/file/{id}/versions", get(get_versions))
        .route("/api/v1/file/{id}/versions/latest", get(get_latest_version))
        .route("/api/v1/file/{id}/version/{version}", get(get_version))
        .merge(openapi::api_route());

    router
        // Add middleware to all routes
        .layer(
            ServiceBuilder::new()
                .layer(middleware::corslayer())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    |response: &Response<Body>| {
                        if response.status() == StatusCode::OK {
                            "private, no-transform max-age=0".parse().ok()
                        } else {
                            None
                        }
                    },
                ))
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(Duration::from_secs(30))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(logging_layer()),
        )
        .with_state(shared_state.clone())
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        let msg = "service is overloaded, try again later";
        error!("{}", msg);
        return (StatusCode::SERVICE_UNAVAILABLE, Cow::from(msg));
    }

    let msg = format!("Unhandled internal error: {error}");
    error!("{}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Cow::from(msg))
}

#[tokio::test]
async fn test_handle_error() {
    let err = tower::timeout::error::Elapsed::new();
    let res = handle_error(Box::new(err)).await.into_response();
    let expected = (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out")).into_response();

    assert_eq!(res.status(), expected.status());

    let err = tower::load_shed::error::Overloaded::new();
    let res = handle_error(Box::new(err)).await.into_response();
    let expected = (
        StatusCode::SERVICE_UNAVAILABLE,
        Cow::from("service is overloaded, try again later"),
    )
        .into_response();

    assert_eq!(res.status(), expected.status());
}
