use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(description = "Stashes API Documentation", license(name = "MIT or Apache2", identifier="MIT Apache2.0"), title = "Stashes", version = env!("CARGO_PKG_VERSION")),
    paths(
        crate::stash::post_stash,
        crate::stash::get_stashes,
        crate::stash::get_stash,
        crate::stash::delete_stash,
        crate::stash::get_files_by_stash,
        crate::file::post_file,
        crate::file::get_file,
        crate::file::update_file,
        crate::file::revert_file,
        crate::file::delete_file,
        crate::file::get_versions,
        crate::file::get_latest_version,
        crate::file::get_version
    )
)]
pub struct ApiDoc;

pub(crate) fn api_route<T: Clone + Sync + Send + 'static>() -> Router<T> {
    let doc = ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/api/v1/swagger-ui").url("/api/v1/openapi.json", doc))
}
