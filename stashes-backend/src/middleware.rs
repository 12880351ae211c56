//! Axum middleware things
//!

use axum::http::{header::CONTENT_TYPE, HeaderName, Method};
use stashes_shared::USER_HEADER;
use tower_http::cors::{Any, CorsLayer};

pub fn corslayer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)])
        // allow requests from any origin
        .allow_origin(Any)
}
