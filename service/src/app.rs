//! Router assembly shared by the binary and the integration tests.

use std::sync::Arc;

use axum::{middleware, Extension, Router};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    config::StaticFilesConfig,
    http::security::{security_headers_middleware, HeaderPipeline},
};

/// Prefix under which the delegated API router is mounted.
pub const API_PREFIX: &str = "/_api";

/// Build the application router.
///
/// Layer order, innermost first:
/// 1. Routes: `/` entry document, `/_api` delegated router, static fallback
/// 2. Request tracing
/// 3. Header pipeline middleware
/// 4. Pipeline extension (outermost, so `/_api` handlers can read it)
///
/// The pipeline middleware wraps everything, so nested and fallback responses
/// get the same header set.
pub fn build_app(
    static_files: &StaticFilesConfig,
    api: Router,
    pipeline: Arc<HeaderPipeline>,
) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(&static_files.index_file))
        .nest(API_PREFIX, api)
        .fallback_service(ServeDir::new(&static_files.public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(Extension(pipeline))
}
