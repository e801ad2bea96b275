//! Delegated API router mounted under `/_api`.
//!
//! Any `axum::Router` can be mounted there; this is the default one. It
//! reports the active header pipeline and the running version, and answers
//! unknown paths with an RFC 7807 problem document.

use std::sync::Arc;

use axum::{
    extract::{Extension, OriginalUri},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Serialize, Serializer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{
    config::CorsConfig,
    http::security::{Condition, HeaderAction, HeaderPipeline},
};

/// Serialize a `StatusCode` as its `u16` representation.
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires `&T` signature
fn serialize_status_code<S: Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

/// RFC 7807 Problem Details error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Short human-readable summary
    pub title: String,
    /// HTTP status code
    #[serde(serialize_with = "serialize_status_code")]
    pub status: StatusCode,
    /// Human-readable explanation specific to this occurrence
    pub detail: String,
    /// URI reference identifying the specific occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Create a not-found response for the given path.
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: "Not Found".to_string(),
            status: StatusCode::NOT_FOUND,
            detail: format!("No API route matches '{path}'"),
            instance: Some(path.to_string()),
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}

/// Report of the active header pipeline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub version: &'static str,
    pub enabled: bool,
    pub trust_proxy: bool,
    pub steps: Vec<StepInfo>,
}

#[derive(Debug, Serialize)]
pub struct StepInfo {
    pub name: &'static str,
    pub condition: Condition,
    pub headers: Vec<HeaderInfo>,
}

#[derive(Debug, Serialize)]
pub struct HeaderInfo {
    pub name: String,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<&HeaderAction> for HeaderInfo {
    fn from(action: &HeaderAction) -> Self {
        Self {
            name: action.header().as_str().to_string(),
            action: match action {
                HeaderAction::Set(..) => "set",
                HeaderAction::Remove(_) => "remove",
            },
            value: action
                .value()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        }
    }
}

impl From<&HeaderPipeline> for AppInfo {
    fn from(pipeline: &HeaderPipeline) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            enabled: !pipeline.is_empty(),
            trust_proxy: pipeline.trust_proxy(),
            steps: pipeline
                .steps()
                .iter()
                .map(|step| StepInfo {
                    name: step.name(),
                    condition: step.condition(),
                    headers: step.actions().iter().map(HeaderInfo::from).collect(),
                })
                .collect(),
        }
    }
}

async fn app_info(Extension(pipeline): Extension<Arc<HeaderPipeline>>) -> Json<AppInfo> {
    Json(AppInfo::from(pipeline.as_ref()))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ProblemDetails {
    ProblemDetails::not_found(uri.path())
}

/// Build the CORS layer for the API router.
///
/// An empty origin list blocks every cross-origin request; `"*"` allows any.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin: AllowOrigin = if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow any origin - not recommended for production");
        AllowOrigin::any()
    } else if origins.is_empty() {
        tracing::info!("CORS allowed origins not configured - cross-origin requests will be blocked");
        AllowOrigin::list(Vec::<HeaderValue>::new())
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        tracing::info!(origins = ?origins, "CORS allowed origins configured");
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(allow_origin)
}

/// The default delegated router.
///
/// `/app-info` expects an `Extension<Arc<HeaderPipeline>>` installed by the
/// outer app.
pub fn router(cors: &CorsConfig) -> Router {
    Router::new()
        .route("/app-info", get(app_info))
        .route("/health", get(health_check))
        .fallback(not_found)
        .layer(cors_layer(&cors.allowed_origins))
}
