//! Common test utilities for integration tests.
//!
//! - [`app_builder::TestAppBuilder`] - Build test Axum apps that mirror main.rs wiring
//! - [`send`] / [`get`] - Drive a router with a single request
//! - [`SECURITY_HEADERS`] - The header set every response must carry
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::{app_builder::TestAppBuilder, get};
//!
//! #[tokio::test]
//! async fn test_with_app() {
//!     let app = TestAppBuilder::with_defaults().build();
//!     let response = get(app, "/").await;
//! }
//! ```

#![allow(dead_code, clippy::expect_used)]

pub mod app_builder;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, Response},
    Router,
};
use tower::ServiceExt;

/// Expected header values for the default configuration.
pub const SECURITY_HEADERS: [(&str, &str); 11] = [
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("x-content-type-options", "nosniff"),
    ("x-download-options", "noopen"),
    (
        "strict-transport-security",
        "max-age=7776000; includeSubDomains",
    ),
    ("x-dns-prefetch-control", "off"),
    ("surrogate-control", "no-store"),
    (
        "cache-control",
        "no-store, no-cache, must-revalidate, proxy-revalidate",
    ),
    ("pragma", "no-cache"),
    ("expires", "0"),
    (
        "content-security-policy",
        "default-src 'self'; script-src 'self' trusted-cdn.com",
    ),
];

/// Send one request with the given method and path.
pub async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Send one GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

/// Collect a response body as UTF-8.
pub async fn body_string(response: Response<Body>) -> String {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    String::from_utf8(body.to_vec()).expect("utf8")
}

/// Assert every default security header is present with its exact value.
pub fn assert_security_headers(headers: &HeaderMap, context: &str) {
    for (name, expected) in SECURITY_HEADERS {
        let actual = headers.get(name).and_then(|v| v.to_str().ok());
        assert_eq!(actual, Some(expected), "{context}: header {name}");
    }
    assert!(
        headers.get("x-powered-by").is_none(),
        "{context}: x-powered-by must be removed"
    );
}

/// Render headers as sorted `name: value` lines.
pub fn dump_headers(headers: &HeaderMap) -> String {
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            format!(
                "{}: {}",
                name.as_str(),
                value.to_str().expect("ascii header value")
            )
        })
        .collect();
    lines.sort();
    lines.join("\n")
}
