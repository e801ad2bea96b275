//! Test app builder that mirrors main.rs wiring with injectable parts.
//!
//! [`TestAppBuilder`] goes through the same `build_app` the binary uses, but
//! points the static file paths at this crate's `public/` and `views/`, and
//! lets tests swap the delegated API router or the header configuration.
//!
//! # Preset Builders
//!
//! - [`TestAppBuilder::new()`] - No header pipeline, default API router
//! - [`TestAppBuilder::with_defaults()`] - Production header configuration

use std::sync::Arc;

use axum::Router;
use helmfront::{
    api,
    app::build_app,
    config::{CorsConfig, SecurityHeadersConfig, StaticFilesConfig},
    HeaderPipeline,
};

/// Absolute path to a file shipped with the service crate.
pub fn crate_path(relative: &str) -> String {
    format!("{}/{relative}", env!("CARGO_MANIFEST_DIR"))
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    /// Header configuration (None means an empty pipeline)
    security_headers: Option<SecurityHeadersConfig>,
    /// CORS allowed origins for the default API router
    cors_origins: Vec<String>,
    /// Replacement for the default API router
    api: Option<Router>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Create a builder with no header pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            security_headers: None,
            cors_origins: Vec::new(),
            api: None,
        }
    }

    /// Create a builder with the production header configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with_security_headers(SecurityHeadersConfig::default())
    }

    /// Use a custom header configuration.
    #[must_use]
    pub fn with_security_headers(mut self, config: SecurityHeadersConfig) -> Self {
        self.security_headers = Some(config);
        self
    }

    /// Configure CORS origins on the default API router.
    #[must_use]
    pub fn with_cors(mut self, origins: &[&str]) -> Self {
        self.cors_origins = origins.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Mount a custom router under `/_api` instead of the default one.
    #[must_use]
    pub fn with_api(mut self, api: Router) -> Self {
        self.api = Some(api);
        self
    }

    /// Build the Axum router through the production `build_app`.
    #[must_use]
    pub fn build(self) -> Router {
        let pipeline = self
            .security_headers
            .map_or_else(HeaderPipeline::empty, |config| {
                HeaderPipeline::from_config(&config).expect("valid header configuration")
            });

        let api = self.api.unwrap_or_else(|| {
            let cors = CorsConfig {
                allowed_origins: self.cors_origins,
            };
            api::router(&cors)
        });

        let static_files = StaticFilesConfig {
            public_dir: crate_path("public"),
            index_file: crate_path("views/index.html"),
        };

        build_app(&static_files, api, Arc::new(pipeline))
    }
}
