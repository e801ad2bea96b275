use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::deserialize_vec_from_string_or_vec;

use crate::http::security::ContentSecurityPolicy;

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. `PORT` environment variable (maps to `server.port`)
/// 4. Environment variables with HF_ prefix (always wins)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
    #[serde(default)]
    pub hosting: HostingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticFilesConfig {
    /// Directory served for every path no route claims.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// HTML document returned for `GET /`.
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

impl StaticFilesConfig {
    /// Rebase relative paths onto `base`; absolute paths are left alone.
    pub fn resolve_against(&mut self, base: &Path) {
        for path in [&mut self.public_dir, &mut self.index_file] {
            if Path::new(path.as_str()).is_relative() {
                *path = base.join(path.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            index_file: default_index_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins for cross-origin requests to `/_api`.
    /// Use `"*"` to allow any origin.
    /// Accepts either an array or comma-separated string.
    #[serde(
        default = "default_allowed_origins",
        deserialize_with = "deserialize_origins"
    )]
    pub allowed_origins: Vec<String>,
}

/// Deserialize origins from comma-separated string or array, filtering empty values.
fn deserialize_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let origins: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(origins.into_iter().filter(|s| !s.is_empty()).collect())
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Knobs for every step of the header pipeline.
///
/// Defaults reproduce the deployed header set: frame denial, XSS filter in
/// block mode, nosniff, noopen, forced 90-day HSTS, DNS prefetch off, no-cache
/// and a two-directive CSP.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityHeadersConfig {
    /// Enable the header pipeline (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Strip `X-Powered-By` from responses (default: true).
    #[serde(default = "default_true")]
    pub hide_powered_by: bool,

    /// X-Frame-Options value: "DENY" or "SAMEORIGIN" (default: "DENY").
    #[serde(default = "default_frame_options")]
    pub frame_options: String,

    /// Send `X-XSS-Protection: 1; mode=block` (default: true).
    #[serde(default = "default_true")]
    pub xss_filter: bool,

    /// Send `X-Content-Type-Options: nosniff` (default: true).
    #[serde(default = "default_true")]
    pub no_sniff: bool,

    /// Send `X-Download-Options: noopen` (default: true).
    #[serde(default = "default_true")]
    pub ie_no_open: bool,

    /// Enable the HSTS header (default: true).
    #[serde(default = "default_true")]
    pub hsts_enabled: bool,

    /// HSTS max-age in seconds (default: 7776000 = 90 days).
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,

    /// Include subdomains in HSTS (default: true).
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,

    /// Append `preload` to HSTS (default: false).
    #[serde(default)]
    pub hsts_preload: bool,

    /// Send HSTS even when the request is not detected as secure (default: true).
    #[serde(default = "default_true")]
    pub hsts_force: bool,

    /// Honour `X-Forwarded-Proto` when detecting secure requests (default: false).
    #[serde(default)]
    pub trust_proxy: bool,

    /// Allow DNS prefetching; `false` sends `X-DNS-Prefetch-Control: off`.
    #[serde(default)]
    pub dns_prefetch_allow: bool,

    /// Send the no-cache header family (default: true).
    #[serde(default = "default_true")]
    pub no_cache: bool,

    /// Content-Security-Policy header value; empty disables the header.
    #[serde(default = "default_csp")]
    pub content_security_policy: String,
}

/// Settings declared at the application-host level.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostingConfig {
    /// Host-level HSTS switch (default: true, i.e. declared disabled).
    ///
    /// This flag never reaches the header pipeline. When it is set while the
    /// pipeline forces HSTS, startup logs the conflict.
    #[serde(default = "default_true")]
    pub hsts_disabled: bool,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            hsts_disabled: default_true(),
        }
    }
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_index_file() -> String {
    "views/index.html".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_allowed_origins() -> Vec<String> {
    vec![]
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_hsts_max_age() -> u64 {
    90 * 24 * 60 * 60
}

fn default_frame_options() -> String {
    "DENY".to_string()
}

fn default_csp() -> String {
    "default-src 'self'; script-src 'self' trusted-cdn.com".to_string()
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            hide_powered_by: default_true(),
            frame_options: default_frame_options(),
            xss_filter: default_true(),
            no_sniff: default_true(),
            ie_no_open: default_true(),
            hsts_enabled: default_true(),
            hsts_max_age: default_hsts_max_age(),
            hsts_include_subdomains: default_true(),
            hsts_preload: false,
            hsts_force: default_true(),
            trust_proxy: false,
            dns_prefetch_allow: false,
            no_cache: default_true(),
            content_security_policy: default_csp(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from all sources, reading `config.yaml`.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    /// When the file exists, relative static file paths are resolved against
    /// its directory, so the binary can start from any working directory.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let mut config: Self = Self::figment(yaml_path).extract()?;

        let yaml_path = Path::new(yaml_path);
        if let Some(base) = yaml_path.parent().filter(|_| yaml_path.is_file()) {
            config.static_files.resolve_against(base);
        }

        config.validate()?;
        Ok(config)
    }

    /// The layered figment behind [`Config::load_from`].
    #[must_use]
    pub fn figment(yaml_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::prefixed("HF_").split("__"))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }

        if self.static_files.public_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "static_files.public_dir cannot be empty".into(),
            ));
        }

        if self.static_files.index_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "static_files.index_file cannot be empty".into(),
            ));
        }

        for origin in &self.cors.allowed_origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "cors.allowed_origins contains invalid origin '{origin}'. Must be '*' or start with http:// or https://"
                )));
            }
        }

        let headers = &self.security_headers;

        let frame_opts = headers.frame_options.to_uppercase();
        if frame_opts != "DENY" && frame_opts != "SAMEORIGIN" {
            return Err(ConfigError::Validation(format!(
                "security_headers.frame_options must be 'DENY' or 'SAMEORIGIN', got: '{}'",
                headers.frame_options
            )));
        }

        if headers.hsts_enabled && headers.hsts_max_age == 0 {
            return Err(ConfigError::Validation(
                "security_headers.hsts_max_age cannot be 0 while HSTS is enabled".into(),
            ));
        }

        if !headers.content_security_policy.trim().is_empty() {
            ContentSecurityPolicy::parse(&headers.content_security_policy).map_err(|e| {
                ConfigError::Validation(format!("security_headers.content_security_policy: {e}"))
            })?;
        }

        Ok(())
    }

    /// Whether forced HSTS and the host-level HSTS disable are both declared.
    #[must_use]
    pub const fn hsts_conflict(&self) -> bool {
        self.hosting.hsts_disabled
            && self.security_headers.enabled
            && self.security_headers.hsts_enabled
            && self.security_headers.hsts_force
    }
}
