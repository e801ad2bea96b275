//! Security header pipeline for HTTP responses.
//!
//! The pipeline is an ordered, immutable list of header steps built once from
//! [`SecurityHeadersConfig`] at startup. The middleware runs the inner service
//! and then applies every step, in order, to the outgoing response headers.

use std::{fmt, sync::Arc};

use axum::{
    extract::Request,
    http::{
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, EXPIRES, PRAGMA, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        uri::Scheme,
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
    Extension,
};
use serde::Serialize;

use crate::config::SecurityHeadersConfig;

pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");
pub const X_DOWNLOAD_OPTIONS: HeaderName = HeaderName::from_static("x-download-options");
pub const SURROGATE_CONTROL: HeaderName = HeaderName::from_static("surrogate-control");

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Errors raised while building the pipeline from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid value for {header}: {value:?}")]
    InvalidHeaderValue { header: &'static str, value: String },

    #[error("invalid Content-Security-Policy: {0}")]
    Csp(String),
}

/// A single mutation of the response header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderAction {
    Set(HeaderName, HeaderValue),
    Remove(HeaderName),
}

impl HeaderAction {
    /// Header this action targets.
    #[must_use]
    pub const fn header(&self) -> &HeaderName {
        match self {
            Self::Set(name, _) | Self::Remove(name) => name,
        }
    }

    /// Value written by this action, `None` for removals.
    #[must_use]
    pub const fn value(&self) -> Option<&HeaderValue> {
        match self {
            Self::Set(_, value) => Some(value),
            Self::Remove(_) => None,
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        match self {
            Self::Set(name, value) => {
                headers.insert(name.clone(), value.clone());
            }
            Self::Remove(name) => {
                headers.remove(name);
            }
        }
    }
}

/// How the request reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Secure,
}

impl Transport {
    /// Detect whether a request arrived over a secure connection.
    ///
    /// An absolute `https` request URI counts as secure. `X-Forwarded-Proto` is
    /// only consulted when `trust_proxy` is set; the first listed protocol wins.
    #[must_use]
    pub fn detect<B>(request: &axum::http::Request<B>, trust_proxy: bool) -> Self {
        if request.uri().scheme() == Some(&Scheme::HTTPS) {
            return Self::Secure;
        }

        if trust_proxy {
            let forwarded = request
                .headers()
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim);
            if forwarded.is_some_and(|proto| proto.eq_ignore_ascii_case("https")) {
                return Self::Secure;
            }
        }

        Self::Plain
    }
}

/// When a step applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    SecureOnly,
}

/// One named step of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderStep {
    name: &'static str,
    condition: Condition,
    actions: Vec<HeaderAction>,
}

impl HeaderStep {
    const fn always(name: &'static str, actions: Vec<HeaderAction>) -> Self {
        Self {
            name,
            condition: Condition::Always,
            actions,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub fn actions(&self) -> &[HeaderAction] {
        &self.actions
    }

    fn applies_to(&self, transport: Transport) -> bool {
        match self.condition {
            Condition::Always => true,
            Condition::SecureOnly => transport == Transport::Secure,
        }
    }
}

/// Ordered header steps applied to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderPipeline {
    steps: Vec<HeaderStep>,
    trust_proxy: bool,
}

impl HeaderPipeline {
    /// A pipeline with no steps; responses pass through untouched.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the pipeline from configuration.
    ///
    /// Step order is fixed: powered-by removal, frame options, XSS filter,
    /// nosniff, noopen, HSTS, DNS prefetch control, no-cache, CSP. Steps turned
    /// off in the configuration are left out.
    ///
    /// # Errors
    /// Returns an error if a configured value is not a valid header value or
    /// the CSP string does not parse.
    pub fn from_config(config: &SecurityHeadersConfig) -> Result<Self, PipelineError> {
        if !config.enabled {
            return Ok(Self::empty());
        }

        let mut steps = Vec::with_capacity(9);

        if config.hide_powered_by {
            steps.push(HeaderStep::always(
                "hide_powered_by",
                vec![HeaderAction::Remove(X_POWERED_BY)],
            ));
        }

        let frame_options = config.frame_options.to_ascii_uppercase();
        steps.push(HeaderStep::always(
            "frameguard",
            vec![HeaderAction::Set(
                X_FRAME_OPTIONS,
                header_value("X-Frame-Options", &frame_options)?,
            )],
        ));

        if config.xss_filter {
            steps.push(HeaderStep::always(
                "xss_filter",
                vec![HeaderAction::Set(
                    X_XSS_PROTECTION,
                    HeaderValue::from_static("1; mode=block"),
                )],
            ));
        }

        if config.no_sniff {
            steps.push(HeaderStep::always(
                "no_sniff",
                vec![HeaderAction::Set(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )],
            ));
        }

        if config.ie_no_open {
            steps.push(HeaderStep::always(
                "ie_no_open",
                vec![HeaderAction::Set(
                    X_DOWNLOAD_OPTIONS,
                    HeaderValue::from_static("noopen"),
                )],
            ));
        }

        if config.hsts_enabled {
            let mut hsts = format!("max-age={}", config.hsts_max_age);
            if config.hsts_include_subdomains {
                hsts.push_str("; includeSubDomains");
            }
            if config.hsts_preload {
                hsts.push_str("; preload");
            }
            steps.push(HeaderStep {
                name: "hsts",
                condition: if config.hsts_force {
                    Condition::Always
                } else {
                    Condition::SecureOnly
                },
                actions: vec![HeaderAction::Set(
                    STRICT_TRANSPORT_SECURITY,
                    header_value("Strict-Transport-Security", &hsts)?,
                )],
            });
        }

        steps.push(HeaderStep::always(
            "dns_prefetch_control",
            vec![HeaderAction::Set(
                X_DNS_PREFETCH_CONTROL,
                HeaderValue::from_static(if config.dns_prefetch_allow { "on" } else { "off" }),
            )],
        ));

        if config.no_cache {
            steps.push(HeaderStep::always(
                "no_cache",
                vec![
                    HeaderAction::Set(SURROGATE_CONTROL, HeaderValue::from_static("no-store")),
                    HeaderAction::Set(
                        CACHE_CONTROL,
                        HeaderValue::from_static(
                            "no-store, no-cache, must-revalidate, proxy-revalidate",
                        ),
                    ),
                    HeaderAction::Set(PRAGMA, HeaderValue::from_static("no-cache")),
                    HeaderAction::Set(EXPIRES, HeaderValue::from_static("0")),
                ],
            ));
        }

        if !config.content_security_policy.trim().is_empty() {
            let csp = ContentSecurityPolicy::parse(&config.content_security_policy)?;
            steps.push(HeaderStep::always(
                "content_security_policy",
                vec![HeaderAction::Set(
                    CONTENT_SECURITY_POLICY,
                    header_value("Content-Security-Policy", &csp.to_string())?,
                )],
            ));
        }

        Ok(Self {
            steps,
            trust_proxy: config.trust_proxy,
        })
    }

    /// Steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[HeaderStep] {
        &self.steps
    }

    #[must_use]
    pub const fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step, in order, to a response header set.
    pub fn apply(&self, headers: &mut HeaderMap, transport: Transport) {
        for step in self.steps.iter().filter(|s| s.applies_to(transport)) {
            for action in &step.actions {
                action.apply(headers);
            }
        }
    }
}

fn header_value(header: &'static str, value: &str) -> Result<HeaderValue, PipelineError> {
    HeaderValue::from_str(value).map_err(|_| PipelineError::InvalidHeaderValue {
        header,
        value: value.to_string(),
    })
}

/// One CSP directive: a name and its source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CspDirective {
    pub name: String,
    pub sources: Vec<String>,
}

/// A parsed Content-Security-Policy with directives kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<CspDirective>,
}

impl ContentSecurityPolicy {
    /// Parse `name src src; name src` into directives.
    ///
    /// Empty segments (such as a trailing `;`) are skipped. Directive names are
    /// lowercased.
    ///
    /// # Errors
    /// Returns an error if the policy has no directives, a directive name holds
    /// characters other than ASCII alphanumerics and `-`, or a directive is
    /// declared twice.
    pub fn parse(policy: &str) -> Result<Self, PipelineError> {
        let mut directives: Vec<CspDirective> = Vec::new();

        for segment in policy.split(';') {
            let mut tokens = segment.split_ascii_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let name = name.to_ascii_lowercase();

            if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
                return Err(PipelineError::Csp(format!(
                    "invalid directive name '{name}'"
                )));
            }
            if directives.iter().any(|d| d.name == name) {
                return Err(PipelineError::Csp(format!("duplicate directive '{name}'")));
            }

            directives.push(CspDirective {
                name,
                sources: tokens.map(str::to_string).collect(),
            });
        }

        if directives.is_empty() {
            return Err(PipelineError::Csp("policy has no directives".into()));
        }

        Ok(Self { directives })
    }

    #[must_use]
    pub fn directives(&self) -> &[CspDirective] {
        &self.directives
    }
}

impl fmt::Display for ContentSecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, directive) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&directive.name)?;
            for source in &directive.sources {
                write!(f, " {source}")?;
            }
        }
        Ok(())
    }
}

/// Middleware applying the header pipeline to all responses.
///
/// Reads the shared [`HeaderPipeline`] from an `Extension`, runs the inner
/// service, then applies the pipeline to the response. Install it outside the
/// routes so it also covers nested routers and the static fallback.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use axum::{middleware, Router, Extension};
/// use helmfront::config::SecurityHeadersConfig;
/// use helmfront::http::security::{security_headers_middleware, HeaderPipeline};
///
/// let pipeline = HeaderPipeline::from_config(&SecurityHeadersConfig::default())?;
///
/// let app = Router::new()
///     // ... routes ...
///     .layer(middleware::from_fn(security_headers_middleware))
///     .layer(Extension(Arc::new(pipeline)));
/// ```
pub async fn security_headers_middleware(
    Extension(pipeline): Extension<Arc<HeaderPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let transport = Transport::detect(&request, pipeline.trust_proxy());
    let mut response = next.run(request).await;
    pipeline.apply(response.headers_mut(), transport);
    response
}
