//! HTTP utilities and middleware.
//!
//! This module provides the response header pipeline used by the application server.

pub mod security;

pub use security::{security_headers_middleware, HeaderPipeline, PipelineError, Transport};
