//! The render engine seam.
//!
//! The gateway treats the SSR engine as a black box: given a request and
//! its context, it either produces a full response or reports that nothing
//! matched.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use thiserror::Error;

use crate::render::context::RequestContext;

/// Errors raised by a render engine.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid upstream origin: {0}")]
    InvalidOrigin(String),

    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("render failed: {0}")]
    Engine(String),
}

/// Anything that can turn a request into a rendered response.
///
/// Engines also find the request's `Nonce` and `RequestContext` in the
/// request extensions.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render `request`, or return `Ok(None)` when no route matches.
    async fn handle(
        &self,
        request: Request<Body>,
        context: &RequestContext,
    ) -> Result<Option<Response<Body>>, RenderError>;
}
