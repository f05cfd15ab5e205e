//! The nonce-propagating render gateway.
//!
//! Per request:
//! ```text
//! generate nonce → bind into context → render → rewrite headers + body
//! ```
//! Responses that are not HTML pages leave the gateway as rendered.
//! The nonce lives only in this call chain and in the request's
//! extensions, so concurrent requests can never observe each other's value.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::config::{ContextConfig, GatewayConfig};
use crate::observability::metrics::{self, Outcome};
use crate::render::{bind, RenderEngine, RenderError, RequestContext};
use crate::rewrite::{is_rewritable, rewrite, RewriteError, RewriteOptions};
use crate::security::{build_policy, generate_nonce};

/// Errors that fail one request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("render engine failed: {0}")]
    Render(#[from] RenderError),

    #[error("response rewrite failed: {0}")]
    Rewrite(#[from] RewriteError),
}

/// Wraps a render engine with per-request nonce handling.
#[derive(Clone)]
pub struct Gateway {
    engine: Arc<dyn RenderEngine>,
    rewrite: RewriteOptions,
    context: ContextConfig,
}

impl Gateway {
    pub fn new(engine: Arc<dyn RenderEngine>, rewrite: RewriteOptions, context: ContextConfig) -> Self {
        Self {
            engine,
            rewrite,
            context,
        }
    }

    pub fn from_config(engine: Arc<dyn RenderEngine>, config: &GatewayConfig) -> Self {
        Self::new(engine, RewriteOptions::from(&config.csp), config.context.clone())
    }

    /// Render one request.
    ///
    /// A missing match becomes a plain 404 that carries no CSP header.
    /// Render and rewrite failures are returned to the caller.
    pub async fn handle(&self, mut request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let start = Instant::now();

        let nonce = generate_nonce();
        metrics::record_nonce_issued();

        let base = RequestContext::from_headers(request.headers(), &self.context);
        let context = bind(&base, &nonce);
        request.extensions_mut().insert(nonce.clone());
        request.extensions_mut().insert(context.clone());

        let rendered = match self.engine.handle(request, &context).await {
            Ok(Some(rendered)) => rendered,
            Ok(None) => {
                tracing::debug!("Render engine had no match");
                metrics::record_request(404, Outcome::NotFound, start);
                return Ok(not_found());
            }
            Err(e) => {
                metrics::record_request(500, Outcome::Failed, start);
                return Err(e.into());
            }
        };

        if !is_rewritable(&rendered) {
            tracing::debug!(status = %rendered.status(), "Passing through non-HTML response");
            metrics::record_request(rendered.status().as_u16(), Outcome::Bypassed, start);
            return Ok(rendered);
        }

        let policy = build_policy(&nonce);
        match rewrite(rendered, &nonce, &policy, &self.rewrite).await {
            Ok(response) => {
                metrics::record_request(response.status().as_u16(), Outcome::Rendered, start);
                Ok(response)
            }
            Err(e) => {
                metrics::record_request(500, Outcome::Failed, start);
                Err(e.into())
            }
        }
    }
}

/// Response for requests the render engine did not match.
pub fn not_found() -> Response<Body> {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}
