//! Rendered response rewriting.
//!
//! # Responsibilities
//! - Decide which rendered responses carry a page to rewrite
//! - Override the CSP header and set the companion security headers
//! - Buffer the rendered body and stamp it with the request nonce
//! - Preserve status, reason phrase and extensions of the rendered response
//!
//! # Design Decisions
//! - Only HTML goes through the body pass; scripts, images and fonts are
//!   passed through untouched
//! - Not streaming-safe: the whole body is read into memory, bounded by
//!   `RewriteOptions::max_body_bytes`
//! - An HTML body that cannot be read as text fails the request instead of
//!   being passed through unmodified
//! - Rewritten pages are `no-store` without validators, so a `304` can never
//!   pair a cached body with a newer nonce

use axum::body::Body;
use axum::http::{header, HeaderMap, Response, StatusCode};

use crate::rewrite::html::rewrite_body;
use crate::rewrite::{RewriteError, RewriteOptions};
use crate::security::headers::{apply_security_headers, mark_uncacheable};
use crate::security::nonce::Nonce;

/// Whether `response` carries an HTML page for the body pass.
///
/// A missing `Content-Type` counts as HTML. A `304 Not Modified` has no body
/// and must keep the headers the client cached with its page.
pub fn is_rewritable(response: &Response<Body>) -> bool {
    response.status() != StatusCode::NOT_MODIFIED && is_html(response.headers())
}

fn is_html(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("text/html") || essence.eq_ignore_ascii_case("application/xhtml+xml")
}

/// Rewrite a rendered HTML response so its headers and body agree on `nonce`.
pub async fn rewrite(
    response: Response<Body>,
    nonce: &Nonce,
    policy: &str,
    options: &RewriteOptions,
) -> Result<Response<Body>, RewriteError> {
    let (mut parts, body) = response.into_parts();

    apply_security_headers(&mut parts.headers, policy)?;
    mark_uncacheable(&mut parts.headers);
    ensure_identity_encoding(&parts.headers)?;

    let bytes = axum::body::to_bytes(body, options.max_body_bytes)
        .await
        .map_err(|e| RewriteError::Body(e.to_string()))?;
    let html = std::str::from_utf8(&bytes).map_err(RewriteError::NotText)?;

    let rewritten = rewrite_body(html, nonce, options);

    tracing::trace!(
        original_bytes = bytes.len(),
        rewritten_bytes = rewritten.len(),
        "Body rewritten"
    );

    // The body length changed; the HTTP layer recomputes it.
    parts.headers.remove(header::CONTENT_LENGTH);

    Ok(Response::from_parts(parts, Body::from(rewritten)))
}

fn ensure_identity_encoding(headers: &HeaderMap) -> Result<(), RewriteError> {
    match headers.get(header::CONTENT_ENCODING) {
        None => Ok(()),
        Some(v) if v.as_bytes().eq_ignore_ascii_case(b"identity") => Ok(()),
        Some(v) => Err(RewriteError::Encoded(
            String::from_utf8_lossy(v.as_bytes()).into_owned(),
        )),
    }
}
