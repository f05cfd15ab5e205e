//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Set Content-Security-Policy and the companion security headers
//! - Strip hop-by-hop headers when talking to the render upstream
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Keep per-request pages out of HTTP caches
//!
//! # Design Decisions
//! - Security headers always override whatever the renderer set
//! - Inbound headers in the context namespace are dropped; only the gateway
//!   writes them
//! - Existing X-Forwarded-For chains are extended, not replaced

use std::net::SocketAddr;

use axum::http::header::{
    self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue,
};

pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Fixed companion headers sent with every rendered page.
const COMPANION_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (PERMISSIONS_POLICY, "camera=(), microphone=(), geolocation=()"),
];

/// Headers that only make sense for a single connection.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Override the CSP header with `policy` and set the companion headers.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    policy: &str,
) -> Result<(), InvalidHeaderValue> {
    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_str(policy)?);
    for (name, value) in COMPANION_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    Ok(())
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Remove every header whose name starts with `prefix` (lowercase).
pub fn strip_prefixed(headers: &mut HeaderMap, prefix: &str) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(prefix))
        .cloned()
        .collect();

    for name in spoofed {
        headers.remove(&name);
    }
}

/// Mark a response carrying a one-time nonce as uncacheable.
///
/// The body is only valid alongside this exact CSP header, so validators
/// that would let a cache revalidate it are dropped.
pub fn mark_uncacheable(headers: &mut HeaderMap) {
    headers.remove(header::ETAG);
    headers.remove(header::LAST_MODIFIED);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
}

/// Record the client hop on a request about to be forwarded.
pub fn append_forwarded(headers: &mut HeaderMap, peer: Option<SocketAddr>) {
    if let Some(peer) = peer {
        let ip = peer.ip().to_string();
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_HOST) {
        if let Some(host) = headers.get(header::HOST).cloned() {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }

    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
}
