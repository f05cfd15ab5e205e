//! Request-scoped render context.
//!
//! # Responsibilities
//! - Collect ambient edge metadata (client IP, request IDs, geo) from headers
//! - Bind the request nonce under `csp-nonce`
//!
//! # Design Decisions
//! - One context per request, built fresh and never shared
//! - Binding returns a new context; the base context is left untouched
//! - Ordered map so forwarded headers and logs are deterministic

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::config::ContextConfig;
use crate::security::nonce::Nonce;

/// Context key holding the request nonce.
pub const CSP_NONCE_KEY: &str = "csp-nonce";

/// Prefix for keys flattened out of the geo header.
const GEO_PREFIX: &str = "geo";

/// Read-only string mapping handed to the render engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    entries: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the base context for a request from its headers.
    pub fn from_headers(headers: &HeaderMap, config: &ContextConfig) -> Self {
        let mut entries = BTreeMap::new();

        for mapping in &config.headers {
            if let Some(value) = headers.get(mapping.header.as_str()).and_then(|v| v.to_str().ok()) {
                entries.insert(mapping.key.clone(), value.to_string());
            }
        }

        if !config.geo_header.is_empty() {
            if let Some(raw) = headers.get(config.geo_header.as_str()).and_then(|v| v.to_str().ok()) {
                match decode_geo(raw) {
                    Some(geo) => entries.extend(geo),
                    None => tracing::debug!(header = %config.geo_header, "Ignoring malformed geo header"),
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The nonce bound into this context, if any.
    pub fn nonce(&self) -> Option<&str> {
        self.get(CSP_NONCE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Return `base` extended with the request nonce.
pub fn bind(base: &RequestContext, nonce: &Nonce) -> RequestContext {
    let mut enhanced = base.clone();
    enhanced
        .entries
        .insert(CSP_NONCE_KEY.to_string(), nonce.as_str().to_string());
    enhanced
}

/// Decode base64 JSON geo data into flattened `geo.*` entries.
fn decode_geo(raw: &str) -> Option<Vec<(String, String)>> {
    let bytes = STANDARD.decode(raw.trim()).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }
    let mut out = Vec::new();
    flatten(GEO_PREFIX, &value, &mut out);
    Some(out)
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&format!("{}.{}", prefix, k), v, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Null | Value::Array(_) => {}
    }
}
