//! Nonce consistency audit for a served page.
//!
//! Checks that one response uses a single nonce everywhere: both nonce
//! sources of the CSP header, every `nonce` attribute, the root marker
//! attribute and the literal inside the runtime observer. Also flags any
//! `<script>` left without a nonce.

use axum::http::{header, HeaderMap};
use serde::Serialize;
use thiserror::Error;

use crate::rewrite::html::{Tag, Tags, NONCE_ATTRIBUTE};
use crate::rewrite::observer::{embedded_nonce, OBSERVER_MARKER};
use crate::security::policy::directive_nonce;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("response has no Content-Security-Policy header")]
    MissingPolicy,

    #[error("{0} directive carries no nonce")]
    MissingDirectiveNonce(&'static str),

    #[error("script-src nonce {script:?} differs from style-src nonce {style:?}")]
    PolicyMismatch { script: String, style: String },

    #[error("<{tag}> at byte {offset} carries nonce {found:?}, expected {expected:?}")]
    AttributeMismatch {
        tag: String,
        offset: usize,
        found: String,
        expected: String,
    },

    #[error("<script> at byte {0} has no nonce")]
    UnstampedScript(usize),

    #[error("runtime observer embeds nonce {found:?}, expected {expected:?}")]
    ObserverMismatch { found: String, expected: String },
}

/// Summary of a page that passed the audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub nonce: String,
    pub stamped_scripts: usize,
    pub root_stamped: bool,
    pub observer_present: bool,
}

/// Verify that `headers` and `body` agree on a single nonce.
pub fn verify(headers: &HeaderMap, body: &str, root_attribute: &str) -> Result<AuditReport, AuditError> {
    let policy = headers
        .get(header::CONTENT_SECURITY_POLICY)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuditError::MissingPolicy)?;

    let script = directive_nonce(policy, "script-src")
        .ok_or(AuditError::MissingDirectiveNonce("script-src"))?;
    let style = directive_nonce(policy, "style-src")
        .ok_or(AuditError::MissingDirectiveNonce("style-src"))?;
    if script != style {
        return Err(AuditError::PolicyMismatch {
            script: script.to_string(),
            style: style.to_string(),
        });
    }

    let expected = script;
    let mut report = AuditReport {
        nonce: expected.to_string(),
        stamped_scripts: 0,
        root_stamped: false,
        observer_present: false,
    };

    for tag in Tags::new(body) {
        let Tag::Start(tag) = tag else { continue };

        for attribute in [NONCE_ATTRIBUTE, root_attribute] {
            if let Some(found) = tag.attribute(attribute) {
                if found != expected {
                    return Err(AuditError::AttributeMismatch {
                        tag: tag.name.to_string(),
                        offset: tag.start,
                        found: found.to_string(),
                        expected: expected.to_string(),
                    });
                }
                if attribute == root_attribute {
                    report.root_stamped = true;
                }
            }
        }

        if !tag.is("script") {
            continue;
        }
        if !tag.has_attribute(NONCE_ATTRIBUTE) {
            return Err(AuditError::UnstampedScript(tag.start));
        }
        report.stamped_scripts += 1;

        if tag.has_attribute(OBSERVER_MARKER) {
            report.observer_present = true;
            let script_body = &body[tag.end..];
            if let Some(found) = embedded_nonce(script_body) {
                if found != expected {
                    return Err(AuditError::ObserverMismatch {
                        found: found.to_string(),
                        expected: expected.to_string(),
                    });
                }
            }
        }
    }

    Ok(report)
}
