//! Response rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! rendered response (headers + body)
//!     → response.rs (HTML only; security headers, no-store, buffer body)
//!     → html.rs (stamp root marker and <script> tags)
//!     → observer.rs (runtime observer before </head>)
//!     → rewritten response
//! ```

pub mod html;
pub mod observer;
pub mod response;

use thiserror::Error;

use crate::config::CspConfig;

pub use html::rewrite_body;
pub use response::{is_rewritable, rewrite};

/// Errors raised while rewriting a rendered response.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("policy is not a valid header value")]
    InvalidPolicy(#[from] axum::http::header::InvalidHeaderValue),

    #[error("failed to buffer rendered body: {0}")]
    Body(String),

    #[error("rendered body is not UTF-8 text")]
    NotText(#[source] std::str::Utf8Error),

    #[error("rendered body is content-encoded ({0})")]
    Encoded(String),
}

/// Knobs for the body pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Application root marker element.
    pub root_tag: String,
    /// Attribute carrying the nonce on the root marker.
    pub root_attribute: String,
    /// Insert the runtime observer before `</head>`.
    pub inject_observer: bool,
    /// Upper bound on a buffered body.
    pub max_body_bytes: usize,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from(&CspConfig::default())
    }
}

impl From<&CspConfig> for RewriteOptions {
    fn from(config: &CspConfig) -> Self {
        Self {
            root_tag: config.root_tag.clone(),
            root_attribute: config.root_attribute.clone(),
            inject_observer: config.inject_observer,
            max_body_bytes: config.max_body_bytes,
        }
    }
}
