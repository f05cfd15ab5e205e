//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check names that end up in HTML or HTTP headers are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.origin: {0}")]
    InvalidOrigin(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: {value:?} is not a valid {kind} name")]
    InvalidName {
        field: &'static str,
        value: String,
        kind: &'static str,
    },

    #[error("csp.root_tag: {0:?} is a raw text element")]
    RawTextRoot(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Err(e) = validate_origin(&config.upstream.origin) {
        errors.push(e);
    }

    if !is_header_name(&config.upstream.context_header_prefix) {
        errors.push(ValidationError::InvalidName {
            field: "upstream.context_header_prefix",
            value: config.upstream.context_header_prefix.clone(),
            kind: "header",
        });
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "upstream.connect_timeout_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.csp.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "csp.max_body_bytes" });
    }

    if !is_markup_name(&config.csp.root_tag) {
        errors.push(ValidationError::InvalidName {
            field: "csp.root_tag",
            value: config.csp.root_tag.clone(),
            kind: "element",
        });
    } else if ["script", "style"]
        .iter()
        .any(|raw| config.csp.root_tag.eq_ignore_ascii_case(raw))
    {
        errors.push(ValidationError::RawTextRoot(config.csp.root_tag.clone()));
    }

    if !is_markup_name(&config.csp.root_attribute) {
        errors.push(ValidationError::InvalidName {
            field: "csp.root_attribute",
            value: config.csp.root_attribute.clone(),
            kind: "attribute",
        });
    }

    for mapping in &config.context.headers {
        if !is_header_name(&mapping.header) {
            errors.push(ValidationError::InvalidName {
                field: "context.headers.header",
                value: mapping.header.clone(),
                kind: "header",
            });
        }
        if mapping.key.is_empty() {
            errors.push(ValidationError::InvalidName {
                field: "context.headers.key",
                value: mapping.key.clone(),
                kind: "context key",
            });
        }
    }

    if !config.context.geo_header.is_empty() && !is_header_name(&config.context.geo_header) {
        errors.push(ValidationError::InvalidName {
            field: "context.geo_header",
            value: config.context.geo_header.clone(),
            kind: "header",
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_origin(origin: &str) -> Result<(), ValidationError> {
    let url = Url::parse(origin).map_err(|e| ValidationError::InvalidOrigin(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(ValidationError::InvalidOrigin(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidOrigin("missing host".to_string()));
    }
    Ok(())
}

fn is_header_name(name: &str) -> bool {
    HeaderName::from_bytes(name.as_bytes()).is_ok()
}

/// Letters first, then letters, digits, `-`, `_`, `:` or `.`.
fn is_markup_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ContextHeader;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "localhost".into();
        config.upstream.origin = "ftp://ssr".into();
        config.timeouts.request_secs = 0;
        config.csp.root_tag = "app root".into();
        config.context.headers.push(ContextHeader {
            header: "bad header".into(),
            key: "k".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::Zero { field: "timeouts.request_secs" }));
    }

    #[test]
    fn test_raw_text_root_rejected() {
        let mut config = GatewayConfig::default();
        config.csp.root_tag = "Script".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::RawTextRoot("Script".into())]);
    }

    #[test]
    fn test_origin_rules() {
        assert!(validate_origin("http://127.0.0.1:4200").is_ok());
        assert!(validate_origin("https://ssr.example.com").is_err());
        assert!(validate_origin("not a url").is_err());
    }
}
