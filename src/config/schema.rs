//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the render gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// SSR origin the gateway renders through.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Nonce stamping settings.
    pub csp: CspConfig,

    /// Request-scoped context extraction.
    pub context: ContextConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000"). `PORT` overrides the port.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Render upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the SSR server (e.g., "http://127.0.0.1:4200").
    pub origin: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Prefix for headers carrying context entries to the upstream.
    pub context_header_prefix: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:4200".to_string(),
            connect_timeout_secs: 5,
            context_header_prefix: "x-ssr-context-".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for render and rewrite) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Nonce stamping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    /// Application root marker element.
    pub root_tag: String,

    /// Attribute set on the root marker so the client framework picks up the nonce.
    pub root_attribute: String,

    /// Inject the runtime observer script before `</head>`.
    pub inject_observer: bool,

    /// Maximum rendered body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            root_tag: "app-root".to_string(),
            root_attribute: "ngCspNonce".to_string(),
            inject_observer: true,
            max_body_bytes: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// Maps an inbound request header into a context key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContextHeader {
    pub header: String,
    pub key: String,
}

impl ContextHeader {
    fn new(header: &str, key: &str) -> Self {
        Self {
            header: header.to_string(),
            key: key.to_string(),
        }
    }
}

/// Request-scoped context extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Headers copied into the context.
    pub headers: Vec<ContextHeader>,

    /// Header holding base64-encoded JSON geo data. Empty disables it.
    pub geo_header: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            headers: vec![
                ContextHeader::new("x-nf-client-connection-ip", "client-ip"),
                ContextHeader::new("x-nf-request-id", "edge-request-id"),
                ContextHeader::new("x-request-id", "request-id"),
            ],
            geo_header: "x-nf-geo".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
