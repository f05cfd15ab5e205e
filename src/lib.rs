//! SSR Nonce Gateway Library
//!
//! Puts a fresh Content-Security-Policy nonce on every server-rendered page:
//! the header, the application root marker, every `<script>` tag and a
//! runtime observer that stamps scripts created later in the browser.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod render;
pub mod rewrite;
pub mod security;

pub use config::GatewayConfig;
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
pub use render::{RenderEngine, RequestContext};
pub use security::Nonce;
