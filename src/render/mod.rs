//! Render engine subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → context.rs (ambient edge metadata + csp-nonce)
//!     → engine.rs (RenderEngine seam)
//!     → upstream.rs (SSR origin over HTTP) or an in-process engine
//!     → rendered response | no match
//! ```

pub mod context;
pub mod engine;
pub mod upstream;

pub use context::{bind, RequestContext, CSP_NONCE_KEY};
pub use engine::{RenderEngine, RenderError};
pub use upstream::UpstreamRenderer;
