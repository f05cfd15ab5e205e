//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → gateway.rs (nonce, context, render, rewrite)
//!     → Send to client
//! ```

pub mod gateway;
pub mod request;
pub mod server;

pub use gateway::{not_found, Gateway, GatewayError};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::HttpServer;
