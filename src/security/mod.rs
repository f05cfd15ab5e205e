//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Every rendered request:
//!     → nonce.rs (fresh random nonce)
//!     → policy.rs (CSP header value for that nonce)
//!     → headers.rs (CSP + companion headers on the response)
//!
//! Offline:
//!     → audit.rs (verify a served page uses one nonce throughout)
//! ```
//!
//! # Design Decisions
//! - No process-wide nonce: the value travels with the request only
//! - Fixed policy, no `'unsafe-inline'`

pub mod audit;
pub mod headers;
pub mod nonce;
pub mod policy;

pub use nonce::{generate_nonce, Nonce};
pub use policy::build_policy;
