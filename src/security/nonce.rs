//! Per-request CSP nonce generation.
//!
//! # Responsibilities
//! - Draw 16 bytes from the OS CSPRNG for every request
//! - Encode them with the standard base64 alphabet
//! - Guarantee every `Nonce` value is safe to embed in a header or attribute
//!
//! # Design Decisions
//! - `Nonce` is a newtype, never a bare `String`, so it cannot be confused
//!   with other request data or stored in a shared slot by accident
//! - Parsing only accepts the base64 alphabet; no escaping is ever needed

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Number of random bytes behind every nonce.
pub const NONCE_BYTES: usize = 16;

/// Errors raised when parsing a nonce from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce is empty")]
    Empty,

    #[error("nonce contains {0:?}, which is outside the base64 alphabet")]
    InvalidCharacter(char),
}

/// A single-use token authorizing inline scripts and styles for one response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh nonce from the operating system's entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generate the nonce for one inbound request.
pub fn generate_nonce() -> Nonce {
    Nonce::generate()
}

impl FromStr for Nonce {
    type Err = NonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NonceError::Empty);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')))
        {
            return Err(NonceError::InvalidCharacter(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_nonce_encodes_sixteen_bytes() {
        let nonce = generate_nonce();
        // 16 bytes -> 24 base64 chars with "==" padding
        assert_eq!(nonce.as_str().len(), 24);
        assert!(nonce.as_str().ends_with("=="));

        let decoded = STANDARD.decode(nonce.as_str()).unwrap();
        assert_eq!(decoded.len(), NONCE_BYTES);
    }

    #[test]
    fn test_nonces_are_unique() {
        let samples: HashSet<Nonce> = (0..1000).map(|_| generate_nonce()).collect();
        assert_eq!(samples.len(), 1000);
    }

    #[test]
    fn test_generated_nonce_parses_back() {
        let nonce = generate_nonce();
        let parsed: Nonce = nonce.as_str().parse().unwrap();
        assert_eq!(parsed, nonce);
    }

    #[test]
    fn test_parse_rejects_unsafe_characters() {
        assert_eq!("".parse::<Nonce>(), Err(NonceError::Empty));
        assert_eq!(
            "abc\"onload".parse::<Nonce>(),
            Err(NonceError::InvalidCharacter('"'))
        );
        assert_eq!(
            "abc def".parse::<Nonce>(),
            Err(NonceError::InvalidCharacter(' '))
        );
        assert!("abc123==".parse::<Nonce>().is_ok());
    }
}
