//! Content-Security-Policy construction.
//!
//! The directive set is fixed. Only `script-src` and `style-src` vary, and
//! only by the nonce of the current request, so the policy is rebuilt for
//! every response and never cached.

use crate::security::nonce::Nonce;

/// Stand-in for `'nonce-<value>'` inside [`DIRECTIVES`].
const NONCE_SOURCE: &str = "{nonce}";

/// Ordered directive list: name followed by its source expressions.
const DIRECTIVES: &[(&str, &[&str])] = &[
    ("default-src", &["'self'"]),
    ("script-src", &["'self'", NONCE_SOURCE]),
    ("style-src", &["'self'", NONCE_SOURCE]),
    ("font-src", &["'self'", "data:"]),
    ("img-src", &["'self'", "data:", "https:"]),
    ("connect-src", &["'self'"]),
    ("frame-src", &["'none'"]),
    ("object-src", &["'none'"]),
    ("base-uri", &["'self'"]),
    ("form-action", &["'self'"]),
    ("frame-ancestors", &["'none'"]),
    ("upgrade-insecure-requests", &[]),
];

/// Render the policy header value for one response.
pub fn build_policy(nonce: &Nonce) -> String {
    let nonce_source = format!("'nonce-{}'", nonce);

    DIRECTIVES
        .iter()
        .map(|(name, sources)| {
            let mut directive = (*name).to_string();
            for source in sources.iter() {
                directive.push(' ');
                if *source == NONCE_SOURCE {
                    directive.push_str(&nonce_source);
                } else {
                    directive.push_str(source);
                }
            }
            directive
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Extract the nonce from one directive of a rendered policy, if present.
pub fn directive_nonce<'a>(policy: &'a str, directive: &str) -> Option<&'a str> {
    policy
        .split(';')
        .map(str::trim)
        .find(|d| d.split_whitespace().next() == Some(directive))?
        .split_whitespace()
        .find_map(|source| {
            source
                .strip_prefix("'nonce-")
                .and_then(|rest| rest.strip_suffix('\''))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce(value: &str) -> Nonce {
        value.parse().unwrap()
    }

    #[test]
    fn test_policy_matches_fixed_directive_list() {
        let policy = build_policy(&nonce("abc123=="));
        assert_eq!(
            policy,
            "default-src 'self'; script-src 'self' 'nonce-abc123=='; \
             style-src 'self' 'nonce-abc123=='; font-src 'self' data:; \
             img-src 'self' data: https:; connect-src 'self'; frame-src 'none'; \
             object-src 'none'; base-uri 'self'; form-action 'self'; \
             frame-ancestors 'none'; upgrade-insecure-requests"
        );
    }

    #[test]
    fn test_policy_never_allows_unsafe_inline() {
        let policy = build_policy(&Nonce::generate());
        assert!(!policy.contains("unsafe-inline"));
        assert!(!policy.contains("block-all-mixed-content"));
    }

    #[test]
    fn test_directive_nonce_extraction() {
        let n = Nonce::generate();
        let policy = build_policy(&n);
        assert_eq!(directive_nonce(&policy, "script-src"), Some(n.as_str()));
        assert_eq!(directive_nonce(&policy, "style-src"), Some(n.as_str()));
        assert_eq!(directive_nonce(&policy, "default-src"), None);
        assert_eq!(directive_nonce(&policy, "worker-src"), None);
    }
}
