//! Runtime observer injected into every rendered page.
//!
//! The CSP nonce only covers scripts present in the document the browser
//! parsed. Client code that creates or inserts `<script>` elements later
//! must stamp them too, so the page carries a small script that:
//! - wraps `document.createElement` and stamps every new `script` element
//! - watches `document.body` (or `document.documentElement` when the body
//!   does not exist yet) for inserted nodes and stamps any script among them
//!   or their descendants that lacks a nonce

use crate::security::nonce::Nonce;

/// Attribute identifying the injected observer, used to avoid injecting twice.
pub const OBSERVER_MARKER: &str = "data-csp-nonce-observer";

const NONCE_PLACEHOLDER: &str = "__CSP_NONCE__";

const OBSERVER_TEMPLATE: &str = r#"<script nonce="__CSP_NONCE__" data-csp-nonce-observer>(function () {
  var nonce = '__CSP_NONCE__';
  var createElement = document.createElement;
  document.createElement = function (tagName, options) {
    var element = createElement.call(document, tagName, options);
    if (String(tagName).toLowerCase() === 'script') {
      element.setAttribute('nonce', nonce);
    }
    return element;
  };
  function stamp(node) {
    if (node.nodeType !== 1) {
      return;
    }
    if (node.tagName === 'SCRIPT' && !node.hasAttribute('nonce')) {
      node.setAttribute('nonce', nonce);
    }
    var scripts = node.querySelectorAll('script:not([nonce])');
    for (var i = 0; i < scripts.length; i++) {
      scripts[i].setAttribute('nonce', nonce);
    }
  }
  new MutationObserver(function (mutations) {
    for (var i = 0; i < mutations.length; i++) {
      var added = mutations[i].addedNodes;
      for (var j = 0; j < added.length; j++) {
        stamp(added[j]);
      }
    }
  }).observe(document.body || document.documentElement, { childList: true, subtree: true });
})();</script>"#;

/// Render the observer script for one response.
pub fn observer_script(nonce: &Nonce) -> String {
    OBSERVER_TEMPLATE.replace(NONCE_PLACEHOLDER, nonce.as_str())
}

/// The nonce literal embedded in an observer script body, if any.
pub fn embedded_nonce(script: &str) -> Option<&str> {
    let rest = &script[script.find("var nonce = '")? + "var nonce = '".len()..];
    rest.find('\'').map(|end| &rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_carries_nonce_everywhere() {
        let nonce: Nonce = "abc123==".parse().unwrap();
        let script = observer_script(&nonce);

        assert!(script.starts_with("<script nonce=\"abc123==\" data-csp-nonce-observer>"));
        assert!(script.ends_with("</script>"));
        assert!(!script.contains(NONCE_PLACEHOLDER));
        assert_eq!(embedded_nonce(&script), Some("abc123=="));
        assert_eq!(script.matches(OBSERVER_MARKER).count(), 1);
    }

    #[test]
    fn test_observer_watches_subtree() {
        let script = observer_script(&Nonce::generate());
        assert!(script.contains("document.body || document.documentElement"));
        assert!(script.contains("subtree: true"));
        assert!(script.contains("document.createElement = function"));
    }

    #[test]
    fn test_embedded_nonce_absent() {
        assert_eq!(embedded_nonce("<script>x()</script>"), None);
    }
}
