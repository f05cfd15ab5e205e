//! Minimal HTML tag scanner and the nonce-stamping body pass.
//!
//! The body comes from a trusted renderer, so this is not a full HTML
//! parser. It understands just enough to stay correct on renderer output:
//! quoted attribute values may contain `>`, comments are skipped, and the
//! contents of `<script>`/`<style>` are raw text that is never scanned for
//! tags.

use std::fmt::Write as _;

use crate::rewrite::observer::{observer_script, OBSERVER_MARKER};
use crate::rewrite::RewriteOptions;
use crate::security::nonce::Nonce;

/// Attribute stamped on `<script>` tags.
pub const NONCE_ATTRIBUTE: &str = "nonce";

/// Elements whose contents are raw text.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// An opening tag such as `<app-root id="x">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    /// Offset of the `<`.
    pub start: usize,
    /// Offset just past the tag name; new attributes are inserted here.
    pub name_end: usize,
    /// Offset just past the closing `>`.
    pub end: usize,
    /// Raw text between the name and the closing `>`.
    pub attributes: &'a str,
}

impl<'a> StartTag<'a> {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        Attributes::new(self.attributes).any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        Attributes::new(self.attributes)
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v)
    }
}

/// A closing tag such as `</head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag<'a> {
    pub name: &'a str,
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    Start(StartTag<'a>),
    End(EndTag<'a>),
}

/// Iterator over the tags of a document, in order.
pub struct Tags<'a> {
    html: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    pub fn new(html: &'a str) -> Self {
        Self { html, pos: 0 }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        let html = self.html;
        let bytes = html.as_bytes();

        loop {
            let start = self.pos + html.get(self.pos..)?.find('<')?;
            let rest = &html[start..];

            if rest.starts_with("<!--") {
                self.pos = rest[4..]
                    .find("-->")
                    .map(|i| start + 4 + i + 3)
                    .unwrap_or(html.len());
                continue;
            }

            let closing = rest.starts_with("</");
            let name_start = start + if closing { 2 } else { 1 };
            let name_end = scan_name(bytes, name_start);
            if name_end == name_start {
                self.pos = start + 1;
                continue;
            }
            let name = &html[name_start..name_end];

            let Some(gt) = find_tag_end(bytes, name_end) else {
                self.pos = html.len();
                return None;
            };
            let end = gt + 1;
            self.pos = end;

            if closing {
                return Some(Tag::End(EndTag { name, start }));
            }

            if RAW_TEXT_ELEMENTS.iter().any(|raw| name.eq_ignore_ascii_case(raw)) {
                self.pos = find_closing_tag(html, end, name).unwrap_or(html.len());
            }

            return Some(Tag::Start(StartTag {
                name,
                start,
                name_end,
                end,
                attributes: &html[name_end..gt],
            }));
        }
    }
}

/// Tag names start with a letter and continue with letters, digits, `-` or `:`.
fn scan_name(bytes: &[u8], from: usize) -> usize {
    match bytes.get(from) {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return from,
    }
    let mut i = from + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b':')) {
        i += 1;
    }
    i
}

/// Offset of the `>` closing a tag, ignoring any inside quoted values.
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

/// Offset of the `</name` that ends a raw text element.
fn find_closing_tag(html: &str, from: usize, name: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut pos = from;
    while let Some(i) = html.get(pos..)?.find("</") {
        let at = pos + i;
        let name_start = at + 2;
        let candidate = html.get(name_start..name_start + name.len());
        let boundary = bytes
            .get(name_start + name.len())
            .map_or(true, |b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'));
        if candidate.is_some_and(|c| c.eq_ignore_ascii_case(name)) && boundary {
            return Some(at);
        }
        pos = at + 2;
    }
    None
}

/// Iterator over `name[=value]` pairs in the raw attribute text of a tag.
pub struct Attributes<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> Attributes<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.raw;
        let bytes = raw.as_bytes();
        let skip_ws = |mut i: usize| {
            while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
                i += 1;
            }
            i
        };

        let start = skip_ws(self.pos);
        if start >= bytes.len() {
            self.pos = bytes.len();
            return None;
        }

        let mut i = start;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        let name = &raw[start..i];

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            self.pos = i;
            return Some((name, None));
        }

        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let value = match bytes.get(j) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let close = raw[j + 1..].find(q as char).map_or(bytes.len(), |k| j + 1 + k);
                self.pos = (close + 1).min(bytes.len());
                &raw[j + 1..close]
            }
            _ => {
                let mut k = j;
                while k < bytes.len() && !bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                self.pos = k;
                &raw[j..k]
            }
        };
        Some((name, Some(value)))
    }
}

/// Stamp `nonce` onto the root marker, every `<script>` lacking one, and
/// insert the runtime observer before `</head>`.
///
/// Running this twice with the same nonce yields the same document.
pub fn rewrite_body(html: &str, nonce: &Nonce, options: &RewriteOptions) -> String {
    let mut out = String::with_capacity(html.len() + 1024);
    let mut last = 0;
    let mut root_seen = false;
    let mut observer_done = !options.inject_observer || has_observer(html);

    for tag in Tags::new(html) {
        match tag {
            Tag::Start(tag) => {
                let attribute = if tag.is("script") {
                    Some(NONCE_ATTRIBUTE)
                } else if !root_seen && tag.is(&options.root_tag) {
                    root_seen = true;
                    Some(options.root_attribute.as_str())
                } else {
                    None
                };

                if let Some(attribute) = attribute {
                    if !tag.has_attribute(attribute) {
                        out.push_str(&html[last..tag.name_end]);
                        let _ = write!(out, " {}=\"{}\"", attribute, nonce);
                        last = tag.name_end;
                    }
                }
            }
            Tag::End(tag) if !observer_done && tag.name.eq_ignore_ascii_case("head") => {
                out.push_str(&html[last..tag.start]);
                out.push_str(&observer_script(nonce));
                last = tag.start;
                observer_done = true;
            }
            Tag::End(_) => {}
        }
    }

    out.push_str(&html[last..]);
    out
}

/// Whether `html` already carries an observer `<script>` start tag.
fn has_observer(html: &str) -> bool {
    Tags::new(html).any(|tag| match tag {
        Tag::Start(tag) => tag.is("script") && tag.has_attribute(OBSERVER_MARKER),
        Tag::End(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce() -> Nonce {
        "abc123==".parse().unwrap()
    }

    fn options() -> RewriteOptions {
        RewriteOptions::default()
    }

    fn start_tags(html: &str) -> Vec<StartTag<'_>> {
        Tags::new(html)
            .filter_map(|t| match t {
                Tag::Start(s) => Some(s),
                Tag::End(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_sample_document() {
        let html = "<head></head><body><app-root></app-root><script>console.log(1)</script></body>";
        let out = rewrite_body(html, &nonce(), &options());

        assert!(out.contains("<app-root ngCspNonce=\"abc123==\">"));
        assert!(out.contains("<script nonce=\"abc123==\">console.log(1)</script>"));
        assert_eq!(out.matches(OBSERVER_MARKER).count(), 1);

        let observer = observer_script(&nonce());
        assert!(out.starts_with(&format!("<head>{}</head>", observer)));
    }

    #[test]
    fn test_root_attributes_preserved() {
        let out = rewrite_body("<app-root id=\"x\"></app-root>", &nonce(), &options());
        assert_eq!(out, "<app-root ngCspNonce=\"abc123==\" id=\"x\"></app-root>");

        let out = rewrite_body("<app-root/>", &nonce(), &options());
        assert_eq!(out, "<app-root ngCspNonce=\"abc123==\"/>");
    }

    #[test]
    fn test_only_first_root_marker_is_stamped() {
        let out = rewrite_body("<app-root></app-root><app-root></app-root>", &nonce(), &options());
        assert_eq!(out, "<app-root ngCspNonce=\"abc123==\"></app-root><app-root></app-root>");
    }

    #[test]
    fn test_root_tag_prefix_does_not_match() {
        let out = rewrite_body("<app-root-shell></app-root-shell>", &nonce(), &options());
        assert_eq!(out, "<app-root-shell></app-root-shell>");
    }

    #[test]
    fn test_existing_nonce_is_authoritative() {
        let html = "<script nonce=\"fromRenderer\">a()</script><script src=\"/main.js\"></script>";
        let out = rewrite_body(html, &nonce(), &options());
        assert_eq!(
            out,
            "<script nonce=\"fromRenderer\">a()</script>\
             <script nonce=\"abc123==\" src=\"/main.js\"></script>"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let html = "<html><head><title>t</title></head><body>\
                    <app-root class=\"a\"></app-root>\
                    <script type=\"module\" src=\"main.js\"></script></body></html>";
        let once = rewrite_body(html, &nonce(), &options());
        let twice = rewrite_body(&once, &nonce(), &options());
        assert_eq!(once, twice);
        assert_eq!(twice.matches(OBSERVER_MARKER).count(), 1);
    }

    #[test]
    fn test_marker_in_page_text_does_not_suppress_observer() {
        let html = "<head><title>data-csp-nonce-observer</title></head>\
                    <body><p>About data-csp-nonce-observer</p></body>";
        let out = rewrite_body(html, &nonce(), &options());
        let observer = observer_script(&nonce());
        assert!(out.contains(&format!("{}</head>", observer)));
        assert!(has_observer(&out));
        assert!(!has_observer(html));
    }

    #[test]
    fn test_script_contents_are_not_scanned() {
        let html = "<script>document.write('<script>x()</' + 'script>'); var a = '</head>';</script></head>";
        let out = rewrite_body(html, &nonce(), &options());
        assert_eq!(out.matches("nonce=\"abc123==\"").count(), 2);
        assert!(out.contains("<script nonce=\"abc123==\">document.write('<script>x()"));
        assert!(out.ends_with("</script></head>"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let html = "<!-- <script>old()</script> <app-root> --><app-root></app-root>";
        let out = rewrite_body(html, &nonce(), &options());
        assert_eq!(
            out,
            "<!-- <script>old()</script> <app-root> --><app-root ngCspNonce=\"abc123==\"></app-root>"
        );
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let html = "<app-root data-x=\"a>b\"></app-root>";
        let out = rewrite_body(html, &nonce(), &options());
        assert_eq!(out, "<app-root ngCspNonce=\"abc123==\" data-x=\"a>b\"></app-root>");
    }

    #[test]
    fn test_uppercase_tags() {
        let html = "<HEAD></HEAD><SCRIPT>x()</SCRIPT>";
        let out = rewrite_body(html, &nonce(), &options());
        assert!(out.contains("<SCRIPT nonce=\"abc123==\">x()</SCRIPT>"));
        assert!(out.contains(&format!("{}</HEAD>", observer_script(&nonce()))));
    }

    #[test]
    fn test_observer_disabled_or_headless() {
        let mut opts = options();
        opts.inject_observer = false;
        let out = rewrite_body("<head></head>", &nonce(), &opts);
        assert_eq!(out, "<head></head>");

        let out = rewrite_body("<body><p>hi</p></body>", &nonce(), &options());
        assert_eq!(out, "<body><p>hi</p></body>");
    }

    #[test]
    fn test_custom_root_marker() {
        let mut opts = options();
        opts.root_tag = "my-app".into();
        opts.root_attribute = "data-nonce".into();
        let out = rewrite_body("<app-root></app-root><my-app></my-app>", &nonce(), &opts);
        assert_eq!(out, "<app-root></app-root><my-app data-nonce=\"abc123==\"></my-app>");
    }

    #[test]
    fn test_tag_scanner() {
        let html = "<div a='1' b=\"x > y\" disabled><br/></div>";
        let tags = start_tags(html);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "div");
        assert_eq!(tags[0].attribute("a"), Some("1"));
        assert_eq!(tags[0].attribute("b"), Some("x > y"));
        assert!(tags[0].has_attribute("disabled"));
        assert_eq!(tags[0].attribute("disabled"), None);
        assert_eq!(tags[1].name, "br");
        assert_eq!(&html[tags[1].start..tags[1].end], "<br/>");
    }

    #[test]
    fn test_attribute_parser() {
        let attrs: Vec<_> = Attributes::new(" id=x  nonce = \"n1\" async /").collect();
        assert_eq!(
            attrs,
            vec![("id", Some("x")), ("nonce", Some("n1")), ("async", None)]
        );
    }

    #[test]
    fn test_unterminated_tag_is_left_alone() {
        let out = rewrite_body("<p>text<script src=\"a.js\"", &nonce(), &options());
        assert_eq!(out, "<p>text<script src=\"a.js\"");
    }

    #[test]
    fn test_stray_lt_is_ignored() {
        let out = rewrite_body("<p>1 < 2</p><script>a()</script>", &nonce(), &options());
        assert_eq!(out, "<p>1 < 2</p><script nonce=\"abc123==\">a()</script>");
    }
}
