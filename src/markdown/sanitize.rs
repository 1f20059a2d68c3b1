//! Allowlist sanitization for compiled Markdown and embedded raw HTML.
//!
//! Everything not on the allowlists is dropped: unknown tags disappear
//! (their text is kept), script-like containers disappear together with
//! their contents, `on*` attributes never survive, and URLs must be
//! absolute http(s).

use std::sync::OnceLock;

use regex::Regex;

use crate::dom::Attributes;

/// Tags that may appear in compiled output
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "em", "strong", "del", "a", "ul", "ol", "li",
    "blockquote", "code", "pre", "span", "hr", "br", "table", "thead", "tbody", "tr", "th", "td",
    "div",
];

/// Attributes that may appear on allowed tags
pub const ALLOWED_ATTRIBUTES: &[&str] = &["href", "title", "class", "start", "rel"];

/// Tags dropped together with everything inside them
const STRIPPED_CONTAINERS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "svg",
    "math",
];

/// Raw HTML tag names mapped onto their allowed equivalents
fn canonical_tag(tag: &str) -> &str {
    match tag {
        "b" => "strong",
        "i" => "em",
        "s" | "strike" => "del",
        other => other,
    }
}

pub fn is_allowed_tag(tag: &str) -> bool {
    ALLOWED_TAGS.contains(&tag)
}

pub fn is_stripped_container(tag: &str) -> bool {
    STRIPPED_CONTAINERS.contains(&tag)
}

/// Whether `url` is an absolute http(s) URL.
///
/// Control characters and whitespace are removed before the scheme check,
/// so `java\tscript:` and ` JAVASCRIPT:` are both rejected.
pub fn is_safe_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    match compact.split_once(':') {
        Some((scheme, rest)) => (scheme == "http" || scheme == "https") && rest.starts_with("//"),
        None => false,
    }
}

/// Filter attributes for `tag` against the allowlist
pub fn sanitize_attributes<'a>(
    tag: &str,
    attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Attributes {
    let mut clean = Attributes::new();
    for (name, value) in attrs {
        let name = name.to_ascii_lowercase();
        if name.starts_with("on") || !ALLOWED_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        match name.as_str() {
            "href" if tag != "a" || !is_safe_url(value) => continue,
            "start" if tag != "ol" || value.parse::<u64>().is_err() => continue,
            _ => {}
        }
        clean.insert(name, value.to_string());
    }
    clean
}

/// One token of a raw HTML snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlToken {
    Open {
        tag: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        tag: String,
    },
    Text(String),
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(
            r#"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<[!?][^>]*>|<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
        )
        .expect("tag regex is valid")
    })
}

fn attr_regex() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("attribute regex is valid")
    })
}

/// Split a raw HTML snippet into tags and text.
///
/// Comments, doctypes and processing instructions are dropped. Anything
/// that does not parse as a tag is returned as text.
pub fn tokenize_html(html: &str) -> Vec<HtmlToken> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in tag_regex().captures_iter(html) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if whole.start > last {
            tokens.push(HtmlToken::Text(decode_entities(&html[last..whole.start])));
        }
        last = whole.end;

        let Some(name) = caps.get(2) else {
            continue; // comment, CDATA or declaration
        };
        let tag = name.as_str().to_ascii_lowercase();

        if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
            tokens.push(HtmlToken::Close { tag });
            continue;
        }

        let attrs = caps
            .get(3)
            .map(|m| {
                attr_regex()
                    .captures_iter(m.as_str())
                    .map(|a| {
                        let value = a
                            .get(2)
                            .or_else(|| a.get(3))
                            .or_else(|| a.get(4))
                            .map(|v| decode_entities(v.as_str()))
                            .unwrap_or_default();
                        (a[1].to_ascii_lowercase(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

        tokens.push(HtmlToken::Open {
            tag,
            attrs,
            self_closing,
        });
    }

    if last < html.len() {
        tokens.push(HtmlToken::Text(decode_entities(&html[last..])));
    }
    tokens
}

/// Map a raw tag onto the allowed tag it renders as, if any
pub fn allowed_raw_tag(tag: &str) -> Option<&'static str> {
    let canonical = canonical_tag(tag);
    ALLOWED_TAGS.iter().copied().find(|allowed| *allowed == canonical)
}

/// Decode the handful of entities that matter for display text
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
