//! Syntax highlighting for fenced code blocks using syntect
//!
//! Tokens are emitted as `<span class="hl-…">` nodes named after the
//! innermost meaningful TextMate scope (`hl-keyword`, `hl-string`, …), so the
//! output carries no inline styles and stays within the sanitizer allowlist.
//!
//! NOTE: syntect's default syntax set doesn't include TypeScript, so
//! TypeScript fences are highlighted with the JavaScript grammar.

use std::sync::OnceLock;

use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::debug;

use crate::dom::node::{push_merged, Element, Node};

/// Scope roots that carry no visual meaning on their own
const NEUTRAL_SCOPES: &[&str] = &["source", "text", "meta"];

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Result of highlighting one code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedCode {
    /// Language slug used for the `language-…` class, if one was resolved
    pub language: Option<String>,
    /// Highlighted token spans and plain text
    pub nodes: Vec<Node>,
}

/// Map language name/alias to a syntect syntax name
fn map_language_to_syntax(language: &str) -> &str {
    match language {
        "typescript" | "ts" | "tsx" | "jsx" => "JavaScript",
        "javascript" | "js" | "node" => "JavaScript",
        "markdown" | "md" => "Markdown",
        "json" => "JSON",
        "rust" | "rs" => "Rust",
        "python" | "py" => "Python",
        "html" => "HTML",
        "css" => "CSS",
        "shell" | "sh" | "bash" | "zsh" | "console" => "Bourne Again Shell (bash)",
        "yaml" | "yml" => "YAML",
        "c++" | "cpp" => "C++",
        "csharp" | "cs" => "C#",
        other => other,
    }
}

/// Resolve the syntax for a fenced block.
///
/// Tries the fence language (by name, token and extension), then
/// auto-detects from the first line (shebangs, `<?xml`, …).
fn resolve_syntax<'a>(
    ss: &'a SyntaxSet,
    language: Option<&str>,
    code: &str,
) -> Option<(&'a SyntaxReference, String)> {
    if let Some(language) = language.map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty()) {
        let mapped = map_language_to_syntax(&language);
        let found = ss
            .find_syntax_by_name(mapped)
            .or_else(|| ss.find_syntax_by_token(&language))
            .or_else(|| ss.find_syntax_by_extension(&language));
        if let Some(syntax) = found {
            return Some((syntax, language));
        }
        debug!(language = %language, "Unknown fence language, trying auto-detection");
    }

    let first_line = code.lines().next().unwrap_or_default();
    ss.find_syntax_by_first_line(first_line).map(|syntax| {
        let slug = syntax
            .file_extensions
            .first()
            .cloned()
            .unwrap_or_else(|| syntax.name.to_lowercase().replace(' ', "-"));
        (syntax, slug)
    })
}

/// Class for the innermost scope worth styling, if any
fn class_for(stack: &ScopeStack) -> Option<String> {
    stack.as_slice().iter().rev().find_map(|scope| {
        let name = scope.build_string();
        let root = name.split('.').next().unwrap_or_default();
        if root.is_empty() || NEUTRAL_SCOPES.contains(&root) {
            None
        } else {
            Some(format!("hl-{}", root))
        }
    })
}

fn push_token(out: &mut Vec<Node>, text: &str, class: Option<String>) {
    if text.is_empty() {
        return;
    }
    match class {
        None => push_merged(out, Node::text(text)),
        Some(class) => {
            // Merge with a preceding span of the same class
            if let Some(Node::Element(prev)) = out.last_mut() {
                if prev.tag == "span" && prev.attrs.get("class") == Some(&class) {
                    prev.push_child(Node::text(text));
                    return;
                }
            }
            out.push(Node::Element(
                Element::new("span")
                    .with_attr("class", class)
                    .with_children(vec![Node::text(text)]),
            ));
        }
    }
}

/// Highlight `code`, best-effort matching `language` and falling back to
/// auto-detection and finally plain text.
pub fn highlight_code(code: &str, language: Option<&str>) -> HighlightedCode {
    let ss = syntax_set();
    let Some((syntax, slug)) = resolve_syntax(ss, language, code) else {
        return HighlightedCode {
            language: None,
            nodes: plain(code),
        };
    };

    let mut state = ParseState::new(syntax);
    let mut stack = ScopeStack::new();
    let mut nodes = Vec::new();

    for line in LinesWithEndings::from(code) {
        let ops = match state.parse_line(line, ss) {
            Ok(ops) => ops,
            Err(e) => {
                debug!(error = %e, "Highlighting failed, rendering remainder as plain text");
                let consumed: usize = nodes.iter().map(text_len).sum();
                push_merged(&mut nodes, Node::text(&code[consumed..]));
                break;
            }
        };

        let mut cursor = 0;
        for (index, op) in &ops {
            let index = (*index).min(line.len());
            if index > cursor {
                push_token(&mut nodes, &line[cursor..index], class_for(&stack));
                cursor = index;
            }
            if stack.apply(op).is_err() {
                stack = ScopeStack::new();
            }
        }
        push_token(&mut nodes, &line[cursor..], class_for(&stack));
    }

    HighlightedCode {
        language: Some(slug),
        nodes,
    }
}

fn plain(code: &str) -> Vec<Node> {
    if code.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(code)]
    }
}

fn text_len(node: &Node) -> usize {
    match node {
        Node::Text(text) => text.len(),
        Node::Element(el) => el.children.iter().map(text_len).sum(),
    }
}
