//! Markdown → sanitized node tree.
//!
//! Parsing is done by pulldown-cmark; the event stream is folded into a
//! `Fragment` by a small frame-stack builder. Sanitization happens while
//! building: only allowlisted tags are ever created, so there is no
//! separate cleaning pass over an HTML string.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use thiserror::Error;
use tracing::warn;

use super::highlight::highlight_code;
use super::sanitize::{
    allowed_raw_tag, is_stripped_container, sanitize_attributes, tokenize_html, HtmlToken,
};
use crate::config::defaults::DEFAULT_MAX_NESTING_DEPTH;
use crate::dom::node::{push_merged, Element, Fragment, Node};

/// Internal compile failure. Never escapes `MarkdownCompiler::compile`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("markdown nesting exceeds {depth} levels")]
    NestingTooDeep { depth: usize },

    #[error("unbalanced markdown event stream")]
    Unbalanced,
}

/// Compiles Markdown source into sanitized fragments
#[derive(Debug, Clone)]
pub struct MarkdownCompiler {
    max_depth: usize,
}

impl Default for MarkdownCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NESTING_DEPTH)
    }
}

impl MarkdownCompiler {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compile `text`, falling back to a single literal paragraph on failure
    pub fn compile(&self, text: &str) -> Fragment {
        match self.try_compile(text) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Markdown compile failed, rendering literal text");
                literal(text)
            }
        }
    }

    pub fn try_compile(&self, text: &str) -> Result<Fragment, RenderError> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut builder = TreeBuilder::new(self.max_depth);
        for event in Parser::new_ext(text, options) {
            builder.event(event)?;
        }
        builder.finish()
    }
}

fn literal(text: &str) -> Fragment {
    if text.is_empty() {
        return Fragment::default();
    }
    Fragment::new(vec![Node::element("p", vec![Node::text(text)])])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOrigin {
    Markdown,
    RawHtml,
}

#[derive(Debug)]
enum FrameKind {
    Element,
    /// Contributes its children to the parent (images, HTML blocks, unknown tags)
    Transparent,
    CodeBlock {
        language: Option<String>,
        fenced: bool,
        code: String,
    },
    TableHead,
    Table,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    origin: FrameOrigin,
    el: Element,
}

struct TreeBuilder {
    max_depth: usize,
    root: Vec<Node>,
    frames: Vec<Frame>,
    /// Set while inside a stripped container such as `<script>`
    skip_until: Option<String>,
}

impl TreeBuilder {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            root: Vec::new(),
            frames: Vec::new(),
            skip_until: None,
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        match event {
            Event::Start(tag) => self.start(tag)?,
            Event::End(_) => self.close_markdown()?,
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if self.skip_until.is_none() {
                    self.append(Node::element("code", vec![Node::text(code.to_string())]));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html)?,
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => self.append(Node::element("br", vec![])),
            Event::Rule => self.append(Node::element("hr", vec![])),
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<(), RenderError> {
        let (kind, el) = match tag {
            Tag::Paragraph => (FrameKind::Element, Element::new("p")),
            Tag::Heading { level, .. } => {
                (FrameKind::Element, Element::new(format!("h{}", level as usize)))
            }
            Tag::BlockQuote { .. } => (FrameKind::Element, Element::new("blockquote")),
            Tag::CodeBlock(kind) => {
                let (language, fenced) = match kind {
                    CodeBlockKind::Fenced(info) => (
                        info.split_whitespace().next().map(str::to_string),
                        true,
                    ),
                    CodeBlockKind::Indented => (None, false),
                };
                let kind = FrameKind::CodeBlock {
                    language,
                    fenced,
                    code: String::new(),
                };
                (kind, Element::new("code"))
            }
            Tag::List(Some(start)) => {
                let mut el = Element::new("ol");
                if start != 1 {
                    el = el.with_attr("start", start.to_string());
                }
                (FrameKind::Element, el)
            }
            Tag::List(None) => (FrameKind::Element, Element::new("ul")),
            Tag::Item => (FrameKind::Element, Element::new("li")),
            Tag::Table(_) => (FrameKind::Table, Element::new("table")),
            Tag::TableHead => (FrameKind::TableHead, Element::new("thead")),
            Tag::TableRow => (FrameKind::Element, Element::new("tr")),
            Tag::TableCell => {
                let cell = if self.in_table_head() { "th" } else { "td" };
                (FrameKind::Element, Element::new(cell))
            }
            Tag::Emphasis => (FrameKind::Element, Element::new("em")),
            Tag::Strong => (FrameKind::Element, Element::new("strong")),
            Tag::Strikethrough => (FrameKind::Element, Element::new("del")),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut attrs = vec![("href", &*dest_url)];
                if !title.is_empty() {
                    attrs.push(("title", &*title));
                }
                let mut el = Element::new("a");
                el.attrs = sanitize_attributes("a", attrs);
                (FrameKind::Element, el)
            }
            _ => (FrameKind::Transparent, Element::new("")),
        };
        self.push_frame(kind, FrameOrigin::Markdown, el)
    }

    fn push_frame(
        &mut self,
        kind: FrameKind,
        origin: FrameOrigin,
        mut el: Element,
    ) -> Result<(), RenderError> {
        if self.frames.len() >= self.max_depth {
            return Err(RenderError::NestingTooDeep {
                depth: self.max_depth,
            });
        }
        decorate(&mut el);
        self.frames.push(Frame { kind, origin, el });
        Ok(())
    }

    /// Close frames up to and including the innermost Markdown frame
    fn close_markdown(&mut self) -> Result<(), RenderError> {
        while let Some(frame) = self.frames.pop() {
            let origin = frame.origin;
            self.close(frame);
            if origin == FrameOrigin::Markdown {
                return Ok(());
            }
        }
        Err(RenderError::Unbalanced)
    }

    fn close(&mut self, frame: Frame) {
        let Frame { kind, mut el, .. } = frame;
        match kind {
            FrameKind::Element => self.append(Node::Element(el)),
            FrameKind::Transparent => {
                for child in el.children {
                    self.append(child);
                }
            }
            FrameKind::CodeBlock {
                language,
                fenced,
                code,
            } => self.append(code_block(&code, language.as_deref(), fenced)),
            FrameKind::TableHead => {
                let row = Node::element("tr", std::mem::take(&mut el.children));
                el.children = vec![row];
                self.append(Node::Element(el));
            }
            FrameKind::Table => {
                let mut children = Vec::new();
                let mut body = Vec::new();
                for child in std::mem::take(&mut el.children) {
                    match &child {
                        Node::Element(row) if row.tag == "tr" => body.push(child),
                        _ => children.push(child),
                    }
                }
                if !body.is_empty() {
                    children.push(Node::element("tbody", body));
                }
                el.children = children;
                self.append(Node::Element(el));
            }
        }
    }

    fn in_table_head(&self) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|f| matches!(f.kind, FrameKind::TableHead))
    }

    /// Whether appended nodes would land at the top level
    fn at_root(&self) -> bool {
        self.frames
            .iter()
            .all(|f| matches!(f.kind, FrameKind::Transparent))
    }

    fn append(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(Frame {
                kind: FrameKind::CodeBlock { code, .. },
                ..
            }) => {
                if let Node::Text(text) = node {
                    code.push_str(&text);
                }
            }
            Some(frame) => frame.el.push_child(node),
            None => push_merged(&mut self.root, node),
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip_until.is_none() {
            self.append(Node::text(text));
        }
    }

    fn raw_html(&mut self, html: &str) -> Result<(), RenderError> {
        for token in tokenize_html(html) {
            if let Some(until) = &self.skip_until {
                if matches!(&token, HtmlToken::Close { tag } if tag == until) {
                    self.skip_until = None;
                }
                continue;
            }

            match token {
                HtmlToken::Text(text) => {
                    if text.trim().is_empty() && self.at_root() {
                        continue;
                    }
                    self.append(Node::text(text));
                }
                HtmlToken::Open {
                    tag,
                    attrs,
                    self_closing,
                } => {
                    if is_stripped_container(&tag) {
                        if !self_closing {
                            self.skip_until = Some(tag);
                        }
                        continue;
                    }
                    let Some(allowed) = allowed_raw_tag(&tag) else {
                        continue;
                    };
                    let mut el = Element::new(allowed);
                    el.attrs = sanitize_attributes(
                        allowed,
                        attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    );
                    if el.is_void() || self_closing {
                        decorate(&mut el);
                        self.append(Node::Element(el));
                    } else {
                        self.push_frame(FrameKind::Element, FrameOrigin::RawHtml, el)?;
                    }
                }
                HtmlToken::Close { tag } => {
                    let Some(allowed) = allowed_raw_tag(&tag) else {
                        continue;
                    };
                    self.close_raw(allowed);
                }
            }
        }
        Ok(())
    }

    /// Close the innermost open raw element named `tag`, if it was opened
    /// inside the current Markdown block
    fn close_raw(&mut self, tag: &str) {
        let open = self
            .frames
            .iter()
            .rev()
            .take_while(|f| f.origin == FrameOrigin::RawHtml)
            .position(|f| f.el.tag == tag);
        let Some(depth) = open else {
            return;
        };
        for _ in 0..=depth {
            if let Some(frame) = self.frames.pop() {
                self.close(frame);
            }
        }
    }

    fn finish(mut self) -> Result<Fragment, RenderError> {
        while let Some(frame) = self.frames.pop() {
            if frame.origin == FrameOrigin::Markdown {
                return Err(RenderError::Unbalanced);
            }
            self.close(frame);
        }
        Ok(Fragment::new(self.root))
    }
}

/// Presentational classes and link hardening
fn decorate(el: &mut Element) {
    match el.tag.as_str() {
        "a" => {
            el.attrs.insert("class".into(), "md-link".into());
            el.attrs.insert("rel".into(), "noopener noreferrer".into());
        }
        "pre" => {
            el.attrs.insert("class".into(), "md-code-block".into());
        }
        "table" => {
            el.attrs.insert("class".into(), "md-table".into());
        }
        _ => {}
    }
}

fn code_block(code: &str, language: Option<&str>, fenced: bool) -> Node {
    let (language, children) = if fenced {
        let highlighted = highlight_code(code, language);
        (highlighted.language, highlighted.nodes)
    } else {
        let children = if code.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(code)]
        };
        (None, children)
    };

    let mut code_el = Element::new("code").with_children(children);
    if let Some(language) = language {
        code_el = code_el.with_attr("class", format!("language-{}", language));
    }
    let mut pre = Element::new("pre").with_children(vec![Node::Element(code_el)]);
    decorate(&mut pre);
    Node::Element(pre)
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
