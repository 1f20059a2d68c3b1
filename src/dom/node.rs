//! Immutable node trees produced by the Markdown compiler.
//!
//! A `Fragment` is the snapshot the renderer diffs against; it is never
//! mutated after compilation.

use std::collections::BTreeMap;

/// Element attributes, kept sorted so equal trees compare and serialize equally
pub type Attributes = BTreeMap<String, String>;

/// Elements that never have children
const VOID_TAGS: &[&str] = &["br", "hr"];

/// An element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder-style children setter
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag.as_str())
    }

    /// Append a child, merging adjacent text so equal input yields equal trees
    pub fn push_child(&mut self, node: Node) {
        push_merged(&mut self.children, node);
    }
}

/// A node in a compiled tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(Element::new(tag).with_children(children))
    }

    /// Whether two nodes can be updated in place instead of replaced
    pub fn same_kind(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Text(_), Node::Text(_)) => true,
            (Node::Element(a), Node::Element(b)) => a.tag == b.tag,
            _ => false,
        }
    }

    pub fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if el.is_void() {
                    return;
                }
                for child in &el.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    pub fn write_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.tag == "br" => out.push('\n'),
            Node::Element(el) => {
                for child in &el.children {
                    child.write_text(out);
                }
            }
        }
    }
}

/// A compiled, sanitized list of top-level nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_html(&mut out);
        }
        out
    }

    /// Visible text with markup removed
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_text(&mut out);
        }
        out
    }
}

/// Push `node` onto `children`, merging it into a trailing text node
pub fn push_merged(children: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
            return;
        }
    }
    children.push(node);
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_merged_joins_text() {
        let mut children = Vec::new();
        push_merged(&mut children, Node::text("Hi"));
        push_merged(&mut children, Node::text(" there"));
        push_merged(&mut children, Node::text(""));
        assert_eq!(children, vec![Node::text("Hi there")]);
    }

    #[test]
    fn test_html_serialization_escapes() {
        let link = Element::new("a")
            .with_attr("href", "https://example.com/?a=1&b=\"2\"")
            .with_children(vec![Node::text("<b>")]);
        let fragment = Fragment::new(vec![Node::Element(link)]);
        assert_eq!(
            fragment.to_html(),
            "<a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\">&lt;b&gt;</a>"
        );
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let fragment = Fragment::new(vec![Node::element(
            "p",
            vec![Node::text("a"), Node::element("br", vec![]), Node::text("b")],
        )]);
        assert_eq!(fragment.to_html(), "<p>a<br>b</p>");
        assert_eq!(fragment.text_content(), "a\nb");
    }

    #[test]
    fn test_same_kind() {
        assert!(Node::text("a").same_kind(&Node::text("b")));
        assert!(Node::element("p", vec![]).same_kind(&Node::element("p", vec![Node::text("x")])));
        assert!(!Node::element("p", vec![]).same_kind(&Node::element("ul", vec![])));
        assert!(!Node::text("a").same_kind(&Node::element("p", vec![])));
    }
}
