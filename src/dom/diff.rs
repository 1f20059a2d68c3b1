//! Pure tree diff producing an edit script.
//!
//! Nodes at the same position with the same kind (both text, or elements
//! with the same tag) are reused and updated in place; only kind changes
//! cause a replacement. Length changes at each level become trailing
//! removals (highest index first) followed by insertions, so every patch
//! path is valid at the moment it is applied.

use super::node::{Attributes, Node};

/// Path from the container to a node, as child indices
pub type NodePath = Vec<usize>;

/// A single edit operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Insert `node` as child `index` of the node at `parent`
    Insert {
        parent: NodePath,
        index: usize,
        node: Node,
    },
    /// Remove child `index` of the node at `parent`
    Remove { parent: NodePath, index: usize },
    /// Replace the node at `path` with a new subtree
    Replace { path: NodePath, node: Node },
    /// Set the content of the text node at `path`
    SetText { path: NodePath, text: String },
    /// Replace all attributes of the element at `path`
    SetAttributes { path: NodePath, attrs: Attributes },
}

impl Patch {
    /// Whether this operation changes tree structure (vs. an in-place update)
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Patch::Insert { .. } | Patch::Remove { .. } | Patch::Replace { .. }
        )
    }
}

/// Compute the edit script that turns `old` into `new`
pub fn diff(old: &[Node], new: &[Node]) -> Vec<Patch> {
    let mut patches = Vec::new();
    let mut path = NodePath::new();
    diff_children(&mut path, old, new, &mut patches);
    patches
}

fn diff_children(path: &mut NodePath, old: &[Node], new: &[Node], out: &mut Vec<Patch>) {
    let common = old.len().min(new.len());

    for index in 0..common {
        path.push(index);
        diff_node(path, &old[index], &new[index], out);
        path.pop();
    }

    for index in (common..old.len()).rev() {
        out.push(Patch::Remove {
            parent: path.clone(),
            index,
        });
    }

    for (index, node) in new.iter().enumerate().skip(common) {
        out.push(Patch::Insert {
            parent: path.clone(),
            index,
            node: node.clone(),
        });
    }
}

fn diff_node(path: &mut NodePath, old: &Node, new: &Node, out: &mut Vec<Patch>) {
    if !old.same_kind(new) {
        out.push(Patch::Replace {
            path: path.clone(),
            node: new.clone(),
        });
        return;
    }

    match (old, new) {
        (Node::Text(a), Node::Text(b)) if a != b => out.push(Patch::SetText {
            path: path.clone(),
            text: b.clone(),
        }),
        (Node::Element(a), Node::Element(b)) => {
            if a.attrs != b.attrs {
                out.push(Patch::SetAttributes {
                    path: path.clone(),
                    attrs: b.attrs.clone(),
                });
            }
            diff_children(path, &a.children, &b.children, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::Element;

    fn p(text: &str) -> Node {
        Node::element("p", vec![Node::text(text)])
    }

    #[test]
    fn test_identical_trees_produce_no_patches() {
        let tree = vec![p("Hello"), p("World")];
        assert!(diff(&tree, &tree).is_empty());
    }

    #[test]
    fn test_growing_text_is_updated_in_place() {
        let old = vec![p("Hi")];
        let new = vec![p("Hi there")];
        let patches = diff(&old, &new);
        assert_eq!(
            patches,
            vec![Patch::SetText {
                path: vec![0, 0],
                text: "Hi there".into()
            }]
        );
        assert!(patches.iter().all(|patch| !patch.is_structural()));
    }

    #[test]
    fn test_appended_block_is_single_insert() {
        let old = vec![p("one")];
        let new = vec![p("one"), p("two")];
        assert_eq!(
            diff(&old, &new),
            vec![Patch::Insert {
                parent: vec![],
                index: 1,
                node: p("two")
            }]
        );
    }

    #[test]
    fn test_kind_change_replaces_only_that_node() {
        let old = vec![p("intro"), p("- item")];
        let new = vec![
            p("intro"),
            Node::element("ul", vec![Node::element("li", vec![Node::text("item")])]),
        ];
        let patches = diff(&old, &new);
        assert_eq!(patches.len(), 1);
        assert!(matches!(&patches[0], Patch::Replace { path, .. } if path == &vec![1]));
    }

    #[test]
    fn test_removals_run_from_highest_index() {
        let old = vec![p("a"), p("b"), p("c")];
        let new = vec![p("a")];
        assert_eq!(
            diff(&old, &new),
            vec![
                Patch::Remove {
                    parent: vec![],
                    index: 2
                },
                Patch::Remove {
                    parent: vec![],
                    index: 1
                },
            ]
        );
    }

    #[test]
    fn test_attribute_change_keeps_children() {
        let old = vec![Node::Element(
            Element::new("code")
                .with_attr("class", "language-text")
                .with_children(vec![Node::text("fn main")]),
        )];
        let new = vec![Node::Element(
            Element::new("code")
                .with_attr("class", "language-rust")
                .with_children(vec![Node::text("fn main")]),
        )];
        let patches = diff(&old, &new);
        assert_eq!(patches.len(), 1);
        assert!(matches!(&patches[0], Patch::SetAttributes { path, .. } if path == &vec![0]));
    }
}
