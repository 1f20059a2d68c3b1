//! Text selection anchored to live text nodes.
//!
//! Anchors reference `NodeId`s, which survive in-place updates (`SetText`,
//! `SetAttributes`) but not removal or replacement of their subtree.

use super::live::NodeId;

/// A caret position inside a text node, counted in chars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAnchor {
    pub node: NodeId,
    pub offset: usize,
}

impl TextAnchor {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A selection range; `anchor == focus` is a collapsed caret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: TextAnchor,
    pub focus: TextAnchor,
}

impl Selection {
    pub fn new(anchor: TextAnchor, focus: TextAnchor) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(at: TextAnchor) -> Self {
        Self {
            anchor: at,
            focus: at,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}
