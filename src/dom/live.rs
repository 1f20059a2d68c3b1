//! The live, mutable container a renderer paints into.
//!
//! Nodes live in an arena keyed by `NodeId`. In-place updates keep ids
//! stable, which is what lets a text selection survive a patch cycle.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::diff::{NodePath, Patch};
use super::node::{Attributes, Element, Fragment, Node};
use super::selection::{Selection, TextAnchor};

/// Identity of a live container, checked before every deferred mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena handle of a live node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Failure applying an edit script to a live tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("no node at path {0:?}")]
    MissingNode(NodePath),

    #[error("index {index} out of bounds for {len} children at {parent:?}")]
    IndexOutOfBounds {
        parent: NodePath,
        index: usize,
        len: usize,
    },

    #[error("node at {0:?} has the wrong kind for this operation")]
    KindMismatch(NodePath),
}

/// Operation counts for one applied edit script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub inserted: usize,
    pub removed: usize,
    pub replaced: usize,
    pub updated: usize,
}

impl PatchStats {
    pub fn total(&self) -> usize {
        self.inserted + self.removed + self.replaced + self.updated
    }

    pub fn structural(&self) -> usize {
        self.inserted + self.removed + self.replaced
    }
}

#[derive(Debug, Clone)]
enum LiveKind {
    Element { tag: String, attrs: Attributes },
    Text(String),
}

#[derive(Debug, Clone)]
struct LiveNode {
    kind: LiveKind,
    children: Vec<NodeId>,
}

/// A mutable container of live nodes
#[derive(Debug)]
pub struct LiveTree {
    id: ContainerId,
    attached: bool,
    nodes: HashMap<NodeId, LiveNode>,
    roots: Vec<NodeId>,
    next_id: u64,
    selection: Option<Selection>,
}

impl Default for LiveTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTree {
    pub fn new() -> Self {
        Self {
            id: ContainerId::new(),
            attached: true,
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_id: 0,
            selection: None,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Unmount the container; deferred cycles targeting it become no-ops
    pub fn detach(&mut self) {
        self.attached = false;
        self.clear();
    }

    /// Remove every node and drop the selection
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.selection = None;
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Resolve a child-index path to a node id
    pub fn node_at(&self, path: &[usize]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut current = *self.roots.get(*first)?;
        for index in rest {
            current = *self.nodes.get(&current)?.children.get(*index)?;
        }
        Some(current)
    }

    pub fn text_of(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(&id)?.kind {
            LiveKind::Text(text) => Some(text),
            LiveKind::Element { .. } => None,
        }
    }

    /// First text node (document order) whose content contains `needle`
    pub fn find_text(&self, needle: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(&id)?;
            match &node.kind {
                LiveKind::Text(text) if text.contains(needle) => return Some(id),
                LiveKind::Text(_) => {}
                LiveKind::Element { .. } => stack.extend(node.children.iter().rev().copied()),
            }
        }
        None
    }

    // ========================================================================
    // Patching
    // ========================================================================

    /// Apply an edit script. Stops at the first invalid operation.
    pub fn apply(&mut self, patches: &[Patch]) -> Result<PatchStats, PatchError> {
        let mut stats = PatchStats::default();
        for patch in patches {
            match patch {
                Patch::Insert {
                    parent,
                    index,
                    node,
                } => {
                    let len = self.children(parent)?.len();
                    if *index > len {
                        return Err(PatchError::IndexOutOfBounds {
                            parent: parent.clone(),
                            index: *index,
                            len,
                        });
                    }
                    let id = self.build(node);
                    self.children_mut(parent)?.insert(*index, id);
                    stats.inserted += 1;
                }
                Patch::Remove { parent, index } => {
                    let children = self.children_mut(parent)?;
                    if *index >= children.len() {
                        let len = children.len();
                        return Err(PatchError::IndexOutOfBounds {
                            parent: parent.clone(),
                            index: *index,
                            len,
                        });
                    }
                    let removed = children.remove(*index);
                    self.drop_subtree(removed);
                    stats.removed += 1;
                }
                Patch::Replace { path, node } => {
                    let (index, parent) = path
                        .split_last()
                        .ok_or_else(|| PatchError::MissingNode(path.clone()))?;
                    let old = self
                        .children(parent)?
                        .get(*index)
                        .copied()
                        .ok_or_else(|| PatchError::MissingNode(path.clone()))?;
                    let id = self.build(node);
                    self.children_mut(parent)?[*index] = id;
                    self.drop_subtree(old);
                    stats.replaced += 1;
                }
                Patch::SetText { path, text } => {
                    let node = self.node_mut(path)?;
                    match &mut node.kind {
                        LiveKind::Text(current) => *current = text.clone(),
                        LiveKind::Element { .. } => {
                            return Err(PatchError::KindMismatch(path.clone()))
                        }
                    }
                    stats.updated += 1;
                }
                Patch::SetAttributes { path, attrs } => {
                    let node = self.node_mut(path)?;
                    match &mut node.kind {
                        LiveKind::Element { attrs: current, .. } => *current = attrs.clone(),
                        LiveKind::Text(_) => return Err(PatchError::KindMismatch(path.clone())),
                    }
                    stats.updated += 1;
                }
            }
        }
        Ok(stats)
    }

    fn children(&self, parent: &[usize]) -> Result<&Vec<NodeId>, PatchError> {
        if parent.is_empty() {
            return Ok(&self.roots);
        }
        let id = self
            .node_at(parent)
            .ok_or_else(|| PatchError::MissingNode(parent.to_vec()))?;
        let node = &self.nodes[&id];
        match node.kind {
            LiveKind::Element { .. } => Ok(&node.children),
            LiveKind::Text(_) => Err(PatchError::KindMismatch(parent.to_vec())),
        }
    }

    fn children_mut(&mut self, parent: &[usize]) -> Result<&mut Vec<NodeId>, PatchError> {
        if parent.is_empty() {
            return Ok(&mut self.roots);
        }
        let node = self.node_mut(parent)?;
        match node.kind {
            LiveKind::Element { .. } => Ok(&mut node.children),
            LiveKind::Text(_) => Err(PatchError::KindMismatch(parent.to_vec())),
        }
    }

    fn node_mut(&mut self, path: &[usize]) -> Result<&mut LiveNode, PatchError> {
        let id = self
            .node_at(path)
            .ok_or_else(|| PatchError::MissingNode(path.to_vec()))?;
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| PatchError::MissingNode(path.to_vec()))
    }

    fn build(&mut self, node: &Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let live = match node {
            Node::Text(text) => LiveNode {
                kind: LiveKind::Text(text.clone()),
                children: Vec::new(),
            },
            Node::Element(el) => {
                let children = el.children.iter().map(|child| self.build(child)).collect();
                LiveNode {
                    kind: LiveKind::Element {
                        tag: el.tag.clone(),
                        attrs: el.attrs.clone(),
                    },
                    children,
                }
            }
        };
        self.nodes.insert(id, live);
        id
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Snapshot the current selection before a patch cycle
    pub fn capture_selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Restore a captured selection if both anchors still exist.
    ///
    /// Offsets are clamped to the current text length. Returns false (and
    /// clears the selection) when an anchor node was removed.
    pub fn restore_selection(&mut self, saved: Option<Selection>) -> bool {
        let Some(saved) = saved else {
            self.selection = None;
            return false;
        };

        match (self.clamp(saved.anchor), self.clamp(saved.focus)) {
            (Some(anchor), Some(focus)) => {
                self.selection = Some(Selection::new(anchor, focus));
                true
            }
            _ => {
                debug!(container = %self.id, "Selection anchor removed by patch, dropping selection");
                self.selection = None;
                false
            }
        }
    }

    fn clamp(&self, anchor: TextAnchor) -> Option<TextAnchor> {
        let len = self.text_of(anchor.node)?.chars().count();
        Some(TextAnchor::new(anchor.node, anchor.offset.min(len)))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Rebuild an immutable snapshot of the current contents
    pub fn to_fragment(&self) -> Fragment {
        Fragment::new(self.roots.iter().filter_map(|id| self.snapshot(*id)).collect())
    }

    pub fn to_html(&self) -> String {
        self.to_fragment().to_html()
    }

    pub fn text_content(&self) -> String {
        self.to_fragment().text_content()
    }

    fn snapshot(&self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&id)?;
        Some(match &node.kind {
            LiveKind::Text(text) => Node::Text(text.clone()),
            LiveKind::Element { tag, attrs } => {
                let mut el = Element::new(tag.clone());
                el.attrs = attrs.clone();
                el.children = node
                    .children
                    .iter()
                    .filter_map(|child| self.snapshot(*child))
                    .collect();
                Node::Element(el)
            }
        })
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
