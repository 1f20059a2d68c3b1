//! Incremental tree patching
//!
//! - `node` - immutable compiled trees (`Fragment`, `Node`)
//! - `diff` - pure `diff(old, new) -> Vec<Patch>`
//! - `live` - the mutable container patches are applied to
//! - `selection` - text selection anchored to live nodes

pub mod diff;
pub mod live;
pub mod node;
pub mod selection;

pub use diff::{diff, NodePath, Patch};
pub use live::{ContainerId, LiveTree, NodeId, PatchError, PatchStats};
pub use node::{Attributes, Element, Fragment, Node};
pub use selection::{Selection, TextAnchor};
