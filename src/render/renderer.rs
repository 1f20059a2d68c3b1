//! Debounced Markdown rendering into a live container.
//!
//! The renderer is fed the full, growing content of one message. Each
//! update that grows the content replaces the pending cycle; when the cycle
//! runs it compiles the latest text, diffs it against the previous
//! snapshot and patches the container in place.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::scheduler::DebounceSlot;
use crate::config::defaults::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_WAIT_MS,
};
use crate::config::Config;
use crate::dom::{diff, ContainerId, Fragment, LiveTree, PatchStats};
use crate::markdown::MarkdownCompiler;

/// Timing and compiler settings for a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub debounce: Duration,
    pub max_wait: Duration,
    pub max_nesting_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            max_wait: Duration::from_millis(DEFAULT_MAX_WAIT_MS),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.get_debounce(),
            max_wait: config.get_max_wait(),
            max_nesting_depth: config.get_max_nesting_depth(),
        }
    }
}

/// What one completed cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub container: ContainerId,
    pub content_len: usize,
    pub stats: PatchStats,
    /// The patch failed and the container was rebuilt from scratch
    pub rebuilt: bool,
    pub selection_restored: bool,
}

/// Renders one message's streaming content into one container
#[derive(Debug)]
pub struct StreamRenderer {
    container: ContainerId,
    compiler: MarkdownCompiler,
    slot: DebounceSlot<String>,
    snapshot: Option<Fragment>,
    last_rendered_len: usize,
}

impl StreamRenderer {
    pub fn new(container: ContainerId, options: RenderOptions) -> Self {
        Self {
            container,
            compiler: MarkdownCompiler::new(options.max_nesting_depth),
            slot: DebounceSlot::new(options.debounce, options.max_wait),
            snapshot: None,
            last_rendered_len: 0,
        }
    }

    /// Renderer bound to `tree`
    pub fn for_tree(tree: &LiveTree, options: RenderOptions) -> Self {
        Self::new(tree.id(), options)
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn last_rendered_len(&self) -> usize {
        self.last_rendered_len
    }

    pub fn snapshot(&self) -> Option<&Fragment> {
        self.snapshot.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slot.next_deadline()
    }

    /// Offer the latest full content. Returns whether a cycle was scheduled.
    ///
    /// Content that has not grown since the last paint is ignored, except
    /// that empty content clears a previously painted container.
    pub fn update(&mut self, content: &str, now: Instant) -> bool {
        let grew = content.len() > self.last_rendered_len;
        let cleared = content.is_empty() && self.snapshot.as_ref().is_some_and(|s| !s.is_empty());
        if !grew && !cleared {
            return false;
        }
        self.slot.schedule(now, content.to_string());
        true
    }

    /// Run the pending cycle if its deadline has passed
    pub fn tick(&mut self, now: Instant, tree: &mut LiveTree) -> Option<CycleReport> {
        let content = self.slot.take_due(now)?;
        self.run_cycle(content, tree)
    }

    /// Run the pending cycle immediately
    pub fn flush(&mut self, tree: &mut LiveTree) -> Option<CycleReport> {
        let content = self.slot.take()?;
        self.run_cycle(content, tree)
    }

    /// Cancel the pending cycle and forget the snapshot. Clears `tree` when
    /// it is this renderer's container.
    pub fn reset(&mut self, tree: Option<&mut LiveTree>) {
        self.slot.cancel();
        self.snapshot = None;
        self.last_rendered_len = 0;
        if let Some(tree) = tree {
            if tree.id() == self.container {
                tree.clear();
            }
        }
    }

    fn run_cycle(&mut self, content: String, tree: &mut LiveTree) -> Option<CycleReport> {
        if tree.id() != self.container || !tree.is_attached() {
            debug!(
                expected = %self.container,
                actual = %tree.id(),
                attached = tree.is_attached(),
                "Dropping stale render cycle"
            );
            return None;
        }

        let saved = tree.capture_selection();
        let next = self.compiler.compile(&content);

        if self.snapshot.is_none() && !tree.is_empty() {
            tree.clear();
        }
        let old = self
            .snapshot
            .as_ref()
            .map(|f| f.nodes.as_slice())
            .unwrap_or(&[]);
        let patches = diff(old, &next.nodes);

        let (stats, rebuilt) = match tree.apply(&patches) {
            Ok(stats) => (stats, false),
            Err(e) => {
                warn!(error = %e, container = %self.container, "Patch failed, rebuilding container");
                tree.clear();
                let stats = tree
                    .apply(&diff(&[], &next.nodes))
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Rebuild failed");
                        PatchStats::default()
                    });
                (stats, true)
            }
        };

        let selection_restored = saved.is_some() && tree.restore_selection(saved);

        debug!(
            container = %self.container,
            content_len = content.len(),
            patches = patches.len(),
            structural = stats.structural(),
            rebuilt,
            "Render cycle applied"
        );

        self.snapshot = Some(next);
        self.last_rendered_len = content.len();

        Some(CycleReport {
            container: self.container,
            content_len: content.len(),
            stats,
            rebuilt,
            selection_restored,
        })
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
