//! Sanitizing Markdown compiler
//!
//! - `compiler` - pulldown-cmark events folded into a sanitized `Fragment`
//! - `sanitize` - tag/attribute/URL allowlists and the raw HTML tokenizer
//! - `highlight` - syntect classed spans for fenced code

pub mod compiler;
pub mod highlight;
pub mod sanitize;

pub use compiler::{MarkdownCompiler, RenderError};
pub use highlight::{highlight_code, HighlightedCode};

use crate::dom::Fragment;

/// Compile with the default nesting limit
pub fn compile(text: &str) -> Fragment {
    MarkdownCompiler::default().compile(text)
}
