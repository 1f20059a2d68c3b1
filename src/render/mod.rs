//! Stream rendering
//!
//! - `scheduler` - single-slot debounce with a max-wait bound
//! - `renderer` - compile + diff + patch cycles for one live container

pub mod renderer;
pub mod scheduler;

pub use renderer::{CycleReport, RenderOptions, StreamRenderer};
pub use scheduler::DebounceSlot;
