//! Derives annotations from host content: classifies containers, stamps
//! ordinal labels on list items, and maintains per-container summary
//! displays. Everything here is a pure function of the current tree plus
//! idempotence markers left on previously annotated nodes.

pub mod classify;
pub mod display;
pub mod errors;
pub mod markers;
pub mod numbering;

pub use classify::{classify, locate_regions, Regions};
pub use display::{ensure_display, find_display, render_summary, update_display, Counts};
pub use errors::AnnotateError;
pub use numbering::{annotate_items, is_numbered, LabelPlacement};
