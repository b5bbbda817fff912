//! Text anchoring and highlight rendering
//!
//! Control flow on mount: build the text index, fetch records, resolve each
//! anchor, render. On a new selection: map it to canonical offsets with the
//! current index, capture quote and context, persist, then re-run the cycle.
//!
//! ## Modules
//!
//! - `types`: anchors, records, resolution results, segments
//! - `text_index`: canonical text projection and offset conversion
//! - `anchor`: selection to anchor capture
//! - `resolve`: staged anchor resolution
//! - `segments`, `color`, `render`: overlap splitting and DOM marking
//! - `store`: persistence contract, in-memory store, legacy notes
//! - `debounce`: selection-change coalescing
//! - `session`: the cycle above, over one mounted document

pub mod anchor;
pub mod color;
pub mod debounce;
pub mod render;
pub mod resolve;
pub mod segments;
pub mod session;
pub mod store;
pub mod text_index;
pub mod types;

pub use anchor::{create_anchor, create_anchor_from_offsets};
pub use render::{clear_rendered_highlights, render_highlights};
pub use resolve::{resolve_highlight, resolve_highlights, MatchScoring};
pub use segments::build_segments;
pub use text_index::{build_text_index, extract_text_quote, offsets_to_range, range_to_offsets};
