//! Highlight WASM API
//!
//! JavaScript-facing surface of the engine. The host keeps the rendered
//! content in the page; the engine keeps a mirror of it, returns the marked
//! HTML after every pass, and receives selections as child-index paths
//! relative to the content root.
//!
//! # Module Structure
//!
//! - `helpers`: console logging macros and serialization helpers
//! - `types`: values exchanged with JavaScript
//! - `engine`: the `HighlightEngine` class

pub mod helpers;
pub mod types;
pub mod engine;

pub use engine::{default_palette, HighlightEngine};
pub use types::{DomSelection, RenderSummary};
