//! Highlight Anchoring WASM Module
//!
//! Lets a reader select text inside rendered content, remember the passage
//! as a portable anchor, and re-find and mark it after the content has been
//! re-rendered.
//!
//! The core (`dom`, `highlights`) is plain Rust and testable natively; `api`
//! is the `wasm_bindgen` surface used by the web client.

pub mod api;
pub mod config;
pub mod dom;
pub mod error;
pub mod highlights;

// Re-export commonly used types
pub use config::EngineOptions;
pub use error::EngineError;
pub use highlights::session::HighlightSession;
pub use highlights::types::*;

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if let Err(err) = console_log::init_with_level(log::Level::Debug) {
        wasm_warn!("Logger already initialized: {}", err);
    }

    log::info!("Highlight WASM module initialized");
}
