//! The `HighlightEngine` class
//!
//! One engine per mounted piece of content. The engine holds a
//! [`HighlightSession`] over its own copy of the content plus an
//! [`InMemoryHighlightStore`] mirroring the user's records; the host syncs
//! the store with its server and applies the returned HTML.

use wasm_bindgen::prelude::*;

use super::helpers::{deserialize, deserialize_or_default, engine_error, now_ms, serialize};
use super::types::{DomSelection, RenderSummary};
use crate::config::EngineOptions;
use crate::dom::path::node_at_path;
use crate::error::EngineError;
use crate::highlights::session::{HighlightSession, HighlightStyle, ListingFilter, PendingSelection};
use crate::highlights::store::{InMemoryHighlightStore, LegacyNote, UpdateHighlightRequest};
use crate::highlights::types::{HighlightAnchor, HighlightRecord, DEFAULT_PALETTE};
use crate::{wasm_info, wasm_warn};

#[wasm_bindgen]
pub struct HighlightEngine {
    session: HighlightSession,
    store: InMemoryHighlightStore,
    user_id: String,
}

impl HighlightEngine {
    fn summary(&self) -> Result<JsValue, JsValue> {
        serialize(&RenderSummary::from(&self.session), "Failed to serialize render summary")
    }

    fn selection_range(&self, selection: JsValue) -> Result<crate::dom::Range, JsValue> {
        let selection: DomSelection = deserialize(selection, "Invalid selection")?;
        selection
            .to_range(self.session.document(), self.session.root())
            .map_err(|e| engine_error("Invalid selection", e))
    }

    /// Records arrive already scoped to this document and user by the host
    fn replace_records(&mut self, records: Vec<HighlightRecord>) -> usize {
        let count = records.len();
        self.store = InMemoryHighlightStore::with_records(&self.user_id, records.clone());
        self.session.set_highlights(records);
        count
    }
}

#[wasm_bindgen]
impl HighlightEngine {
    /// Mount content for a document
    ///
    /// `options` is an `EngineOptions` object; missing fields take defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(document_id: &str, user_id: &str, html: &str, options: JsValue) -> Result<HighlightEngine, JsValue> {
        let options: EngineOptions = deserialize_or_default(options, "Invalid engine options")?;
        options
            .validate()
            .map_err(|e| engine_error("Invalid engine options", EngineError::from(e)))?;

        let session = HighlightSession::from_html(document_id, html, options)
            .map_err(|e| engine_error("Failed to mount content", e))?;
        wasm_info!(
            "Mounted document {} ({} chars indexed)",
            document_id,
            session.index().char_len
        );

        Ok(HighlightEngine {
            session,
            store: InMemoryHighlightStore::new(user_id),
            user_id: user_id.to_string(),
        })
    }

    /// Replace the content after a re-render; highlights are re-resolved
    #[wasm_bindgen(js_name = setContent)]
    pub fn set_content(&mut self, html: &str) -> Result<JsValue, JsValue> {
        self.session
            .set_content(html)
            .map_err(|e| engine_error("Failed to replace content", e))?;
        self.summary()
    }

    /// Load `HighlightRecord[]` fetched by the host
    #[wasm_bindgen(js_name = loadHighlights)]
    pub fn load_highlights(&mut self, records: JsValue) -> Result<JsValue, JsValue> {
        let records: Vec<HighlightRecord> = deserialize(records, "Invalid highlight records")?;
        let count = self.replace_records(records);
        wasm_info!("Loaded {} highlights", count);
        self.summary()
    }

    /// Load notes written by older clients
    #[wasm_bindgen(js_name = loadLegacyNotes)]
    pub fn load_legacy_notes(&mut self, notes: JsValue) -> Result<JsValue, JsValue> {
        let notes: Vec<LegacyNote> = deserialize(notes, "Invalid legacy notes")?;
        let records: Vec<HighlightRecord> = notes.into_iter().map(HighlightRecord::from).collect();
        let count = self.replace_records(records);
        wasm_info!("Loaded {} legacy notes", count);
        self.summary()
    }

    /// Re-run index, resolve and render over the current content
    pub fn render(&mut self) -> Result<JsValue, JsValue> {
        self.session.refresh();
        self.summary()
    }

    #[wasm_bindgen(js_name = renderedHtml)]
    pub fn rendered_html(&self) -> String {
        self.session.to_html()
    }

    /// Report a `selectionchange`; capture happens in `flushSelection`
    #[wasm_bindgen(js_name = selectionChanged)]
    pub fn selection_changed(&mut self, selection: JsValue) -> Result<(), JsValue> {
        let range = self.selection_range(selection)?;
        self.session.selection_changed(range, now_ms());
        Ok(())
    }

    /// Capture the debounced selection if it is due; `null` otherwise
    #[wasm_bindgen(js_name = flushSelection)]
    pub fn flush_selection(&mut self) -> Result<JsValue, JsValue> {
        let outcome = self.session.flush_selection(now_ms());
        serialize(&outcome, "Failed to serialize selection")
    }

    /// Capture a selection immediately, bypassing the debounce
    #[wasm_bindgen(js_name = captureSelection)]
    pub fn capture_selection(&self, selection: JsValue) -> Result<JsValue, JsValue> {
        let range = self.selection_range(selection)?;
        let outcome = self.session.capture_selection(&range);
        serialize(&outcome, "Failed to serialize selection")
    }

    /// Persist a captured selection; returns the new record
    #[wasm_bindgen(js_name = createHighlight)]
    pub fn create_highlight(&mut self, pending: JsValue, style: JsValue) -> Result<JsValue, JsValue> {
        let pending: PendingSelection = deserialize(pending, "Invalid pending selection")?;
        let style: HighlightStyle = deserialize_or_default(style, "Invalid highlight style")?;
        let record = self
            .session
            .create_highlight_from_selection(&mut self.store, &pending, style)
            .map_err(|e| engine_error("Failed to create highlight", e))?;
        serialize(&record, "Failed to serialize highlight")
    }

    /// Persist a highlight for an anchor built elsewhere
    #[wasm_bindgen(js_name = createHighlightFromAnchor)]
    pub fn create_highlight_from_anchor(&mut self, anchor: JsValue, style: JsValue) -> Result<JsValue, JsValue> {
        let anchor: HighlightAnchor = deserialize(anchor, "Invalid anchor")?;
        let style: HighlightStyle = deserialize_or_default(style, "Invalid highlight style")?;
        let record = self
            .session
            .create_highlight(&mut self.store, anchor, style)
            .map_err(|e| engine_error("Failed to create highlight", e))?;
        serialize(&record, "Failed to serialize highlight")
    }

    /// Change color, opacity or note of a highlight
    #[wasm_bindgen(js_name = updateHighlight)]
    pub fn update_highlight(&mut self, id: &str, patch: JsValue) -> Result<JsValue, JsValue> {
        let patch: UpdateHighlightRequest = deserialize(patch, "Invalid highlight update")?;
        let record = self
            .session
            .update_highlight(&mut self.store, id, patch)
            .map_err(|e| engine_error("Failed to update highlight", e))?;
        serialize(&record, "Failed to serialize highlight")
    }

    #[wasm_bindgen(js_name = deleteHighlight)]
    pub fn delete_highlight(&mut self, id: &str) -> Result<JsValue, JsValue> {
        self.session
            .delete_highlight(&mut self.store, id)
            .map_err(|e| engine_error("Failed to delete highlight", e))?;
        self.summary()
    }

    /// Listing rows; `filter` is "all", "orphaned" or "with-notes"
    #[wasm_bindgen(js_name = listHighlights)]
    pub fn list_highlights(&self, filter: JsValue) -> Result<JsValue, JsValue> {
        let filter: ListingFilter = deserialize_or_default(filter, "Invalid listing filter")?;
        serialize(&self.session.listing(filter), "Failed to serialize listing")
    }

    pub fn segments(&self) -> Result<JsValue, JsValue> {
        let canonical = &self.session.index().canonical_text;
        let segments: Vec<_> = self
            .session
            .segments()
            .iter()
            .map(|segment| segment.to_utf16(canonical))
            .collect();
        serialize(&segments, "Failed to serialize segments")
    }

    /// The highlight a click on the node at `path` opens, if any
    #[wasm_bindgen(js_name = highlightAt)]
    pub fn highlight_at(&self, path: JsValue) -> Result<Option<String>, JsValue> {
        let path: Vec<usize> = deserialize(path, "Invalid node path")?;
        let Some(node) = node_at_path(self.session.document(), self.session.root(), &path) else {
            wasm_warn!("No node at path {:?}", path);
            return Ok(None);
        };
        Ok(self.session.click(node))
    }

    /// All records held by the local store
    #[wasm_bindgen(js_name = exportHighlights)]
    pub fn export_highlights(&self) -> Result<JsValue, JsValue> {
        serialize(&self.store.records(), "Failed to serialize highlights")
    }

    /// Records in the note shape older clients read
    #[wasm_bindgen(js_name = exportLegacyNotes)]
    pub fn export_legacy_notes(&self) -> Result<JsValue, JsValue> {
        let notes: Vec<LegacyNote> = self.store.records().iter().map(LegacyNote::from_record).collect();
        serialize(&notes, "Failed to serialize legacy notes")
    }
}

#[derive(serde::Serialize)]
struct PaletteEntry {
    name: &'static str,
    color: &'static str,
}

/// Preset highlight colors offered by the UI
#[wasm_bindgen(js_name = defaultPalette)]
pub fn default_palette() -> Result<JsValue, JsValue> {
    let palette: Vec<PaletteEntry> = DEFAULT_PALETTE
        .iter()
        .map(|&(name, color)| PaletteEntry { name, color })
        .collect();
    serialize(&palette, "Failed to serialize palette")
}
