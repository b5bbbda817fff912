//! Highlight session
//!
//! Owns one piece of mounted content and drives the whole cycle over it:
//! index, resolve, render, capture new selections, and push edits through a
//! [`HighlightStore`]. Every change to the content or the record set goes
//! through [`HighlightSession::refresh`], which clears all markers and
//! rebuilds from scratch.

use serde::{Deserialize, Serialize};

use super::anchor::create_anchor_from_offsets;
use super::debounce::SelectionDebouncer;
use super::render::{clear_rendered_highlights, click_target_at, marker_at, render_highlights, RenderReport};
use super::resolve::resolve_highlights;
use super::segments::build_segments;
use super::store::{CreateHighlightRequest, HighlightStore, UpdateHighlightRequest};
use super::text_index::{build_text_index, range_to_offsets};
use super::types::{
    Confidence, HighlightAnchor, HighlightRecord, HighlightSegment, ResolvedHighlight, TextIndex,
    DEFAULT_HIGHLIGHT_COLOR,
};
use crate::config::{EngineOptions, TextIndexOptions};
use crate::dom::html::{inner_html, parse_fragment};
use crate::dom::{chars_to_utf16, utf16_to_chars, Document, NodeId, Range};
use crate::error::{EngineError, SelectionRejected};

/// A selection accepted for highlighting, not yet persisted
///
/// `start` and `end` are canonical offsets in UTF-16 code units, the unit
/// the host sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSelection {
    pub start: usize,
    pub end: usize,
    /// Selected text, trimmed
    pub text: String,
    /// Fingerprint of the text the offsets refer to
    pub content_hash: String,
}

impl PendingSelection {
    /// Char offsets into the canonical text the selection was captured on
    pub fn char_offsets(&self, canonical_text: &str) -> Option<(usize, usize)> {
        Some((
            utf16_to_chars(canonical_text, self.start)?,
            utf16_to_chars(canonical_text, self.end)?,
        ))
    }
}

/// What a finished selection gesture amounts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SelectionOutcome {
    /// New text was selected
    Selected(PendingSelection),
    /// The selection sits inside an existing marker: treat it as a click
    #[serde(rename_all = "camelCase")]
    Clicked { highlight_id: String },
}

/// Presentation chosen for a new highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightStyle {
    pub color: String,
    pub opacity: Option<f64>,
    pub note_text: Option<String>,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            opacity: None,
            note_text: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingFilter {
    /// Highlights placed in the content
    #[default]
    All,
    /// Highlights whose text could not be found
    Orphaned,
    /// Highlights carrying a note, placed or not
    WithNotes,
}

/// One row of a highlight listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub id: String,
    pub exact: String,
    pub color: String,
    pub note_text: Option<String>,
    pub is_orphaned: bool,
    pub confidence: Confidence,
}

impl From<&ResolvedHighlight> for ListingEntry {
    fn from(highlight: &ResolvedHighlight) -> Self {
        Self {
            id: highlight.record.id.clone(),
            exact: highlight.record.anchor.text_quote.exact.clone(),
            color: highlight.record.color.clone(),
            note_text: highlight.record.note_text.clone(),
            is_orphaned: highlight.is_orphaned,
            confidence: highlight.confidence,
        }
    }
}

pub struct HighlightSession {
    document_id: String,
    doc: Document,
    root: NodeId,
    options: EngineOptions,
    records: Vec<HighlightRecord>,
    index: TextIndex,
    resolved: Vec<ResolvedHighlight>,
    segments: Vec<HighlightSegment>,
    last_render: RenderReport,
    debouncer: SelectionDebouncer<Range>,
}

impl HighlightSession {
    /// Mount a subtree of an existing document
    pub fn new(document_id: &str, doc: Document, root: NodeId, options: EngineOptions) -> Self {
        let index = build_text_index(&doc, root, &options.index);
        let debouncer = SelectionDebouncer::new(options.selection.debounce_ms);
        let mut session = Self {
            document_id: document_id.to_string(),
            doc,
            root,
            options,
            records: Vec::new(),
            index,
            resolved: Vec::new(),
            segments: Vec::new(),
            last_render: RenderReport::default(),
            debouncer,
        };
        session.refresh();
        session
    }

    /// Mount rendered HTML
    pub fn from_html(document_id: &str, html: &str, options: EngineOptions) -> Result<Self, EngineError> {
        let doc = parse_fragment(html)?;
        let root = doc.root();
        Ok(Self::new(document_id, doc, root, options))
    }

    /// Replace the mounted content and re-run the cycle
    pub fn set_content(&mut self, html: &str) -> Result<(), EngineError> {
        self.doc = parse_fragment(html)?;
        self.root = self.doc.root();
        self.refresh();
        Ok(())
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn records(&self) -> &[HighlightRecord] {
        &self.records
    }

    /// Index of the clean content from the last refresh
    pub fn index(&self) -> &TextIndex {
        &self.index
    }

    /// Resolution results from the last refresh
    ///
    /// Their ranges point at the clean content and are stale once markers
    /// have been rendered; use them for state, not for DOM access.
    pub fn resolved(&self) -> &[ResolvedHighlight] {
        &self.resolved
    }

    pub fn resolved_highlight(&self, id: &str) -> Option<&ResolvedHighlight> {
        self.resolved.iter().find(|highlight| highlight.id() == id)
    }

    /// Canonical segments from the last refresh
    pub fn segments(&self) -> &[HighlightSegment] {
        &self.segments
    }

    pub fn last_render(&self) -> &RenderReport {
        &self.last_render
    }

    /// Serialized content, markers included
    pub fn to_html(&self) -> String {
        inner_html(&self.doc, self.root)
    }

    /// Clear, index, resolve and render
    ///
    /// A pending selection refers to nodes this replaces, so it is dropped.
    pub fn refresh(&mut self) {
        self.debouncer.cancel();
        clear_rendered_highlights(&mut self.doc, self.root);
        self.index = build_text_index(&self.doc, self.root, &self.clean_index_options());
        self.resolved = resolve_highlights(&self.doc, &self.records, &self.index, &self.options.resolve);
        self.segments = build_segments(&self.doc, &self.resolved, &self.index);
        self.last_render = render_highlights(
            &mut self.doc,
            self.root,
            &self.resolved,
            &self.index,
            &self.options.render,
        );
    }

    fn clean_index_options(&self) -> TextIndexOptions {
        TextIndexOptions {
            include_highlight_markers: false,
            ..self.options.index.clone()
        }
    }

    fn rendered_index_options(&self) -> TextIndexOptions {
        TextIndexOptions {
            include_highlight_markers: true,
            ..self.options.index.clone()
        }
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Replace the record set
    pub fn set_highlights(&mut self, records: Vec<HighlightRecord>) {
        self.records = records;
        self.refresh();
    }

    /// Fetch this document's records for a user and render them
    pub fn load_highlights(&mut self, store: &dyn HighlightStore, user_id: &str) -> Result<usize, EngineError> {
        let records = store.fetch_highlights(&self.document_id, user_id)?;
        let count = records.len();
        self.set_highlights(records);
        Ok(count)
    }

    /// Persist a highlight for an anchor and render it
    ///
    /// The content is re-rendered whether or not the store accepts it.
    pub fn create_highlight(
        &mut self,
        store: &mut dyn HighlightStore,
        anchor: HighlightAnchor,
        style: HighlightStyle,
    ) -> Result<HighlightRecord, EngineError> {
        let created = store.create_highlight(CreateHighlightRequest {
            document_id: self.document_id.clone(),
            anchor,
            color: style.color,
            opacity: style.opacity,
            note_text: style.note_text,
        });
        if let Ok(record) = &created {
            self.records.push(record.clone());
        }
        self.refresh();
        created.map_err(EngineError::from)
    }

    /// Anchor a pending selection against the clean content
    ///
    /// Markers are cleared so the DOM hint describes unrendered content; the
    /// caller is expected to refresh afterwards.
    fn anchor_for_selection(&mut self, selection: &PendingSelection) -> Result<HighlightAnchor, EngineError> {
        clear_rendered_highlights(&mut self.doc, self.root);
        let clean = build_text_index(&self.doc, self.root, &self.clean_index_options());
        if clean.content_hash != selection.content_hash {
            return Err(EngineError::StaleSelection);
        }
        let (start, end) = selection
            .char_offsets(&clean.canonical_text)
            .ok_or(SelectionRejected::Unmappable)?;
        let anchor = create_anchor_from_offsets(
            &self.doc,
            &clean,
            start,
            end,
            self.options.selection.context_length,
        )?;
        Ok(anchor)
    }

    /// Persist a highlight for a captured selection
    pub fn create_highlight_from_selection(
        &mut self,
        store: &mut dyn HighlightStore,
        selection: &PendingSelection,
        style: HighlightStyle,
    ) -> Result<HighlightRecord, EngineError> {
        match self.anchor_for_selection(selection) {
            Ok(anchor) => self.create_highlight(store, anchor, style),
            Err(err) => {
                self.refresh();
                Err(err)
            }
        }
    }

    /// Update presentation fields of a highlight
    pub fn update_highlight(
        &mut self,
        store: &mut dyn HighlightStore,
        id: &str,
        patch: UpdateHighlightRequest,
    ) -> Result<HighlightRecord, EngineError> {
        let updated = store.update_highlight(id, patch)?;
        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => *record = updated.clone(),
            None => self.records.push(updated.clone()),
        }
        self.refresh();
        Ok(updated)
    }

    pub fn delete_highlight(&mut self, store: &mut dyn HighlightStore, id: &str) -> Result<(), EngineError> {
        store.delete_highlight(id)?;
        self.records.retain(|record| record.id != id);
        self.refresh();
        Ok(())
    }

    /// Highlights for a listing, in record order
    pub fn listing(&self, filter: ListingFilter) -> Vec<ListingEntry> {
        self.resolved
            .iter()
            .filter(|highlight| match filter {
                ListingFilter::All => !highlight.is_orphaned,
                ListingFilter::Orphaned => highlight.is_orphaned,
                ListingFilter::WithNotes => highlight.record.has_note(),
            })
            .map(ListingEntry::from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Record a selection change; it is captured once the debounce window passes
    pub fn selection_changed(&mut self, range: Range, now_ms: f64) {
        self.debouncer.push(range, now_ms);
    }

    /// Capture the debounced selection if it is due
    pub fn flush_selection(&mut self, now_ms: f64) -> Option<SelectionOutcome> {
        let range = self.debouncer.poll(now_ms)?;
        self.capture_selection(&range)
    }

    /// Turn a selection on the rendered content into an outcome
    ///
    /// Unusable selections are dropped with a log line, never an error.
    pub fn capture_selection(&self, range: &Range) -> Option<SelectionOutcome> {
        let ancestor = range.common_ancestor(&self.doc);
        if !self.doc.contains(self.root, ancestor) {
            return None;
        }
        if range.is_collapsed() {
            return None;
        }
        if marker_at(&self.doc, ancestor).is_some() {
            return click_target_at(&self.doc, ancestor).map(|highlight_id| SelectionOutcome::Clicked { highlight_id });
        }

        let text = range.text(&self.doc).trim().to_string();
        if text.is_empty() {
            log::debug!("Selection ignored: {}", SelectionRejected::WhitespaceOnly);
            return None;
        }

        let rendered = build_text_index(&self.doc, self.root, &self.rendered_index_options());
        let Some((start, end)) = range_to_offsets(&self.doc, range, &rendered) else {
            log::warn!("Selection ignored: {}", SelectionRejected::Unmappable);
            return None;
        };
        if start == end {
            return None;
        }

        Some(SelectionOutcome::Selected(PendingSelection {
            start: chars_to_utf16(&rendered.canonical_text, start),
            end: chars_to_utf16(&rendered.canonical_text, end),
            text,
            content_hash: rendered.content_hash,
        }))
    }

    /// The highlight a click at `node` routes to
    pub fn click(&self, node: NodeId) -> Option<String> {
        click_target_at(&self.doc, node)
    }
}
