//! Data model for highlights
//!
//! `HighlightAnchor` is the only shape this crate owns on the wire: it is
//! embedded in persisted records, so its JSON form (camelCase keys, selector
//! `type` tags, omitted optionals) must stay stable.

use serde::{Deserialize, Serialize};

use crate::dom::{chars_to_utf16, NodeId, Range};

/// Default record color when none was stored
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFEB3B";

/// Default opacity for records without one
pub const DEFAULT_OPACITY: f64 = 0.3;

/// Palette offered to users when creating a highlight (lighter tints keep text readable)
pub const DEFAULT_PALETTE: &[(&str, &str)] = &[
    ("Yellow", "#FFF9C4"),
    ("Orange", "#FFE0B2"),
    ("Green", "#C8E6C9"),
    ("Blue", "#BBDEFB"),
    ("Purple", "#E1BEE7"),
    ("Red", "#FFCDD2"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSelectorType {
    #[default]
    TextPositionSelector,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSelectorType {
    #[default]
    TextQuoteSelector,
}

/// Start/end offsets in canonical text, in UTF-16 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPositionSelector {
    #[serde(rename = "type", default)]
    pub kind: PositionSelectorType,
    pub start: usize,
    pub end: usize,
}

impl TextPositionSelector {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            kind: PositionSelectorType::TextPositionSelector,
            start,
            end,
        }
    }
}

/// Exact text plus surrounding context
///
/// `exact` is the ground truth for re-finding a passage. A missing `exact`
/// deserializes as empty, which the resolver treats as an orphan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuoteSelector {
    #[serde(rename = "type", default)]
    pub kind: QuoteSelectorType,
    #[serde(default)]
    pub exact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl TextQuoteSelector {
    pub fn new(exact: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            kind: QuoteSelectorType::TextQuoteSelector,
            exact: exact.to_string(),
            prefix: Some(prefix.to_string()),
            suffix: Some(suffix.to_string()),
        }
    }
}

/// Best-effort structural location, relative to the indexed root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_path: Option<String>,
    /// UTF-16 offsets into the start and end text nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_node_offset: Option<usize>,
}

/// Portable description of where a highlight is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightAnchor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_position: Option<TextPositionSelector>,
    #[serde(default)]
    pub text_quote: TextQuoteSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_hint: Option<DomHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash_at_create: Option<String>,
}

impl HighlightAnchor {
    /// Anchor carrying only a quote, as synthesized for legacy notes
    pub fn from_quote(exact: &str) -> Self {
        Self {
            text_position: None,
            text_quote: TextQuoteSelector::new(exact, "", ""),
            dom_hint: None,
            content_hash_at_create: None,
        }
    }
}

/// A stored highlight, owned by the persistence service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRecord {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub anchor: HighlightAnchor,
    /// Hex color code
    pub color: String,
    /// Alpha in `0..=1`; `None` falls back to the render base opacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,

    // Legacy fields kept so older clients can still read converted notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl HighlightRecord {
    pub fn has_note(&self) -> bool {
        self.note_text
            .as_deref()
            .map(|note| !note.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Coarse quality label of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

/// A record matched (or not) against the live content
///
/// Ephemeral: recomputed on every index or highlight-set change.
#[derive(Debug, Clone)]
pub struct ResolvedHighlight {
    pub record: HighlightRecord,
    pub range: Option<Range>,
    pub is_orphaned: bool,
    pub confidence: Confidence,
}

impl ResolvedHighlight {
    pub fn resolved(record: HighlightRecord, range: Range, confidence: Confidence) -> Self {
        Self {
            record,
            range: Some(range),
            is_orphaned: false,
            confidence,
        }
    }

    pub fn orphaned(record: HighlightRecord) -> Self {
        Self {
            record,
            range: None,
            is_orphaned: true,
            confidence: Confidence::Low,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Maximal canonical interval covered by one identical set of highlights
///
/// Offsets count chars; [`HighlightSegment::to_utf16`] converts them for
/// the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSegment {
    pub start: usize,
    pub end: usize,
    pub highlight_ids: Vec<String>,
    pub colors: Vec<String>,
}

impl HighlightSegment {
    pub fn to_utf16(&self, canonical_text: &str) -> Self {
        Self {
            start: chars_to_utf16(canonical_text, self.start),
            end: chars_to_utf16(canonical_text, self.end),
            ..self.clone()
        }
    }
}

/// A text node's slice of the canonical text
///
/// Non-owning: the mapping is invalid once the renderer replaces `node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNodeMapping {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    /// Raw (pre-normalization) char offset of each canonical char, plus the
    /// raw length as a final entry. `None` when normalization kept a 1:1
    /// correspondence.
    pub raw_offsets: Option<Vec<usize>>,
}

impl TextNodeMapping {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Raw node offset of a node-relative canonical offset
    pub fn raw_offset(&self, canonical: usize) -> usize {
        match &self.raw_offsets {
            Some(offsets) => offsets
                .get(canonical)
                .or_else(|| offsets.last())
                .copied()
                .unwrap_or(canonical),
            None => canonical,
        }
    }

    /// Node-relative canonical offset of a raw node offset
    ///
    /// A raw offset that falls inside a collapsed run (e.g. between CR and
    /// LF) snaps back to the start of that run.
    pub fn canonical_offset(&self, raw: usize) -> usize {
        match &self.raw_offsets {
            Some(offsets) => {
                let below = offsets[..self.len()].partition_point(|start| *start <= raw);
                if raw >= offsets.last().copied().unwrap_or(0) {
                    self.len()
                } else {
                    below.saturating_sub(1)
                }
            }
            None => raw.min(self.len()),
        }
    }
}

/// Canonical text projection of a subtree
#[derive(Debug, Clone)]
pub struct TextIndex {
    pub canonical_text: String,
    pub mappings: Vec<TextNodeMapping>,
    pub content_hash: String,
    /// Length of `canonical_text` in chars
    pub char_len: usize,
    /// Subtree the index was built from
    pub root: NodeId,
    /// Roots of skipped subtrees (excluded elements, rendered markers)
    pub skipped: Vec<NodeId>,
}

impl TextIndex {
    /// Mapping owning a text node, if it was indexed
    pub fn mapping_for(&self, node: NodeId) -> Option<&TextNodeMapping> {
        self.mappings.iter().find(|mapping| mapping.node == node)
    }

    pub fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    /// Canonical substring by char offsets
    pub fn slice(&self, start: usize, end: usize) -> &str {
        crate::dom::slice_chars(&self.canonical_text, start, end)
    }
}
