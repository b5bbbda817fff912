//! Values exchanged with JavaScript

use serde::{Deserialize, Serialize};

use crate::dom::path::node_at_path;
use crate::dom::{utf16_to_chars, BoundaryPoint, Document, NodeId, Range};
use crate::error::{DomError, EngineError};
use crate::highlights::session::HighlightSession;

/// A browser selection, expressed as child-index paths from the content root
///
/// The host computes each path by walking from the boundary container up to
/// the root element, recording `indexOf(node)` among `childNodes`. Offsets
/// are as the browser reports them: UTF-16 units in a text node, child
/// indexes in an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSelection {
    pub start_path: Vec<usize>,
    pub start_offset: usize,
    pub end_path: Vec<usize>,
    pub end_offset: usize,
}

impl DomSelection {
    /// Resolve both paths against the mirrored content
    ///
    /// The range is built as reported; a backward selection stays backward.
    pub fn to_range(&self, doc: &Document, root: NodeId) -> Result<Range, EngineError> {
        let start = node_at_path(doc, root, &self.start_path)
            .ok_or_else(|| EngineError::InvalidPath(format!("{:?}", self.start_path)))?;
        let end = node_at_path(doc, root, &self.end_path)
            .ok_or_else(|| EngineError::InvalidPath(format!("{:?}", self.end_path)))?;
        Ok(Range::new(
            doc,
            BoundaryPoint::new(start, dom_offset(doc, start, self.start_offset)?),
            BoundaryPoint::new(end, dom_offset(doc, end, self.end_offset)?),
        )?)
    }
}

/// Tree offset of a browser offset into `node`
fn dom_offset(doc: &Document, node: NodeId, offset: usize) -> Result<usize, DomError> {
    match doc.text(node) {
        Some(text) => utf16_to_chars(text, offset).ok_or(DomError::IndexSize {
            offset,
            length: text.encode_utf16().count(),
        }),
        None => Ok(offset),
    }
}

/// State of the mirror after a pass, for the host to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    /// Content with markers, ready for `innerHTML`
    pub html: String,
    pub markers: usize,
    pub skipped_nodes: usize,
    pub resolved: usize,
    pub orphaned: usize,
}

impl From<&HighlightSession> for RenderSummary {
    fn from(session: &HighlightSession) -> Self {
        let orphaned = session.resolved().iter().filter(|h| h.is_orphaned).count();
        Self {
            html: session.to_html(),
            markers: session.last_render().markers,
            skipped_nodes: session.last_render().skipped_nodes,
            resolved: session.resolved().len() - orphaned,
            orphaned,
        }
    }
}
