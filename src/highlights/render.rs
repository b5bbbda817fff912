//! Segment rendering
//!
//! Wraps highlighted text in marker spans and takes them out again.
//! `render_highlights` always starts from a cleared tree, so a full
//! clear + render pass is the only way markers change.
//!
//! Markers carry:
//! - `data-hl` / `data-hl-ids`: comma-separated covering highlight ids
//! - `data-hl-count`: number of covering highlights
//! - `data-hl-target`: the id a click on the marker routes to

use std::collections::HashMap;

use super::color::segment_background;
use super::segments::{segment_spans, Cover, CoverSpan, Segment};
use super::text_index::text_nodes_in_range;
use super::types::{ResolvedHighlight, TextIndex};
use crate::config::RenderOptions;
use crate::dom::{slice_chars, Document, NodeId};
use crate::error::DomError;

/// Attribute owned by the renderer; every marker has it
pub const MARKER_ATTR: &str = "data-hl";
pub const MARKER_IDS_ATTR: &str = "data-hl-ids";
pub const MARKER_COUNT_ATTR: &str = "data-hl-count";
pub const MARKER_TARGET_ATTR: &str = "data-hl-target";

const MARKER_DECORATION: &str = "padding: 2px 0; cursor: pointer; border-radius: 2px";

/// Outcome of a render pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Marker spans inserted
    pub markers: usize,
    /// Text nodes that were detached before they could be wrapped
    pub skipped_nodes: usize,
}

/// Every marker element under `root`, in document order
pub fn find_markers(doc: &Document, root: NodeId) -> Vec<NodeId> {
    doc.descendants(root)
        .into_iter()
        .filter(|node| doc.has_attr(*node, MARKER_ATTR))
        .collect()
}

/// Replace every marker with a plain text node and re-normalize
///
/// Idempotent. Returns the number of markers removed.
pub fn clear_rendered_highlights(doc: &mut Document, root: NodeId) -> usize {
    let mut cleared = 0;
    // Reverse document order clears nested markers before their ancestors.
    for marker in find_markers(doc, root).into_iter().rev() {
        if !doc.contains(root, marker) {
            continue;
        }
        let Some(parent) = doc.parent(marker) else {
            continue;
        };
        let text = doc.text_content(marker);
        let replacement = doc.create_text(&text);
        match doc.replace_with(marker, &[replacement]) {
            Ok(()) => {
                doc.normalize(parent);
                cleared += 1;
            }
            Err(err) => log::warn!("Could not clear marker {:?}: {}", marker, err),
        }
    }
    if cleared > 0 {
        log::debug!("Cleared {} highlight markers", cleared);
    }
    cleared
}

/// Wrap every resolved highlight's text in marker spans
///
/// Orphaned highlights are skipped. Overlaps are split into segments per
/// text node. Text nodes are mutated in reverse document order, and any node
/// that is no longer attached under `root` is skipped rather than failing
/// the pass.
pub fn render_highlights(
    doc: &mut Document,
    root: NodeId,
    resolved: &[ResolvedHighlight],
    index: &TextIndex,
    options: &RenderOptions,
) -> RenderReport {
    clear_rendered_highlights(doc, root);

    let mut per_node: HashMap<NodeId, Vec<CoverSpan>> = HashMap::new();
    for highlight in resolved.iter().filter(|h| !h.is_orphaned) {
        let Some(range) = highlight.range.as_ref() else {
            continue;
        };
        for (node, start, end) in text_nodes_in_range(doc, range, index) {
            if inside_marker(doc, root, node) {
                continue;
            }
            per_node.entry(node).or_default().push(CoverSpan {
                start,
                end,
                cover: Cover {
                    id: highlight.record.id.clone(),
                    color: highlight.record.color.clone(),
                    opacity: highlight.record.opacity,
                },
            });
        }
    }

    let mut nodes: Vec<NodeId> = per_node.keys().copied().collect();
    nodes.sort_by(|a, b| doc.compare_nodes(*a, *b));

    let mut report = RenderReport::default();
    for node in nodes.into_iter().rev() {
        let segments = segment_spans(&per_node[&node]);
        if segments.is_empty() {
            continue;
        }
        // Re-validate right before mutating; earlier references may be stale.
        if !doc.contains(root, node) || doc.parent(node).is_none() {
            log::warn!("Skipping detached text node {:?} during render", node);
            report.skipped_nodes += 1;
            continue;
        }
        match wrap_text_node(doc, node, &segments, options) {
            Ok(count) => report.markers += count,
            Err(err) => {
                log::warn!("Could not wrap text node {:?}: {}", node, err);
                report.skipped_nodes += 1;
            }
        }
    }

    log::debug!(
        "Rendered {} markers ({} nodes skipped)",
        report.markers,
        report.skipped_nodes
    );
    report
}

fn inside_marker(doc: &Document, root: NodeId, node: NodeId) -> bool {
    doc.ancestors(node)
        .into_iter()
        .take_while(|ancestor| *ancestor != root)
        .any(|ancestor| doc.has_attr(ancestor, MARKER_ATTR))
}

/// Replace a text node with `(text, marker, text, ...)` per segment
fn wrap_text_node(
    doc: &mut Document,
    node: NodeId,
    segments: &[Segment],
    options: &RenderOptions,
) -> Result<usize, DomError> {
    let text = doc.text(node).ok_or(DomError::NotAText(node))?.to_string();
    let length = text.chars().count();

    let mut replacement = Vec::with_capacity(segments.len() * 2 + 1);
    let mut last = 0;
    for segment in segments {
        if segment.end > length {
            return Err(DomError::IndexSize {
                offset: segment.end,
                length,
            });
        }
        if segment.start > last {
            replacement.push(doc.create_text(slice_chars(&text, last, segment.start)));
        }
        let marker = create_marker(doc, segment, options);
        let inner = doc.create_text(slice_chars(&text, segment.start, segment.end));
        doc.append_child(marker, inner)?;
        replacement.push(marker);
        last = segment.end;
    }
    if last < length {
        replacement.push(doc.create_text(slice_chars(&text, last, length)));
    }

    doc.replace_with(node, &replacement)?;
    Ok(segments.len())
}

fn create_marker(doc: &mut Document, segment: &Segment, options: &RenderOptions) -> NodeId {
    let ids = segment.ids().join(",");
    let target = segment.covers.first().map(|cover| cover.id.clone()).unwrap_or_default();
    let style = format!(
        "{}; {}",
        segment_background(&segment.covers, options.base_opacity, options.use_gradient),
        MARKER_DECORATION
    );

    doc.create_element_with_attrs(
        "span",
        vec![
            ("class".to_string(), format!("{}-segment", options.class_prefix)),
            (MARKER_ATTR.to_string(), ids.clone()),
            (MARKER_IDS_ATTR.to_string(), ids),
            (MARKER_COUNT_ATTR.to_string(), segment.covers.len().to_string()),
            (MARKER_TARGET_ATTR.to_string(), target),
            ("style".to_string(), style),
        ],
    )
}

/// Nearest marker at or above `node`
pub fn marker_at(doc: &Document, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .find(|candidate| doc.has_attr(*candidate, MARKER_ATTR))
}

/// Highlight ids covering the text at `node` (empty outside markers)
pub fn highlight_ids_at(doc: &Document, node: NodeId) -> Vec<String> {
    marker_at(doc, node)
        .and_then(|marker| doc.attr(marker, MARKER_IDS_ATTR).or_else(|| doc.attr(marker, MARKER_ATTR)))
        .map(|ids| {
            ids.split(',')
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The highlight a click at `node` routes to
pub fn click_target_at(doc: &Document, node: NodeId) -> Option<String> {
    let marker = marker_at(doc, node)?;
    doc.attr(marker, MARKER_TARGET_ATTR)
        .map(str::to_string)
        .or_else(|| highlight_ids_at(doc, marker).into_iter().next())
}

/// Markers that display a given highlight
pub fn marker_for_highlight(doc: &Document, root: NodeId, id: &str) -> Vec<NodeId> {
    find_markers(doc, root)
        .into_iter()
        .filter(|marker| highlight_ids_at(doc, *marker).iter().any(|marker_id| marker_id == id))
        .collect()
}
