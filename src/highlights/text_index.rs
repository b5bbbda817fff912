//! Text indexing
//!
//! Projects a DOM subtree onto one canonical string and keeps enough
//! bookkeeping to convert between canonical offsets and live boundary
//! points in both directions.
//!
//! Normalization maps NBSP to a space and CRLF/CR to LF (and optionally
//! collapses whitespace runs). Since this can change a node's length, each
//! mapping carries an exact raw-offset table whenever the lengths differ, so
//! conversions are exact rather than proportional.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::render::MARKER_ATTR;
use super::types::{TextIndex, TextNodeMapping, TextQuoteSelector};
use crate::config::TextIndexOptions;
use crate::dom::{BoundaryPoint, Document, NodeData, NodeId, Range};

/// Attribute that removes a subtree from indexing
pub const EXCLUDE_ATTR: &str = "data-highlight-exclude";

/// Elements whose text is never part of the readable content
static EXCLUDED_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["script", "style", "noscript", "meta", "link", "head"]
        .into_iter()
        .collect()
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// 32-bit rolling hash over UTF-16 code units, rendered in base 36
///
/// Bit-compatible with the fingerprint the web client has been storing, so
/// anchors saved there still take the fingerprint fast path.
pub fn content_hash(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Normalize a string the way the indexer normalizes text node data
pub fn normalize_text(text: &str, options: &TextIndexOptions) -> String {
    let normalized = text
        .replace('\u{00A0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    if options.normalize_whitespace {
        WHITESPACE_RUN.replace_all(&normalized, " ").into_owned()
    } else {
        normalized
    }
}

/// Normalize raw node text, returning the raw offset table when the
/// canonical text is not a 1:1 image of the raw text
fn normalize_with_offsets(raw: &str, collapse_whitespace: bool) -> (String, Option<Vec<usize>>) {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(chars.len() + 1);

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        offsets.push(i);
        if collapse_whitespace && c.is_whitespace() {
            out.push(' ');
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            continue;
        }
        match c {
            '\r' => {
                out.push('\n');
                i += if chars.get(i + 1) == Some(&'\n') { 2 } else { 1 };
            }
            '\u{00A0}' => {
                out.push(' ');
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    offsets.push(chars.len());

    let one_to_one = offsets.len() == chars.len() + 1;
    (out, (!one_to_one).then_some(offsets))
}

/// Whether an element's subtree is left out of the index
fn is_skipped(doc: &Document, element: NodeId, options: &TextIndexOptions) -> bool {
    let Some(data) = doc.element(element) else {
        return false;
    };
    if !options.include_highlight_markers && data.attr(MARKER_ATTR).is_some() {
        return true;
    }
    if !options.exclude_elements {
        return false;
    }
    EXCLUDED_TAGS.contains(data.tag.as_str())
        || data.attr(EXCLUDE_ATTR).map(|value| value != "false").unwrap_or(false)
}

/// Build the canonical text index of a subtree
///
/// Text nodes are visited in document order. Text that normalizes to
/// nothing gets no mapping, so mappings never have zero width.
pub fn build_text_index(doc: &Document, root: NodeId, options: &TextIndexOptions) -> TextIndex {
    let mut canonical_text = String::new();
    let mut mappings = Vec::new();
    let mut skipped = Vec::new();
    let mut char_len = 0;

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match doc.data(node) {
            NodeData::Text(raw) => {
                let (normalized, raw_offsets) =
                    normalize_with_offsets(raw, options.normalize_whitespace);
                let len = normalized.chars().count();
                if len == 0 {
                    continue;
                }
                mappings.push(TextNodeMapping {
                    node,
                    start: char_len,
                    end: char_len + len,
                    raw_offsets,
                });
                canonical_text.push_str(&normalized);
                char_len += len;
            }
            NodeData::Element(_) if node != root && is_skipped(doc, node, options) => {
                skipped.push(node);
            }
            NodeData::Element(_) | NodeData::Document => {
                stack.extend(doc.children(node).iter().rev().copied());
            }
            NodeData::Comment(_) => {}
        }
    }

    let content_hash = content_hash(&canonical_text);
    log::debug!(
        "Built text index: {} chars across {} text nodes (hash {})",
        char_len,
        mappings.len(),
        content_hash
    );

    TextIndex {
        canonical_text,
        mappings,
        content_hash,
        char_len,
        root,
        skipped,
    }
}

/// Canonical offset of a single boundary point
fn point_to_offset(doc: &Document, point: BoundaryPoint, index: &TextIndex) -> Option<usize> {
    if !doc.contains(index.root, point.node) {
        return None;
    }
    if index.skipped.iter().any(|skipped| doc.contains(*skipped, point.node)) {
        return None;
    }

    if let Some(mapping) = index.mapping_for(point.node) {
        return Some(mapping.start + mapping.canonical_offset(point.offset));
    }
    if doc.is_text(point.node) && doc.node_length(point.node) > 0 {
        return None;
    }

    // A point between nodes maps to the start of the next indexed text node.
    let next = index.mappings.partition_point(|mapping| {
        doc.compare_points(BoundaryPoint::new(mapping.node, 0), point) == std::cmp::Ordering::Less
    });
    Some(
        index
            .mappings
            .get(next)
            .map(|mapping| mapping.start)
            .unwrap_or(index.char_len),
    )
}

/// Convert a range to canonical `(start, end)` offsets, with `start <= end`
///
/// Returns `None` when either boundary lies outside the indexed root or
/// inside a skipped subtree.
pub fn range_to_offsets(doc: &Document, range: &Range, index: &TextIndex) -> Option<(usize, usize)> {
    let start = point_to_offset(doc, range.start, index)?;
    let end = point_to_offset(doc, range.end, index)?;
    Some(if start <= end { (start, end) } else { (end, start) })
}

/// Convert canonical offsets back into a live range
///
/// A boundary on the seam between two text nodes starts in the later node
/// and ends in the earlier one, so the range never covers an empty edge.
pub fn offsets_to_range(doc: &Document, start: usize, end: usize, index: &TextIndex) -> Option<Range> {
    if start > end || end > index.char_len {
        return None;
    }
    if index.mappings.is_empty() {
        return Some(Range::collapsed_at(BoundaryPoint::new(index.root, 0)));
    }

    let start_point = {
        let position = index.mappings.partition_point(|mapping| mapping.end <= start);
        let mapping = index.mappings.get(position).or_else(|| index.mappings.last())?;
        BoundaryPoint::new(mapping.node, mapping.raw_offset(start.saturating_sub(mapping.start)))
    };
    let end_point = if start == end {
        start_point
    } else {
        let position = index.mappings.partition_point(|mapping| mapping.end < end);
        let mapping = index.mappings.get(position)?;
        BoundaryPoint::new(mapping.node, mapping.raw_offset(end - mapping.start))
    };

    for point in [start_point, end_point] {
        if !doc.contains(index.root, point.node) {
            log::warn!("Index mapping for {:?} is stale", point.node);
            return None;
        }
    }
    Range::new(doc, start_point, end_point).ok()
}

/// Exact text plus up to `context_length` chars of context on each side
pub fn extract_text_quote(
    canonical_text: &str,
    start: usize,
    end: usize,
    context_length: usize,
) -> TextQuoteSelector {
    let chars: Vec<char> = canonical_text.chars().collect();
    let end = end.min(chars.len());
    let start = start.min(end);

    let prefix_start = start.saturating_sub(context_length);
    let suffix_end = (end + context_length).min(chars.len());

    let collect = |from: usize, to: usize| chars[from..to].iter().collect::<String>();
    TextQuoteSelector::new(
        &collect(start, end),
        &collect(prefix_start, start),
        &collect(end, suffix_end),
    )
}

/// Indexed text nodes that intersect a range, with their node-local
/// `[start, end)` raw offsets, in document order
pub fn text_nodes_in_range(
    doc: &Document,
    range: &Range,
    index: &TextIndex,
) -> Vec<(NodeId, usize, usize)> {
    range
        .text_nodes(doc)
        .into_iter()
        .filter(|node| index.mapping_for(*node).is_some())
        .filter_map(|node| {
            range
                .node_intersection(doc, node)
                .map(|(start, end)| (node, start, end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_fragment;

    fn index_of(html: &str) -> (Document, TextIndex) {
        let doc = parse_fragment(html).unwrap();
        let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        (doc, index)
    }

    #[test]
    fn test_content_hash_matches_js_fingerprint() {
        assert_eq!(content_hash(""), "0");
        // "a" is code unit 97
        assert_eq!(content_hash("a"), "2p");
        // 31 * 97 + 98 = 3105
        assert_eq!(content_hash("ab"), "2e9");
    }

    #[test]
    fn test_content_hash_handles_overflow_and_astral_chars() {
        let long = "The quick brown fox jumps over the lazy dog".repeat(10);
        let hash = content_hash(&long);
        assert!(!hash.is_empty());
        assert!(hash.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(content_hash("😀"), content_hash("😁"));
    }

    #[test]
    fn test_normalization_agrees_with_offset_table() {
        for collapse in [false, true] {
            let options = TextIndexOptions {
                normalize_whitespace: collapse,
                ..TextIndexOptions::default()
            };
            for raw in ["a\u{00A0}b", "x\r\ny\rz", " lead  \r\n\t trail ", "plain"] {
                let (normalized, _) = normalize_with_offsets(raw, collapse);
                assert_eq!(normalized, normalize_text(raw, &options), "raw {:?}", raw);
            }
        }
    }

    #[test]
    fn test_offset_table_only_when_lengths_differ() {
        assert_eq!(normalize_with_offsets("a\u{00A0}b", false).1, None);
        assert_eq!(
            normalize_with_offsets("a\r\nb", false).1,
            Some(vec![0, 1, 3, 4])
        );
    }

    #[test]
    fn test_index_skips_excluded_and_marker_subtrees() {
        let (_, index) = index_of(
            "<p>One <script>var x;</script><span data-highlight-exclude>hidden</span>two \
             <span data-hl=\"\">marked</span></p>",
        );
        assert_eq!(index.canonical_text, "One two ");
        assert_eq!(index.skipped.len(), 3);
    }

    #[test]
    fn test_exclude_false_attribute_is_indexed() {
        let (_, index) = index_of("<p data-highlight-exclude=\"false\">kept</p>");
        assert_eq!(index.canonical_text, "kept");
    }

    #[test]
    fn test_mappings_are_contiguous() {
        let (_, index) = index_of("<p>First</p><p>Second<em>Third</em></p>");
        assert_eq!(index.canonical_text, "FirstSecondThird");
        let mut expected_start = 0;
        for mapping in &index.mappings {
            assert_eq!(mapping.start, expected_start);
            assert!(mapping.end > mapping.start);
            expected_start = mapping.end;
        }
        assert_eq!(expected_start, index.char_len);
    }

    #[test]
    fn test_offsets_to_range_crosses_nodes() {
        let (doc, index) = index_of("<p>First</p><p>Second</p>");
        let range = offsets_to_range(&doc, 2, 8, &index).unwrap();
        assert_eq!(range.text(&doc), "rstSec");
        assert_eq!(range_to_offsets(&doc, &range, &index), Some((2, 8)));
    }

    #[test]
    fn test_offsets_to_range_rejects_invalid_input() {
        let (doc, index) = index_of("<p>Hello</p>");
        assert!(offsets_to_range(&doc, 3, 2, &index).is_none());
        assert!(offsets_to_range(&doc, 0, 6, &index).is_none());
    }

    #[test]
    fn test_seam_boundaries() {
        let (doc, index) = index_of("<p>First</p><p>Second</p>");
        let range = offsets_to_range(&doc, 5, 5, &index).unwrap();
        assert!(range.is_collapsed());
        let first_only = offsets_to_range(&doc, 0, 5, &index).unwrap();
        assert_eq!(first_only.end.node, index.mappings[0].node);
        assert_eq!(first_only.text(&doc), "First");
    }

    #[test]
    fn test_element_boundaries_map_to_neighbouring_text() {
        let (doc, index) = index_of("<div><p>First</p><p>Second</p></div>");
        let div = doc.children(doc.root())[0];
        let range = Range::new(&doc, BoundaryPoint::new(div, 1), BoundaryPoint::new(div, 2)).unwrap();
        assert_eq!(range_to_offsets(&doc, &range, &index), Some((5, 11)));
    }

    #[test]
    fn test_boundary_inside_excluded_region_is_unmappable() {
        let (doc, index) = index_of("<p>text<script>code</script></p>");
        let script = doc.children(doc.children(doc.root())[0])[1];
        let code = doc.children(script)[0];
        let range = Range::new(&doc, BoundaryPoint::new(code, 0), BoundaryPoint::new(code, 2)).unwrap();
        assert_eq!(range_to_offsets(&doc, &range, &index), None);
    }

    #[test]
    fn test_crlf_round_trip_is_exact() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text("ab\r\ncd");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, text).unwrap();
        let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        assert_eq!(index.canonical_text, "ab\ncd");

        let range = offsets_to_range(&doc, 3, 5, &index).unwrap();
        assert_eq!(range.start.offset, 4);
        assert_eq!(range.text(&doc), "cd");
        assert_eq!(range_to_offsets(&doc, &range, &index), Some((3, 5)));
    }

    #[test]
    fn test_extract_text_quote_clips_context() {
        let quote = extract_text_quote("Hello world", 0, 5, 32);
        assert_eq!(quote.exact, "Hello");
        assert_eq!(quote.prefix.as_deref(), Some(""));
        assert_eq!(quote.suffix.as_deref(), Some(" world"));

        let quote = extract_text_quote("abcdefghij", 4, 6, 2);
        assert_eq!(quote.prefix.as_deref(), Some("cd"));
        assert_eq!(quote.suffix.as_deref(), Some("gh"));
    }

    #[test]
    fn test_index_is_deterministic() {
        let (doc, first) = index_of("<p>Same <b>text</b> twice</p>");
        let second = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        assert_eq!(first.canonical_text, second.canonical_text);
        assert_eq!(first.content_hash, second.content_hash);
    }
}
