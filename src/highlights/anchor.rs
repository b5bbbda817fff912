//! Selection capture
//!
//! Turns a user selection into a [`HighlightAnchor`]: canonical position,
//! quote with context, a DOM hint and the fingerprint of the text it was
//! captured against.

use super::text_index::{extract_text_quote, offsets_to_range, range_to_offsets};
use super::types::{DomHint, HighlightAnchor, TextIndex, TextPositionSelector};
use crate::dom::path::{css_path_of, xpath_of};
use crate::dom::{chars_to_utf16, BoundaryPoint, Document, Range};
use crate::error::SelectionRejected;

/// Build an anchor from a live selection range
pub fn create_anchor(
    doc: &Document,
    index: &TextIndex,
    range: &Range,
    context_length: usize,
) -> Result<HighlightAnchor, SelectionRejected> {
    if range.is_collapsed() {
        return Err(SelectionRejected::Collapsed);
    }
    let (start, end) = range_to_offsets(doc, range, index).ok_or(SelectionRejected::Unmappable)?;
    create_anchor_from_offsets(doc, index, start, end, context_length)
}

/// Build an anchor from canonical offsets
pub fn create_anchor_from_offsets(
    doc: &Document,
    index: &TextIndex,
    start: usize,
    end: usize,
    context_length: usize,
) -> Result<HighlightAnchor, SelectionRejected> {
    if start >= end {
        return Err(SelectionRejected::Collapsed);
    }
    if end > index.char_len {
        return Err(SelectionRejected::Unmappable);
    }
    if index.slice(start, end).trim().is_empty() {
        return Err(SelectionRejected::WhitespaceOnly);
    }

    let text_quote = extract_text_quote(&index.canonical_text, start, end, context_length);
    let dom_hint = dom_hint_for(doc, index, start, end);

    let canonical = &index.canonical_text;
    Ok(HighlightAnchor {
        text_position: Some(TextPositionSelector::new(
            chars_to_utf16(canonical, start),
            chars_to_utf16(canonical, end),
        )),
        text_quote,
        dom_hint,
        content_hash_at_create: Some(index.content_hash.clone()),
    })
}

/// UTF-16 offset of a boundary inside its text node
fn node_offset_utf16(doc: &Document, point: BoundaryPoint) -> usize {
    doc.text(point.node)
        .map(|text| chars_to_utf16(text, point.offset))
        .unwrap_or(point.offset)
}

/// Location of the span's first text node, relative to the indexed root
fn dom_hint_for(doc: &Document, index: &TextIndex, start: usize, end: usize) -> Option<DomHint> {
    let range = offsets_to_range(doc, start, end, index)?;
    let xpath = xpath_of(doc, index.root, range.start.node);
    let css_path = css_path_of(doc, index.root, range.start.node);
    if xpath.is_none() && css_path.is_none() {
        return None;
    }
    Some(DomHint {
        xpath,
        css_path,
        start_node_offset: Some(node_offset_utf16(doc, range.start)),
        end_node_offset: Some(node_offset_utf16(doc, range.end)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextIndexOptions;
    use crate::dom::html::parse_fragment;
    use crate::highlights::text_index::build_text_index;

    #[test]
    fn test_anchor_captures_position_quote_and_hint() {
        let doc = parse_fragment("<p>Hello world</p><p>Second paragraph</p>").unwrap();
        let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        let anchor = create_anchor_from_offsets(&doc, &index, 11, 17, 4).unwrap();

        assert_eq!(anchor.text_position, Some(TextPositionSelector::new(11, 17)));
        assert_eq!(anchor.text_quote.exact, "Second");
        assert_eq!(anchor.text_quote.prefix.as_deref(), Some("orld"));
        assert_eq!(anchor.text_quote.suffix.as_deref(), Some(" par"));
        assert_eq!(anchor.content_hash_at_create.as_deref(), Some(index.content_hash.as_str()));

        let hint = anchor.dom_hint.unwrap();
        assert_eq!(hint.xpath.as_deref(), Some("/p[2]/text()[1]"));
        assert_eq!(hint.css_path.as_deref(), Some("p:nth-of-type(2)"));
        assert_eq!(hint.start_node_offset, Some(0));
        assert_eq!(hint.end_node_offset, Some(6));
    }

    #[test]
    fn test_anchor_offsets_count_utf16_units() {
        let doc = parse_fragment("<p>\u{1F600} Hello world again</p>").unwrap();
        let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        // chars 8..13 are "world"; the emoji is two UTF-16 units
        let anchor = create_anchor_from_offsets(&doc, &index, 8, 13, 32).unwrap();

        assert_eq!(anchor.text_quote.exact, "world");
        assert_eq!(anchor.text_position, Some(TextPositionSelector::new(9, 14)));
        let hint = anchor.dom_hint.unwrap();
        assert_eq!(hint.start_node_offset, Some(9));
        assert_eq!(hint.end_node_offset, Some(14));
    }

    #[test]
    fn test_whitespace_and_collapsed_selections_are_rejected() {
        let doc = parse_fragment("<p>a   b</p>").unwrap();
        let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
        assert_eq!(
            create_anchor_from_offsets(&doc, &index, 1, 4, 32),
            Err(SelectionRejected::WhitespaceOnly)
        );
        assert_eq!(
            create_anchor_from_offsets(&doc, &index, 2, 2, 32),
            Err(SelectionRejected::Collapsed)
        );
    }

    #[test]
    fn test_selection_outside_root_is_unmappable() {
        let doc = parse_fragment("<div><p>inside</p></div><p>outside</p>").unwrap();
        let div = doc.children(doc.root())[0];
        let index = build_text_index(&doc, div, &TextIndexOptions::default());
        let outside = doc.children(doc.children(doc.root())[1])[0];
        let range = Range::new(&doc, BoundaryPoint::new(outside, 0), BoundaryPoint::new(outside, 3)).unwrap();
        assert_eq!(
            create_anchor(&doc, &index, &range, 32),
            Err(SelectionRejected::Unmappable)
        );
    }
}
