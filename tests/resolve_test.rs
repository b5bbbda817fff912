// Anchor capture and staged resolution against re-rendered content

use highlight_wasm::config::{ResolveOptions, TextIndexOptions, DEFAULT_CONTEXT_LENGTH};
use highlight_wasm::dom::html::parse_fragment;
use highlight_wasm::dom::Document;
use highlight_wasm::highlights::anchor::create_anchor_from_offsets;
use highlight_wasm::highlights::resolve::{resolve_highlight, resolve_highlights};
use highlight_wasm::highlights::text_index::{build_text_index, range_to_offsets};
use highlight_wasm::{Confidence, HighlightAnchor, HighlightRecord, TextIndex, TextPositionSelector, TextQuoteSelector};

fn record(id: &str, anchor: HighlightAnchor) -> HighlightRecord {
    HighlightRecord {
        id: id.to_string(),
        document_id: "lesson-1".to_string(),
        user_id: "student-1".to_string(),
        anchor,
        color: "#FFEB3B".to_string(),
        opacity: None,
        note_text: None,
        created_at: String::new(),
        updated_at: String::new(),
        highlighted_text: None,
        highlight_color: None,
        context: None,
    }
}

fn indexed(html: &str) -> (Document, TextIndex) {
    let doc = parse_fragment(html).unwrap();
    let index = build_text_index(&doc, doc.root(), &TextIndexOptions::default());
    (doc, index)
}

#[test]
fn test_quote_at_start_of_text_resolves_with_high_confidence() {
    let (doc, index) = indexed("<p>Hello world</p>");
    let anchor = HighlightAnchor {
        text_quote: TextQuoteSelector::new("Hello", "", " "),
        ..HighlightAnchor::default()
    };

    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert!(!resolved.is_orphaned);
    assert_eq!(resolved.confidence, Confidence::High);
    assert_eq!(resolved.range.unwrap().text(&doc), "Hello");
}

#[test]
fn test_missing_quote_is_orphaned() {
    let (doc, index) = indexed("<p>Hello world</p>");
    let resolved = resolve_highlight(
        &doc,
        &record("h1", HighlightAnchor::from_quote("Not found")),
        &index,
        &ResolveOptions::default(),
    );
    assert!(resolved.is_orphaned);
    assert!(resolved.range.is_none());
    assert_eq!(resolved.confidence, Confidence::Low);
}

#[test]
fn test_selection_across_elements() {
    let (doc, index) = indexed("<p>First</p><p>Second</p>");
    let anchor = create_anchor_from_offsets(&doc, &index, 2, 8, DEFAULT_CONTEXT_LENGTH).unwrap();
    assert_eq!(anchor.text_quote.exact, "rstSec");
    assert_eq!(anchor.text_quote.prefix.as_deref(), Some("Fi"));
    assert_eq!(anchor.text_quote.suffix.as_deref(), Some("ond"));

    let (doc, index) = indexed("<p>First</p><p>Second</p>");
    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    let range = resolved.range.unwrap();
    assert_eq!(range.text(&doc), "rstSec");
    assert_eq!(range.start.node, doc.children(doc.children(doc.root())[0])[0]);
    assert_eq!(range.end.node, doc.children(doc.children(doc.root())[1])[0]);
}

#[test]
fn test_matching_fingerprint_trusts_stored_offsets() {
    let (doc, index) = indexed("<p>cat cat cat</p>");
    let anchor = HighlightAnchor {
        text_position: Some(TextPositionSelector::new(8, 11)),
        text_quote: TextQuoteSelector::new("cat", "", ""),
        dom_hint: None,
        content_hash_at_create: Some(index.content_hash.clone()),
    };

    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(resolved.confidence, Confidence::High);
    let range = resolved.range.unwrap();
    assert_eq!(range_to_offsets(&doc, &range, &index), Some((8, 11)));
}

#[test]
fn test_context_relocates_quote_after_content_changes() {
    let (doc, index) = indexed("<p>The cat sat. The dog sat.</p>");
    let anchor = create_anchor_from_offsets(&doc, &index, 21, 24, DEFAULT_CONTEXT_LENGTH).unwrap();
    assert_eq!(anchor.text_quote.exact, "sat");

    let (doc, index) = indexed("<p>Intro.</p><p>The cat sat. The dog sat.</p>");
    assert_ne!(Some(&index.content_hash), anchor.content_hash_at_create.as_ref());

    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(resolved.confidence, Confidence::High);
    let range = resolved.range.unwrap();
    assert_eq!(range_to_offsets(&doc, &range, &index), Some((27, 30)));
}

#[test]
fn test_stored_position_breaks_ties_between_equal_matches() {
    let (doc, index) = indexed("<p>x one y one z one w</p>");
    let anchor = HighlightAnchor {
        text_position: Some(TextPositionSelector::new(9, 12)),
        text_quote: TextQuoteSelector::new("one", "", ""),
        dom_hint: None,
        content_hash_at_create: Some("stale".to_string()),
    };

    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    let range = resolved.range.unwrap();
    assert_eq!(range_to_offsets(&doc, &range, &index), Some((8, 11)));
}

#[test]
fn test_matching_ignores_case() {
    let (doc, index) = indexed("<p>Photosynthesis happens in LEAVES.</p>");
    let resolved = resolve_highlight(
        &doc,
        &record("h1", HighlightAnchor::from_quote("leaves")),
        &index,
        &ResolveOptions::default(),
    );
    assert_eq!(resolved.range.unwrap().text(&doc), "LEAVES");
}

#[test]
fn test_minimum_confidence_orphans_weak_matches() {
    let (doc, index) = indexed("<p>alpha beta gamma</p>");
    let anchor = HighlightAnchor {
        text_quote: TextQuoteSelector::new("beta", "zzz ", " yyy"),
        ..HighlightAnchor::default()
    };
    let options = ResolveOptions {
        min_confidence: Confidence::Medium,
        ..ResolveOptions::default()
    };

    let lenient = resolve_highlight(&doc, &record("h1", anchor.clone()), &index, &ResolveOptions::default());
    assert!(!lenient.is_orphaned);
    assert_eq!(lenient.confidence, Confidence::Low);

    let strict = resolve_highlight(&doc, &record("h1", anchor), &index, &options);
    assert!(strict.is_orphaned);
}

#[test]
fn test_resolution_is_deterministic() {
    let html = "<p>Repeat repeat REPEAT</p><p>repeat</p>";
    let records = vec![
        record("a", HighlightAnchor::from_quote("repeat")),
        record("b", HighlightAnchor::from_quote("peat re")),
        record("c", HighlightAnchor::from_quote("absent")),
    ];

    let (doc, index) = indexed(html);
    let first = resolve_highlights(&doc, &records, &index, &ResolveOptions::default());
    let second = resolve_highlights(&doc, &records, &index, &ResolveOptions::default());

    assert_eq!(first.len(), 3);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.range, b.range);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.is_orphaned, b.is_orphaned);
    }
    assert!(first[2].is_orphaned);
}

#[test]
fn test_utf16_positions_take_the_fingerprint_path() {
    // The web client stores positions in UTF-16 units: "world" is 9..14
    // because the emoji counts twice.
    let (doc, index) = indexed("<p>\u{1F600} Hello world again</p>");
    let anchor = HighlightAnchor {
        text_position: Some(TextPositionSelector::new(9, 14)),
        text_quote: TextQuoteSelector::new("world", "", ""),
        dom_hint: None,
        content_hash_at_create: Some(index.content_hash.clone()),
    };

    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(resolved.confidence, Confidence::High);
    let range = resolved.range.unwrap();
    assert_eq!(range.text(&doc), "world");
    assert_eq!(range_to_offsets(&doc, &range, &index), Some((8, 13)));
}

#[test]
fn test_captured_anchor_survives_astral_text() {
    let (doc, index) = indexed("<p>\u{1F600}\u{1F600} one</p><p>two one</p>");
    let anchor = create_anchor_from_offsets(&doc, &index, 10, 13, DEFAULT_CONTEXT_LENGTH).unwrap();
    assert_eq!(anchor.text_quote.exact, "one");
    assert_eq!(anchor.text_position, Some(TextPositionSelector::new(12, 15)));

    let (doc, index) = indexed("<p>\u{1F600}\u{1F600} one</p><p>two one</p>");
    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(range_to_offsets(&doc, &resolved.range.unwrap(), &index), Some((10, 13)));
}

#[test]
fn test_element_hint_needs_matching_context() {
    let (doc, index) = indexed("<p>Alpha beta</p><p>gamma delta beta</p>");
    let anchor = create_anchor_from_offsets(&doc, &index, 22, 26, DEFAULT_CONTEXT_LENGTH).unwrap();
    let hint = anchor.dom_hint.clone().unwrap();
    assert_eq!(hint.css_path.as_deref(), Some("p:nth-of-type(2)"));

    // The hinted paragraph is now "Alpha beta", whose "beta" has the wrong context.
    let (doc, index) = indexed("<p>New intro</p><p>Alpha beta</p><p>gamma delta beta</p>");
    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(resolved.confidence, Confidence::High);
    let range = resolved.range.unwrap();
    assert_eq!(range_to_offsets(&doc, &range, &index), Some((31, 35)));
}

#[test]
fn test_element_hint_accepts_occurrence_with_context() {
    let (doc, index) = indexed("<p>Intro</p><p>The cat sat.</p>");
    let anchor = create_anchor_from_offsets(&doc, &index, 9, 12, DEFAULT_CONTEXT_LENGTH).unwrap();
    assert_eq!(anchor.text_quote.exact, "cat");

    let (doc, index) = indexed("<p>Intro</p><p>Now the cat sat.</p>");
    let resolved = resolve_highlight(&doc, &record("h1", anchor), &index, &ResolveOptions::default());
    assert_eq!(resolved.confidence, Confidence::Medium);
    assert_eq!(resolved.range.unwrap().text(&doc), "cat");
}
