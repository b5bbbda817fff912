//! Anchor resolution
//!
//! Re-finds a stored anchor in a fresh [`TextIndex`]. Stages run in a fixed
//! order and each one is only tried when the previous produced nothing:
//!
//! 1. fingerprint trust: unchanged content, stored offsets are used as-is (high)
//! 2. DOM hint: stored XPath/CSS location, verified against the quote (medium)
//! 3. quote matching: every occurrence of the quote, scored by its context
//! 4. orphaned
//!
//! Resolution never fails; a miss degrades to a lower confidence or to an
//! orphan.

use serde::{Deserialize, Serialize};

use super::text_index::offsets_to_range;
use super::types::{Confidence, DomHint, HighlightRecord, ResolvedHighlight, TextIndex, TextQuoteSelector};
use crate::config::ResolveOptions;
use crate::dom::path::{evaluate_xpath, query_css_path};
use crate::dom::{chars_to_utf16, utf16_to_chars, Document, NodeId};

/// Score every occurrence starts with
pub const BASE_SCORE: f64 = 1.0;

/// Added when the stored prefix (or suffix) matches the live context exactly
pub const CONTEXT_BONUS: f64 = 0.5;

/// Weight of the partial credit for a context that only partly matches
pub const PARTIAL_CONTEXT_WEIGHT: f64 = 0.3;

/// Minimum score for a high-confidence quote match
pub const HIGH_CONFIDENCE_SCORE: f64 = 2.0;

/// Minimum score for a medium-confidence quote match
pub const MEDIUM_CONFIDENCE_SCORE: f64 = 1.5;

/// Matches scoring at least this share of the best score compete on position
pub const POSITION_TIEBREAK_WINDOW: f64 = 0.8;

/// Tunable quote-matching weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchScoring {
    pub context_bonus: f64,
    pub partial_context_weight: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub position_window: f64,
}

impl Default for MatchScoring {
    fn default() -> Self {
        Self {
            context_bonus: CONTEXT_BONUS,
            partial_context_weight: PARTIAL_CONTEXT_WEIGHT,
            high_threshold: HIGH_CONFIDENCE_SCORE,
            medium_threshold: MEDIUM_CONFIDENCE_SCORE,
            position_window: POSITION_TIEBREAK_WINDOW,
        }
    }
}

impl MatchScoring {
    pub fn confidence(&self, score: f64) -> Confidence {
        if score >= self.high_threshold {
            Confidence::High
        } else if score >= self.medium_threshold {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One occurrence of the quote in canonical text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteMatch {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

/// Lowercase a char without changing the char count
///
/// A char whose lowercase form is several chars (only `İ`, U+0130) is kept
/// as is, so folded offsets stay aligned with canonical ones. Such a char
/// still matches itself in either string; it does not match the expanded
/// `i` + U+0307 sequence a JS `toLowerCase` would produce.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

fn folded(text: &str) -> Vec<char> {
    text.chars().map(fold).collect()
}

fn common_suffix_len(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Score one side of the context
///
/// An empty stored context only matches at the matching edge of the text,
/// which is exactly where capture would have produced one.
fn context_score(actual: &[char], stored: &[char], at_edge: bool, from_end: bool, scoring: &MatchScoring) -> f64 {
    if stored.is_empty() {
        return if at_edge { scoring.context_bonus } else { 0.0 };
    }
    let full = if from_end {
        actual.ends_with(stored)
    } else {
        actual.starts_with(stored)
    };
    if full {
        return scoring.context_bonus;
    }
    if actual.is_empty() {
        return 0.0;
    }
    let common = if from_end {
        common_suffix_len(actual, stored)
    } else {
        common_prefix_len(actual, stored)
    };
    common as f64 / stored.len() as f64 * scoring.partial_context_weight
}

/// Find and score every occurrence of `exact`, best first
///
/// Matching is case-insensitive and occurrences may overlap.
pub fn find_quote_matches(
    canonical_text: &str,
    exact: &str,
    prefix: &str,
    suffix: &str,
    scoring: &MatchScoring,
) -> Vec<QuoteMatch> {
    let text = folded(canonical_text);
    let needle = folded(exact);
    let prefix = folded(prefix);
    let suffix = folded(suffix);
    if needle.is_empty() || needle.len() > text.len() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for start in 0..=text.len() - needle.len() {
        if text[start..start + needle.len()] != needle[..] {
            continue;
        }
        let end = start + needle.len();

        let actual_prefix = &text[start.saturating_sub(prefix.len())..start];
        let actual_suffix = &text[end..(end + suffix.len()).min(text.len())];

        let score = BASE_SCORE
            + context_score(actual_prefix, &prefix, start == 0, true, scoring)
            + context_score(actual_suffix, &suffix, end == text.len(), false, scoring);
        matches.push(QuoteMatch { start, end, score });
    }

    // Stable sort keeps document order among equal scores.
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}

/// Pick the match to use, preferring the one nearest the stored start among
/// those scoring within the position window of the best
pub fn choose_match(matches: &[QuoteMatch], stored_start: Option<usize>, scoring: &MatchScoring) -> Option<QuoteMatch> {
    let best = *matches.first()?;
    let Some(stored_start) = stored_start else {
        return Some(best);
    };

    let floor = best.score * scoring.position_window;
    matches
        .iter()
        .filter(|candidate| candidate.score >= floor)
        .min_by_key(|candidate| candidate.start.abs_diff(stored_start))
        .copied()
        .or(Some(best))
}

/// Char offset into a text node of a stored UTF-16 node offset
fn node_offset(doc: &Document, node: NodeId, units: usize) -> Option<usize> {
    utf16_to_chars(doc.text(node)?, units)
}

/// UTF-16 offset of a canonical position inside its own text node
fn utf16_node_offset(doc: &Document, index: &TextIndex, canonical: usize) -> Option<usize> {
    let position = index.mappings.partition_point(|mapping| mapping.end <= canonical);
    let mapping = index.mappings.get(position)?;
    let raw = mapping.raw_offset(canonical - mapping.start);
    Some(chars_to_utf16(doc.text(mapping.node)?, raw))
}

/// Stage 2: verify the stored DOM location still holds the quote
///
/// The XPath candidate must sit at the stored node offset. The CSS fallback
/// only knows the element, so an occurrence there is accepted when it lies
/// at the stored offsets or when its context scores at least medium.
fn resolve_dom_hint(
    doc: &Document,
    hint: &DomHint,
    quote: &TextQuoteSelector,
    index: &TextIndex,
    scoring: &MatchScoring,
) -> Option<(usize, usize)> {
    let needle = folded(&quote.exact);
    let matches_quote = |start: usize, end: usize| folded(index.slice(start, end)) == needle;

    if let Some(xpath) = hint.xpath.as_deref() {
        let located = evaluate_xpath(doc, index.root, xpath).and_then(|node| {
            let mapping = index.mapping_for(node)?;
            let raw = node_offset(doc, node, hint.start_node_offset.unwrap_or(0))?;
            Some(mapping.start + mapping.canonical_offset(raw))
        });
        if let Some(start) = located {
            let end = start + needle.len();
            if end <= index.char_len && matches_quote(start, end) {
                return Some((start, end));
            }
        }
    }

    let css_path = hint.css_path.as_deref()?;
    let element = query_css_path(doc, index.root, css_path)?;
    let inside: Vec<_> = index
        .mappings
        .iter()
        .filter(|mapping| doc.contains(element, mapping.node))
        .collect();
    let (first, last) = (inside.first()?, inside.last()?);
    let at_stored_offset = |start: usize| {
        hint.start_node_offset.is_some() && utf16_node_offset(doc, index, start) == hint.start_node_offset
    };

    find_quote_matches(
        &index.canonical_text,
        &quote.exact,
        quote.prefix.as_deref().unwrap_or(""),
        quote.suffix.as_deref().unwrap_or(""),
        scoring,
    )
    .into_iter()
    .filter(|candidate| candidate.start >= first.start && candidate.end <= last.end)
    .find(|candidate| at_stored_offset(candidate.start) || candidate.score >= scoring.medium_threshold)
    .map(|candidate| (candidate.start, candidate.end))
}

/// Resolve one stored highlight against the live index
pub fn resolve_highlight(
    doc: &Document,
    record: &HighlightRecord,
    index: &TextIndex,
    options: &ResolveOptions,
) -> ResolvedHighlight {
    let anchor = &record.anchor;
    let quote = &anchor.text_quote;

    if quote.exact.is_empty() {
        log::warn!("Highlight {} has no quote; treating as orphaned", record.id);
        return ResolvedHighlight::orphaned(record.clone());
    }

    // Stored positions count UTF-16 units.
    let canonical = &index.canonical_text;
    let stored = anchor.text_position.and_then(|position| {
        Some((
            utf16_to_chars(canonical, position.start)?,
            utf16_to_chars(canonical, position.end)?,
        ))
    });

    // Stage 1: fingerprint trust
    if let (Some(hash), Some((start, end))) = (&anchor.content_hash_at_create, stored) {
        if *hash == index.content_hash {
            if let Some(range) = offsets_to_range(doc, start, end, index) {
                return ResolvedHighlight::resolved(record.clone(), range, Confidence::High);
            }
        }
    }

    // Stage 2: DOM hint
    if options.use_dom_hint && options.min_confidence <= Confidence::Medium {
        if let Some(hint) = &anchor.dom_hint {
            if let Some((start, end)) = resolve_dom_hint(doc, hint, quote, index, &options.scoring) {
                if let Some(range) = offsets_to_range(doc, start, end, index) {
                    log::debug!("Highlight {} resolved from DOM hint", record.id);
                    return ResolvedHighlight::resolved(record.clone(), range, Confidence::Medium);
                }
            }
        }
    }

    // Stage 3: quote matching
    let matches = find_quote_matches(
        &index.canonical_text,
        &quote.exact,
        quote.prefix.as_deref().unwrap_or(""),
        quote.suffix.as_deref().unwrap_or(""),
        &options.scoring,
    );
    let stored_start = anchor.text_position.map(|position| {
        stored
            .map(|(start, _)| start)
            .unwrap_or_else(|| utf16_to_chars(canonical, position.start).unwrap_or(index.char_len))
    });
    if let Some(chosen) = choose_match(&matches, stored_start, &options.scoring) {
        let confidence = options.scoring.confidence(chosen.score);
        if confidence < options.min_confidence {
            log::debug!(
                "Highlight {} matched with {:?} confidence, below {:?}",
                record.id,
                confidence,
                options.min_confidence
            );
            return ResolvedHighlight::orphaned(record.clone());
        }
        if let Some(range) = offsets_to_range(doc, chosen.start, chosen.end, index) {
            return ResolvedHighlight::resolved(record.clone(), range, confidence);
        }
    }

    // Stage 4: orphaned
    log::debug!("Highlight {} is orphaned", record.id);
    ResolvedHighlight::orphaned(record.clone())
}

/// Resolve every record independently
pub fn resolve_highlights(
    doc: &Document,
    records: &[HighlightRecord],
    index: &TextIndex,
    options: &ResolveOptions,
) -> Vec<ResolvedHighlight> {
    let resolved: Vec<_> = records
        .iter()
        .map(|record| resolve_highlight(doc, record, index, options))
        .collect();
    log::debug!(
        "Resolved {} highlights ({} orphaned)",
        resolved.len(),
        resolved.iter().filter(|r| r.is_orphaned).count()
    );
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_full_context() {
        let matches = find_quote_matches("Hello world", "Hello", "", " ", &MatchScoring::default());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 2.0);
    }

    #[test]
    fn test_empty_prefix_only_matches_at_text_start() {
        let matches = find_quote_matches("say Hello world", "Hello", "", " ", &MatchScoring::default());
        assert_eq!(matches[0].score, 1.5);
    }

    #[test]
    fn test_partial_context_credit() {
        // stored prefix "xab", live prefix "yab": common suffix of 2 chars
        let matches = find_quote_matches("yabQUOTE", "quote", "xab", "", &MatchScoring::default());
        let expected = 1.0 + 2.0 / 3.0 * 0.3 + 0.5;
        assert!((matches[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_matches_are_case_insensitive_and_overlapping() {
        let matches = find_quote_matches("AAA", "aa", "", "", &MatchScoring::default());
        let mut starts: Vec<_> = matches.iter().map(|m| m.start).collect();
        starts.sort();
        assert_eq!(starts, vec![0, 1]);
    }

    #[test]
    fn test_multi_char_lowercase_keeps_offsets() {
        let matches = find_quote_matches("Visit \u{130}STANBUL today", "\u{130}stanbul", "", "", &MatchScoring::default());
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].start, matches[0].end), (6, 14));
    }

    #[test]
    fn test_position_tiebreak_within_window() {
        let matches = vec![
            QuoteMatch { start: 0, end: 3, score: 2.0 },
            QuoteMatch { start: 40, end: 43, score: 1.7 },
            QuoteMatch { start: 50, end: 53, score: 1.0 },
        ];
        let scoring = MatchScoring::default();
        assert_eq!(choose_match(&matches, Some(52), &scoring).map(|m| m.start), Some(40));
        assert_eq!(choose_match(&matches, None, &scoring).map(|m| m.start), Some(0));
    }

    #[test]
    fn test_confidence_thresholds() {
        let scoring = MatchScoring::default();
        assert_eq!(scoring.confidence(2.0), Confidence::High);
        assert_eq!(scoring.confidence(1.5), Confidence::Medium);
        assert_eq!(scoring.confidence(1.49), Confidence::Low);
    }
}
