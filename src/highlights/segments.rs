//! Overlap resolution
//!
//! Turns possibly overlapping spans into a partition of non-overlapping
//! segments, each tagged with the highlights that fully cover it. The same
//! routine serves node-local offsets (rendering) and canonical offsets
//! ([`build_segments`]).

use super::text_index::range_to_offsets;
use super::types::{HighlightSegment, ResolvedHighlight, TextIndex};
use crate::dom::Document;

/// A highlight's presentation as it applies to one segment
#[derive(Debug, Clone, PartialEq)]
pub struct Cover {
    pub id: String,
    pub color: String,
    pub opacity: Option<f64>,
}

/// A highlight's `[start, end)` span in some offset space
#[derive(Debug, Clone, PartialEq)]
pub struct CoverSpan {
    pub start: usize,
    pub end: usize,
    pub cover: Cover,
}

/// A maximal interval with an identical covering set
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    /// Covering highlights, ordered by id
    pub covers: Vec<Cover>,
}

impl Segment {
    pub fn ids(&self) -> Vec<String> {
        self.covers.iter().map(|cover| cover.id.clone()).collect()
    }

    pub fn colors(&self) -> Vec<String> {
        self.covers.iter().map(|cover| cover.color.clone()).collect()
    }
}

/// Partition the union of `spans` into segments
///
/// Boundaries of every span are collected into a sorted set; each pair of
/// consecutive boundaries is a candidate, kept when at least one span covers
/// it entirely. Covering sets are sorted by id so the result does not depend
/// on input order, and adjacent segments with the same set are merged.
pub fn segment_spans(spans: &[CoverSpan]) -> Vec<Segment> {
    let mut boundaries: Vec<usize> = spans
        .iter()
        .filter(|span| span.start < span.end)
        .flat_map(|span| [span.start, span.end])
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut segments: Vec<Segment> = Vec::new();
    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let mut covers: Vec<Cover> = spans
            .iter()
            .filter(|span| span.start <= start && span.end >= end)
            .map(|span| span.cover.clone())
            .collect();
        if covers.is_empty() {
            continue;
        }
        covers.sort_by(|a, b| a.id.cmp(&b.id));
        covers.dedup_by(|a, b| a.id == b.id);

        match segments.last_mut() {
            Some(last) if last.end == start && last.covers == covers => last.end = end,
            _ => segments.push(Segment { start, end, covers }),
        }
    }
    segments
}

/// Segments of the resolved highlights in canonical offsets
///
/// Orphaned highlights and ranges that no longer map onto `index` are left
/// out.
pub fn build_segments(doc: &Document, resolved: &[ResolvedHighlight], index: &TextIndex) -> Vec<HighlightSegment> {
    let spans: Vec<CoverSpan> = resolved
        .iter()
        .filter(|highlight| !highlight.is_orphaned)
        .filter_map(|highlight| {
            let range = highlight.range.as_ref()?;
            let (start, end) = range_to_offsets(doc, range, index)?;
            Some(CoverSpan {
                start,
                end,
                cover: Cover {
                    id: highlight.record.id.clone(),
                    color: highlight.record.color.clone(),
                    opacity: highlight.record.opacity,
                },
            })
        })
        .collect();

    segment_spans(&spans)
        .into_iter()
        .map(|segment| HighlightSegment {
            start: segment.start,
            end: segment.end,
            highlight_ids: segment.ids(),
            colors: segment.colors(),
        })
        .collect()
}
