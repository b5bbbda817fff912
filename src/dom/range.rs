//! Boundary points and ranges
//!
//! Mirrors the DOM `Range` model: a boundary point is a container node plus
//! an offset, where the offset counts chars inside character data and
//! children inside elements.

use std::cmp::Ordering;

use super::{slice_chars, Document, NodeId};
use crate::error::DomError;

/// A position in the tree: `(container, offset)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A span between two boundary points
///
/// Fields are public so a backward selection (end before start) can be
/// represented as the host reported it; consumers that need an ordered
/// range call [`Range::ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl Range {
    /// Build a range, validating both offsets against their containers
    pub fn new(doc: &Document, start: BoundaryPoint, end: BoundaryPoint) -> Result<Self, DomError> {
        validate_point(doc, start)?;
        validate_point(doc, end)?;
        Ok(Self { start, end })
    }

    /// A collapsed range at a single point
    pub fn collapsed_at(point: BoundaryPoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    /// Select the full contents of a node
    pub fn select_node_contents(doc: &Document, node: NodeId) -> Self {
        Self {
            start: BoundaryPoint::new(node, 0),
            end: BoundaryPoint::new(node, doc.node_length(node)),
        }
    }

    pub fn set_start(&mut self, doc: &Document, point: BoundaryPoint) -> Result<(), DomError> {
        validate_point(doc, point)?;
        self.start = point;
        Ok(())
    }

    pub fn set_end(&mut self, doc: &Document, point: BoundaryPoint) -> Result<(), DomError> {
        validate_point(doc, point)?;
        self.end = point;
        Ok(())
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Whether the end lies before the start
    pub fn is_backward(&self, doc: &Document) -> bool {
        doc.compare_points(self.start, self.end) == Ordering::Greater
    }

    /// The same range with start <= end
    pub fn ordered(&self, doc: &Document) -> Self {
        if self.is_backward(doc) {
            Self {
                start: self.end,
                end: self.start,
            }
        } else {
            *self
        }
    }

    /// Deepest node containing both boundary containers
    pub fn common_ancestor(&self, doc: &Document) -> NodeId {
        let mut start_chain = vec![self.start.node];
        start_chain.extend(doc.ancestors(self.start.node));

        let mut end_chain = vec![self.end.node];
        end_chain.extend(doc.ancestors(self.end.node));

        end_chain
            .into_iter()
            .find(|node| start_chain.contains(node))
            .unwrap_or_else(|| doc.root())
    }

    /// Node-local `[start, end)` char offsets of this range inside a text node
    ///
    /// Returns `None` when the intersection is empty.
    pub fn node_intersection(&self, doc: &Document, text_node: NodeId) -> Option<(usize, usize)> {
        let length = doc.text(text_node)?.chars().count();
        let range = self.ordered(doc);

        let node_start = BoundaryPoint::new(text_node, 0);
        let node_end = BoundaryPoint::new(text_node, length);

        let start = max_point(doc, range.start, node_start);
        let end = min_point(doc, range.end, node_end);
        if doc.compare_points(start, end) != Ordering::Less {
            return None;
        }

        let local_start = if start.node == text_node { start.offset.min(length) } else { 0 };
        let local_end = if end.node == text_node { end.offset.min(length) } else { length };
        (local_start < local_end).then_some((local_start, local_end))
    }

    /// Whether any of the node's own content falls inside the range
    pub fn intersects_node(&self, doc: &Document, node: NodeId) -> bool {
        if doc.is_text(node) {
            return self.node_intersection(doc, node).is_some();
        }
        doc.descendants(node)
            .into_iter()
            .any(|child| doc.is_text(child) && self.node_intersection(doc, child).is_some())
    }

    /// Text nodes with a non-empty intersection, in document order
    pub fn text_nodes(&self, doc: &Document) -> Vec<NodeId> {
        let ancestor = self.common_ancestor(doc);
        let candidates = if doc.is_text(ancestor) {
            vec![ancestor]
        } else {
            doc.descendants(ancestor)
        };

        candidates
            .into_iter()
            .filter(|node| doc.is_text(*node) && self.node_intersection(doc, *node).is_some())
            .collect()
    }

    /// Raw text covered by the range (DOM `Range.toString()`)
    pub fn text(&self, doc: &Document) -> String {
        let mut out = String::new();
        for node in self.text_nodes(doc) {
            if let (Some(text), Some((start, end))) = (doc.text(node), self.node_intersection(doc, node)) {
                out.push_str(slice_chars(text, start, end));
            }
        }
        out
    }
}

fn validate_point(doc: &Document, point: BoundaryPoint) -> Result<(), DomError> {
    if point.node.0 >= doc.node_count() {
        return Err(DomError::UnknownNode(point.node));
    }
    let length = doc.node_length(point.node);
    if point.offset > length {
        return Err(DomError::IndexSize {
            offset: point.offset,
            length,
        });
    }
    Ok(())
}

fn max_point(doc: &Document, a: BoundaryPoint, b: BoundaryPoint) -> BoundaryPoint {
    if doc.compare_points(a, b) == Ordering::Less {
        b
    } else {
        a
    }
}

fn min_point(doc: &Document, a: BoundaryPoint, b: BoundaryPoint) -> BoundaryPoint {
    if doc.compare_points(a, b) == Ordering::Greater {
        b
    } else {
        a
    }
}
