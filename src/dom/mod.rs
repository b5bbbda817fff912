//! In-memory DOM
//!
//! Arena-backed node tree that the anchoring engine reads and mutates.
//! Nodes are addressed by [`NodeId`]. A removed node stays in the arena but is
//! detached from its parent, so a stale id is always detectable through
//! [`Document::is_connected`] / [`Document::contains`] instead of dangling.
//!
//! ## Modules
//!
//! - `range`: boundary points and ranges with DOM `Range` semantics
//! - `html`: lenient HTML fragment parsing and serialization
//! - `path`: child-index paths plus XPath/CSS hint paths

pub mod html;
pub mod path;
pub mod range;

pub use range::{BoundaryPoint, Range};

use std::cmp::Ordering;

use crate::error::DomError;

/// Index of a node inside its [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Tag name and attributes of an element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// ASCII-lowercase tag name
    pub tag: String,
    /// Attributes in source order
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// Get an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// The arena root; holds the top-level nodes of a parsed fragment
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena of nodes with a single document root
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create an empty document holding only its root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes ever allocated, detached ones included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn check(&self, id: NodeId) -> Result<(), DomError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(DomError::UnknownNode(id))
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    /// Create a detached element with attributes
    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        let mut data = ElementData::new(tag);
        data.attrs = attrs;
        self.alloc(NodeData::Element(data))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Position of a node among its parent's children
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Element(_))
    }

    /// Text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the data of a text node
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.check(id)?;
        match &mut self.nodes[id.0].data {
            NodeData::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotAText(id)),
        }
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id) {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.check(id)?;
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => {
                element.set_attr(name, value);
                Ok(())
            }
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    /// Length used for boundary-point offsets: chars for character data,
    /// child count for containers
    pub fn node_length(&self, id: NodeId) -> usize {
        match self.data(id) {
            NodeData::Text(text) | NodeData::Comment(text) => text.chars().count(),
            NodeData::Element(_) | NodeData::Document => self.children(id).len(),
        }
    }

    /// Concatenated text of all descendant text nodes (comments excluded)
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Ancestors from the parent up to the arena root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// All descendants in document (pre-)order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Inclusive containment: `node` is `ancestor` or lies beneath it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if ancestor == node {
            return true;
        }
        self.ancestors(node).contains(&ancestor)
    }

    /// Whether the node is still reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len() && self.contains(self.root(), id)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn ensure_container(&self, id: NodeId) -> Result<(), DomError> {
        self.check(id)?;
        match self.data(id) {
            NodeData::Element(_) | NodeData::Document => Ok(()),
            _ => Err(DomError::NotAContainer(id)),
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Append a child, moving it out of its current parent first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end when `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.ensure_container(parent)?;
        self.check(child)?;
        if self.contains(child, parent) {
            return Err(DomError::Hierarchy { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, child: reference });
            }
        }

        self.detach(child);
        let index = match reference {
            Some(reference) => self.nodes[parent.0]
                .children
                .iter()
                .position(|c| *c == reference)
                .unwrap_or(self.nodes[parent.0].children.len()),
            None => self.nodes[parent.0].children.len(),
        };
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Detach a node (and its subtree) from the tree
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.check(id)?;
        self.detach(id);
        Ok(())
    }

    /// Splice `replacement` into the position of `node`, detaching `node`
    ///
    /// Equivalent to `parent.replaceChild(fragment, node)`.
    pub fn replace_with(&mut self, node: NodeId, replacement: &[NodeId]) -> Result<(), DomError> {
        self.check(node)?;
        let parent = self.parent(node).ok_or(DomError::Detached(node))?;
        for new_node in replacement {
            self.insert_before(parent, *new_node, Some(node))?;
        }
        self.detach(node);
        Ok(())
    }

    /// Merge adjacent text nodes and drop empty ones, recursively
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut kept = Vec::with_capacity(children.len());
        let mut open_text: Option<NodeId> = None;

        for child in children {
            let text = self.text(child).map(str::to_string);
            match text {
                Some(text) if text.is_empty() => {
                    self.nodes[child.0].parent = None;
                }
                Some(text) => match open_text {
                    Some(previous) => {
                        if let NodeData::Text(existing) = &mut self.nodes[previous.0].data {
                            existing.push_str(&text);
                        }
                        self.nodes[child.0].parent = None;
                    }
                    None => {
                        open_text = Some(child);
                        kept.push(child);
                    }
                },
                None => {
                    open_text = None;
                    kept.push(child);
                    self.normalize(child);
                }
            }
        }

        self.nodes[id.0].children = kept;
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Child-index path from the arena root down to `id`
    fn tree_path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let index = self
                .children(parent)
                .iter()
                .position(|child| *child == current)
                .unwrap_or(0);
            path.push(index);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Total order over boundary points, in document order
    ///
    /// A point is encoded as the container's child-index path followed by
    /// its offset; lexicographic order over those sequences matches DOM
    /// boundary-point ordering.
    pub fn compare_points(&self, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
        if a.node == b.node {
            return a.offset.cmp(&b.offset);
        }
        let mut path_a = self.tree_path(a.node);
        path_a.push(a.offset);
        let mut path_b = self.tree_path(b.node);
        path_b.push(b.offset);
        path_a.cmp(&path_b)
    }

    /// Document order of two nodes
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.tree_path(a).cmp(&self.tree_path(b))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice a string by char offsets, clamping to its bounds
pub fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |char_index: usize| {
        text.char_indices()
            .nth(char_index)
            .map(|(byte, _)| byte)
            .unwrap_or(text.len())
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end.max(start));
    &text[start_byte..end_byte]
}

/// UTF-16 length of the first `chars` chars of `text`
///
/// Browser offsets (`Range.startOffset`, stored anchors) count UTF-16 code
/// units; the tree counts chars.
pub fn chars_to_utf16(text: &str, chars: usize) -> usize {
    text.chars().take(chars).map(char::len_utf16).sum()
}

/// Char offset of a UTF-16 offset into `text`
///
/// `None` when the offset is past the end or splits a surrogate pair.
pub fn utf16_to_chars(text: &str, units: usize) -> Option<usize> {
    let mut seen = 0;
    let mut count = 0;
    for c in text.chars() {
        if seen >= units {
            break;
        }
        seen += c.len_utf16();
        count += 1;
    }
    (seen == units).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let p = doc.create_element("P");
        let first = doc.create_text("First");
        let second = doc.create_text("Second");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, first).unwrap();
        doc.append_child(p, second).unwrap();
        (doc, p, first, second)
    }

    #[test]
    fn test_tag_names_are_lowercased() {
        let (doc, p, _, _) = paragraph_doc();
        assert_eq!(doc.tag_name(p), Some("p"));
    }

    #[test]
    fn test_replace_with_detaches_original() {
        let (mut doc, p, first, _) = paragraph_doc();
        let a = doc.create_text("Fi");
        let b = doc.create_text("rst");
        doc.replace_with(first, &[a, b]).unwrap();

        assert!(!doc.is_connected(first));
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.text_content(p), "FirstSecond");
    }

    #[test]
    fn test_normalize_merges_and_drops_empty() {
        let (mut doc, p, _, _) = paragraph_doc();
        let empty = doc.create_text("");
        doc.append_child(p, empty).unwrap();
        doc.normalize(p);

        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text(doc.children(p)[0]), Some("FirstSecond"));
    }

    #[test]
    fn test_compare_points_orders_element_and_text_boundaries() {
        let (doc, p, first, second) = paragraph_doc();
        let before_second = BoundaryPoint::new(p, 1);
        assert_eq!(
            doc.compare_points(BoundaryPoint::new(first, 5), before_second),
            Ordering::Less
        );
        assert_eq!(
            doc.compare_points(before_second, BoundaryPoint::new(second, 0)),
            Ordering::Less
        );
        assert_eq!(
            doc.compare_points(BoundaryPoint::new(p, 2), BoundaryPoint::new(second, 6)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_insert_rejects_cycles() {
        let (mut doc, p, _, _) = paragraph_doc();
        let root = doc.root();
        assert!(doc.append_child(p, root).is_err());
    }

    #[test]
    fn test_slice_chars_handles_multibyte() {
        assert_eq!(slice_chars("naïve café", 2, 5), "ïve");
        assert_eq!(slice_chars("abc", 1, 10), "bc");
        assert_eq!(slice_chars("abc", 2, 1), "");
    }

    #[test]
    fn test_utf16_offsets_count_astral_chars_twice() {
        let text = "\u{1F600} Hello";
        assert_eq!(chars_to_utf16(text, 0), 0);
        assert_eq!(chars_to_utf16(text, 1), 2);
        assert_eq!(chars_to_utf16(text, 7), 8);
        assert_eq!(utf16_to_chars(text, 2), Some(1));
        assert_eq!(utf16_to_chars(text, 8), Some(7));
        assert_eq!(utf16_to_chars(text, 1), None);
        assert_eq!(utf16_to_chars(text, 9), None);
        assert_eq!(utf16_to_chars("", 0), Some(0));
    }
}
