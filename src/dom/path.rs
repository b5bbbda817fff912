//! Node addressing relative to a content root
//!
//! Two families of paths:
//! - child-index paths (`[0, 2, 1]`), exact and cheap, used to carry a
//!   browser selection across the WASM boundary;
//! - XPath/CSS subsets, used as best-effort DOM hints inside stored anchors.
//!
//! Hint paths are generated and evaluated relative to the indexed root, not
//! the whole page, so they survive the content being mounted elsewhere.

use super::{Document, NodeId};

/// Child indices leading from `root` down to `node`
pub fn path_of(doc: &Document, root: NodeId, node: NodeId) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = node;
    while current != root {
        let index = doc.child_index(current)?;
        path.push(index);
        current = doc.parent(current)?;
    }
    path.reverse();
    Some(path)
}

/// Follow child indices from `root`
pub fn node_at_path(doc: &Document, root: NodeId, path: &[usize]) -> Option<NodeId> {
    let mut current = root;
    for index in path {
        current = *doc.children(current).get(*index)?;
    }
    Some(current)
}

// ============================================================================
// XPath subset: `/div[1]/p[2]/text()[1]`
// ============================================================================

/// XPath of a node relative to `root`
pub fn xpath_of(doc: &Document, root: NodeId, node: NodeId) -> Option<String> {
    if !doc.contains(root, node) {
        return None;
    }
    if node == root {
        return Some(".".to_string());
    }

    let mut steps = Vec::new();
    let mut current = node;
    while current != root {
        let parent = doc.parent(current)?;
        let step = if doc.is_text(current) {
            let position = doc.children(parent)[..doc.child_index(current)? + 1]
                .iter()
                .filter(|sibling| doc.is_text(**sibling))
                .count();
            format!("text()[{}]", position)
        } else {
            let tag = doc.tag_name(current)?;
            let position = doc.children(parent)[..doc.child_index(current)? + 1]
                .iter()
                .filter(|sibling| doc.tag_name(**sibling) == Some(tag))
                .count();
            format!("{}[{}]", tag, position)
        };
        steps.push(step);
        current = parent;
    }
    steps.reverse();
    Some(format!("/{}", steps.join("/")))
}

/// Evaluate an XPath produced by [`xpath_of`]
pub fn evaluate_xpath(doc: &Document, root: NodeId, xpath: &str) -> Option<NodeId> {
    let trimmed = xpath.trim();
    if trimmed == "." {
        return Some(root);
    }

    let mut current = root;
    for step in trimmed.split('/').filter(|step| !step.is_empty()) {
        let (name, position) = split_position(step, '[', ']')?;
        let wants_text = name == "text()";

        let mut seen = 0;
        let mut found = None;
        for child in doc.children(current) {
            let matches = if wants_text {
                doc.is_text(*child)
            } else {
                (name == "*" && doc.is_element(*child)) || doc.tag_name(*child) == Some(name)
            };
            if matches {
                seen += 1;
                if seen == position {
                    found = Some(*child);
                    break;
                }
            }
        }
        current = found?;
    }
    Some(current)
}

// ============================================================================
// CSS subset: `div:nth-of-type(1) > p:nth-of-type(2)`
// ============================================================================

/// CSS path of the element that holds `node` (a text node resolves to its parent)
pub fn css_path_of(doc: &Document, root: NodeId, node: NodeId) -> Option<String> {
    let element = if doc.is_text(node) { doc.parent(node)? } else { node };
    if !doc.contains(root, element) || element == root {
        return None;
    }

    let mut parts = Vec::new();
    let mut current = element;
    while current != root {
        let parent = doc.parent(current)?;
        let tag = doc.tag_name(current)?;
        let position = doc.children(parent)[..doc.child_index(current)? + 1]
            .iter()
            .filter(|sibling| doc.tag_name(**sibling) == Some(tag))
            .count();
        parts.push(format!("{}:nth-of-type({})", tag, position));
        current = parent;
    }
    parts.reverse();
    Some(parts.join(" > "))
}

/// Evaluate a CSS path produced by [`css_path_of`]
pub fn query_css_path(doc: &Document, root: NodeId, css_path: &str) -> Option<NodeId> {
    let mut current = root;
    for part in css_path.split('>').map(str::trim).filter(|part| !part.is_empty()) {
        let (tag, position) = match part.split_once(":nth-of-type") {
            Some((tag, rest)) => {
                let (_, position) = split_position(rest, '(', ')')?;
                (tag, position)
            }
            None => (part, 1),
        };
        let tag = tag.to_ascii_lowercase();

        current = doc
            .children(current)
            .iter()
            .filter(|child| doc.tag_name(**child) == Some(tag.as_str()))
            .nth(position.checked_sub(1)?)
            .copied()?;
    }
    (current != root).then_some(current)
}

/// Split `name[3]` / `(3)` style steps; a step without brackets means position 1
fn split_position(step: &str, open: char, close: char) -> Option<(&str, usize)> {
    match step.find(open) {
        Some(start) => {
            let inner = step[start + 1..].strip_suffix(close)?;
            let position = inner.trim().parse::<usize>().ok()?;
            (position > 0).then_some((&step[..start], position))
        }
        None => Some((step, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_fragment;

    #[test]
    fn test_child_index_paths_round_trip() {
        let doc = parse_fragment("<div><p>a</p><p>b<em>c</em></p></div>").unwrap();
        let root = doc.root();
        let em_text = node_at_path(&doc, root, &[0, 1, 1, 0]).unwrap();
        assert_eq!(doc.text(em_text), Some("c"));
        assert_eq!(path_of(&doc, root, em_text), Some(vec![0, 1, 1, 0]));
        assert_eq!(node_at_path(&doc, root, &[0, 7]), None);
    }

    #[test]
    fn test_xpath_round_trip() {
        let doc = parse_fragment("<div><p>a</p><p>b<em>c</em>d</p></div>").unwrap();
        let root = doc.root();
        let d = node_at_path(&doc, root, &[0, 1, 2]).unwrap();

        let xpath = xpath_of(&doc, root, d).unwrap();
        assert_eq!(xpath, "/div[1]/p[2]/text()[2]");
        assert_eq!(evaluate_xpath(&doc, root, &xpath), Some(d));
        assert_eq!(evaluate_xpath(&doc, root, "/div[1]/p[3]"), None);
    }

    #[test]
    fn test_css_path_round_trip() {
        let doc = parse_fragment("<div><p>a</p><p>b<em>c</em></p></div>").unwrap();
        let root = doc.root();
        let c = node_at_path(&doc, root, &[0, 1, 1, 0]).unwrap();

        let css = css_path_of(&doc, root, c).unwrap();
        assert_eq!(css, "div:nth-of-type(1) > p:nth-of-type(2) > em:nth-of-type(1)");
        let em = query_css_path(&doc, root, &css).unwrap();
        assert_eq!(doc.tag_name(em), Some("em"));
    }
}
