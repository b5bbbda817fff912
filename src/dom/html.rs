//! HTML fragment parsing and serialization
//!
//! The engine reads the output of a markdown renderer, which is HTML rather
//! than well-formed XML. The reader runs `quick-xml` in a lenient mode and
//! patches over the HTML-isms it cannot express: void elements, end tags
//! that close several open elements at once, stray end tags, and named
//! character references such as `&nbsp;`.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Document, NodeData, NodeId};
use crate::error::HtmlError;

/// Elements that never have content or an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Named references seen in rendered markdown beyond the XML five
fn resolve_html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{00A0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201C}"),
        "rdquo" => Some("\u{201D}"),
        "copy" => Some("\u{00A9}"),
        "reg" => Some("\u{00AE}"),
        "trade" => Some("\u{2122}"),
        "times" => Some("\u{00D7}"),
        "middot" => Some("\u{00B7}"),
        "laquo" => Some("\u{00AB}"),
        "raquo" => Some("\u{00BB}"),
        _ => None,
    }
}

/// Parse an HTML fragment into a new document
///
/// Top-level nodes of the fragment become children of the document root.
pub fn parse_fragment(html: &str) -> Result<Document, HtmlError> {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, html)?;
    Ok(doc)
}

/// Parse an HTML fragment and append its nodes under `parent`
pub fn parse_into(doc: &mut Document, parent: NodeId, html: &str) -> Result<(), HtmlError> {
    let mut reader = Reader::from_str(html);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut open: Vec<NodeId> = vec![parent];

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| HtmlError::Malformed {
            position,
            reason: e.to_string(),
        })?;

        let current = open.last().copied().unwrap_or(parent);
        match event {
            Event::Start(start) => {
                let element = element_from_start(doc, &start);
                doc.append_child(current, element)?;
                let void = doc.tag_name(element).map(is_void_element).unwrap_or(false);
                if !void {
                    open.push(element);
                }
            }
            Event::Empty(start) => {
                let element = element_from_start(doc, &start);
                doc.append_child(current, element)?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                // Close up to the nearest matching open element; stray end tags are dropped.
                if let Some(index) = open
                    .iter()
                    .rposition(|id| doc.tag_name(*id) == Some(name.as_str()))
                {
                    if index > 0 {
                        open.truncate(index);
                    }
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape_with(resolve_html_entity)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                append_text(doc, current, &value)?;
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                append_text(doc, current, &value)?;
            }
            Event::Comment(comment) => {
                let value = String::from_utf8_lossy(&comment).into_owned();
                let node = doc.create_comment(&value);
                doc.append_child(current, node)?;
            }
            Event::Eof => break,
            // Declarations, processing instructions and doctypes carry no text.
            _ => {}
        }
    }

    Ok(())
}

fn element_from_start(doc: &mut Document, start: &BytesStart<'_>) -> NodeId {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let mut attrs = Vec::new();

    for attr in start.html_attributes().with_checks(false) {
        let Ok(attr) = attr else {
            log::warn!("Skipping unreadable attribute on <{}>", tag);
            continue;
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = attr
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attrs.push((key, value));
    }

    doc.create_element_with_attrs(&tag, attrs)
}

fn append_text(doc: &mut Document, parent: NodeId, value: &str) -> Result<(), HtmlError> {
    if value.is_empty() {
        return Ok(());
    }
    let node = doc.create_text(value);
    doc.append_child(parent, node)?;
    Ok(())
}

// ============================================================================
// Serialization
// ============================================================================

/// Serialize a node and its subtree
pub fn outer_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

/// Serialize the children of a node
pub fn inner_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        write_node(doc, *child, &mut out);
    }
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.data(node) {
        NodeData::Document => {
            for child in doc.children(node) {
                write_node(doc, *child, out);
            }
        }
        NodeData::Text(text) => out.push_str(&escape_text(text)),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (key, value) in &element.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if is_void_element(&element.tag) {
                return;
            }
            for child in doc.children(node) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_fragment() {
        let doc = parse_fragment("<p>First</p><p>Second</p>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.text_content(root), "FirstSecond");
    }

    #[test]
    fn test_void_elements_do_not_swallow_siblings() {
        let doc = parse_fragment("<p>one<br>two</p><p>three</p>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        let p = doc.children(root)[0];
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.tag_name(doc.children(p)[1]), Some("br"));
    }

    #[test]
    fn test_named_entities_are_resolved() {
        let doc = parse_fragment("<p>a&nbsp;b &amp; c&#33;</p>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "a\u{00A0}b & c!");
    }

    #[test]
    fn test_unclosed_inline_is_closed_by_parent_end() {
        let doc = parse_fragment("<p><em>one</p><p>two</p>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.text_content(doc.children(root)[1]), "two");
    }

    #[test]
    fn test_attributes_and_serialization() {
        let html = "<div class=\"lesson\" data-highlight-exclude=\"\"><p>x &lt; y</p><hr></div>";
        let doc = parse_fragment(html).unwrap();
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.attr(div, "class"), Some("lesson"));
        assert!(doc.has_attr(div, "data-highlight-exclude"));
        assert_eq!(inner_html(&doc, doc.root()), html);
    }
}
