//! HTML serialization
//!
//! Writes a node tree as well-formed HTML bytes: text escaped, attribute
//! values quoted and escaped, boolean attributes bare, void elements
//! without end tags, and rawtext elements (script, style, and friends)
//! emitted verbatim.

use crate::parser::{is_void_element, Element, Node};
use crate::tokenizer::RAWTEXT_ELEMENTS;
use std::io::{self, Write};

fn write_escaped_text<W: Write>(w: &mut W, text: &str) -> io::Result<()> {
    for c in text.chars() {
        match c {
            '&' => w.write_all(b"&amp;")?,
            '<' => w.write_all(b"&lt;")?,
            '>' => w.write_all(b"&gt;")?,
            _ => write!(w, "{}", c)?,
        }
    }
    Ok(())
}

fn write_escaped_attr<W: Write>(w: &mut W, value: &str) -> io::Result<()> {
    for c in value.chars() {
        match c {
            '&' => w.write_all(b"&amp;")?,
            '"' => w.write_all(b"&quot;")?,
            _ => write!(w, "{}", c)?,
        }
    }
    Ok(())
}

fn is_rawtext_element(tag: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    RAWTEXT_ELEMENTS.contains(&lower.as_str())
}

/// Serialize one node to `w`.
pub fn render_node<W: Write>(w: &mut W, node: &Node) -> io::Result<()> {
    match node {
        Node::Text { data, .. } => write_escaped_text(w, data),
        Node::Comment { data, .. } => write!(w, "<!--{}-->", data),
        Node::Doctype { name, .. } => write!(w, "<!DOCTYPE {}>", name),
        Node::Element(element) => render_element(w, element),
    }
}

/// Serialize a node list in order.
pub fn render_nodes<W: Write>(w: &mut W, nodes: &[Node]) -> io::Result<()> {
    for node in nodes {
        render_node(w, node)?;
    }
    Ok(())
}

fn render_element<W: Write>(w: &mut W, element: &Element) -> io::Result<()> {
    write!(w, "<{}", element.tag)?;
    for attr in &element.attrs {
        match &attr.value {
            Some(value) => {
                write!(w, " {}=\"", attr.name)?;
                write_escaped_attr(w, value)?;
                w.write_all(b"\"")?;
            }
            None => write!(w, " {}", attr.name)?,
        }
    }
    w.write_all(b">")?;

    if is_void_element(&element.tag) {
        return Ok(());
    }

    if is_rawtext_element(&element.tag) {
        for child in &element.children {
            if let Node::Text { data, .. } = child {
                w.write_all(data.as_bytes())?;
            }
        }
    } else {
        render_nodes(w, &element.children)?;
    }

    write!(w, "</{}>", element.tag)
}
