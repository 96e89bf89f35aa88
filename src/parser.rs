//! Parser for Hop template sources
//!
//! The parser assembles tokens into a tree of element and text nodes,
//! validating attribute syntax and enforcing tag balance. The parse
//! result is a synthetic `root` element whose children are the top-level
//! template elements.
//!
//! Attribute spans are not part of the token stream; the parser recovers
//! them by re-scanning the raw bytes of each start tag.

use crate::span::{Position, Span};
use crate::tokenizer::{tokenize, Attribute, Token, TokenKind};
use std::collections::HashMap;
use thiserror::Error;

/// Elements that cannot have children. They are never pushed onto the
/// open-element stack and a matching end tag is ignored.
pub const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parse error with a point span into the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{span}: parse error: {message}")]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl ParseError {
    fn at(pos: Position, message: impl Into<String>) -> Self {
        Self {
            span: Span::point(pos),
            message: message.into(),
        }
    }
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// The position of one attribute within a start tag. `value_start` and
/// `value_end` are absent for boolean attributes; for valued attributes
/// they exclude the quotes. End positions are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributePosition {
    pub name_start: Position,
    pub name_end: Position,
    pub value_start: Option<Position>,
    pub value_end: Option<Position>,
}

impl AttributePosition {
    /// The most precise span for diagnostics: the value span when the
    /// attribute has one, the name span otherwise.
    pub fn span(&self) -> Span {
        match (self.value_start, self.value_end) {
            (Some(start), Some(end)) => Span::new(start, end),
            _ => Span::new(self.name_start, self.name_end),
        }
    }
}

/// Source location metadata for a node. An element's `end` is the start
/// position of its closing tag; for childless elements it is the end of
/// the tag itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePosition {
    pub start: Position,
    pub end: Position,
    pub attributes: HashMap<String, AttributePosition>,
}

impl NodePosition {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// An element node: tag name, attribute list in source order, children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    pub pos: NodePosition,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            pos: NodePosition::default(),
        }
    }

    /// The value of the named attribute. Boolean attributes report the
    /// empty string, like a present-but-empty value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    pub fn span(&self) -> Span {
        self.pos.span()
    }

    /// The span of the named attribute, preferring its value span; falls
    /// back to the whole node when the attribute has no recorded position.
    pub fn attr_span(&self, name: &str) -> Span {
        self.pos
            .attributes
            .get(name)
            .map(|a| a.span())
            .unwrap_or_else(|| self.span())
    }

    /// Child elements, skipping text and other non-element nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }
}

/// A node in the parsed template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text { data: String, span: Span },
    Comment { data: String, span: Span },
    Doctype { name: String, span: Span },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Node::Text {
            data: data.into(),
            span: Span::default(),
        }
    }
}

fn is_valid_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_scan_whitespace(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\n' || c == b'\r'
}

/// Recover attribute spans by re-scanning the raw bytes of a start tag,
/// advancing a local position byte by byte from the tag's `<`.
fn parse_attribute_positions(raw: &[u8], start: Position) -> HashMap<String, AttributePosition> {
    let mut positions = HashMap::new();
    let mut pos = start;
    let mut i = 0;

    // Skip the opening `<` and the tag name.
    while i < raw.len() && !is_scan_whitespace(raw[i]) && raw[i] != b'>' {
        pos.advance(raw[i]);
        i += 1;
    }

    loop {
        while i < raw.len() && is_scan_whitespace(raw[i]) {
            pos.advance(raw[i]);
            i += 1;
        }

        if i >= raw.len() || raw[i] == b'>' || raw[i] == b'/' {
            break;
        }

        let name_start = pos;
        let mut name_end = pos;
        let name_start_index = i;

        while i < raw.len()
            && !is_scan_whitespace(raw[i])
            && raw[i] != b'='
            && raw[i] != b'>'
            && raw[i] != b'/'
        {
            pos.advance(raw[i]);
            name_end = pos;
            i += 1;
        }

        let name = String::from_utf8_lossy(&raw[name_start_index..i]).into_owned();

        let mut attr_pos = AttributePosition {
            name_start,
            name_end,
            value_start: None,
            value_end: None,
        };

        while i < raw.len() && is_scan_whitespace(raw[i]) {
            pos.advance(raw[i]);
            i += 1;
        }

        if i < raw.len() && raw[i] == b'=' {
            pos.advance(raw[i]);
            i += 1;

            while i < raw.len() && is_scan_whitespace(raw[i]) {
                pos.advance(raw[i]);
                i += 1;
            }

            if i < raw.len() && (raw[i] == b'"' || raw[i] == b'\'') {
                let quote = raw[i];
                pos.advance(raw[i]);
                i += 1;

                let value_start = pos;
                let mut value_end = pos;

                while i < raw.len() && raw[i] != quote {
                    pos.advance(raw[i]);
                    value_end = pos;
                    i += 1;
                }

                attr_pos.value_start = Some(value_start);
                attr_pos.value_end = Some(value_end);

                if i < raw.len() && raw[i] == quote {
                    pos.advance(raw[i]);
                    i += 1;
                }
            } else {
                let value_start = pos;
                while i < raw.len()
                    && !is_scan_whitespace(raw[i])
                    && raw[i] != b'>'
                    && raw[i] != b'/'
                {
                    pos.advance(raw[i]);
                    i += 1;
                }
                attr_pos.value_start = Some(value_start);
                attr_pos.value_end = Some(pos);
            }
        }

        positions.insert(name, attr_pos);
    }

    positions
}

/// Build an element from a start (or self-closing) tag token.
fn element_from_token(template: &str, token: &Token) -> ParseResult<Element> {
    for attr in &token.attributes {
        if attr.name.is_empty() || !is_valid_attr_name(&attr.name) {
            return Err(ParseError::at(
                token.start,
                format!("invalid attribute: {}", attr.name),
            ));
        }
    }

    let raw = &template.as_bytes()[token.raw.clone()];
    let attributes = parse_attribute_positions(raw, token.start);

    Ok(Element {
        tag: token.value.clone(),
        attrs: token.attributes.clone(),
        children: Vec::new(),
        pos: NodePosition {
            start: token.start,
            end: token.end,
            attributes,
        },
    })
}

/// Parse a template into its node tree, rooted at a synthetic `root`
/// element. The first tokenizer error token is fatal.
pub fn parse(template: &str) -> ParseResult<Element> {
    let tokens = tokenize(template);

    let mut root = Element::new("root");
    // Open elements above the root, innermost last.
    let mut stack: Vec<Element> = Vec::new();

    fn append(root: &mut Element, stack: &mut [Element], node: Node) {
        match stack.last_mut() {
            Some(top) => top.children.push(node),
            None => root.children.push(node),
        }
    }

    for token in &tokens {
        match token.kind {
            TokenKind::Error => {
                return Err(ParseError::at(token.start, token.value.clone()));
            }

            TokenKind::StartTag => {
                let element = element_from_token(template, token)?;
                if is_void_element(&element.tag) {
                    append(&mut root, &mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }

            TokenKind::SelfClosingTag => {
                let element = element_from_token(template, token)?;
                append(&mut root, &mut stack, Node::Element(element));
            }

            TokenKind::EndTag => {
                if is_void_element(&token.value) {
                    continue;
                }
                match stack.pop() {
                    None => {
                        return Err(ParseError::at(
                            token.start,
                            format!("unexpected closing tag </{}>", token.value),
                        ));
                    }
                    Some(element) if element.tag != token.value => {
                        return Err(ParseError::at(
                            token.start,
                            format!(
                                "mismatched closing tag: expected </{}>, got </{}>",
                                element.tag, token.value
                            ),
                        ));
                    }
                    Some(mut element) => {
                        element.pos.end = token.start;
                        append(&mut root, &mut stack, Node::Element(element));
                    }
                }
            }

            TokenKind::Text => {
                let node = Node::Text {
                    data: token.value.clone(),
                    span: Span::new(token.start, token.end),
                };
                append(&mut root, &mut stack, node);
            }

            TokenKind::Comment => {
                let node = Node::Comment {
                    data: token.value.clone(),
                    span: Span::new(token.start, token.end),
                };
                append(&mut root, &mut stack, node);
            }

            TokenKind::Doctype => {
                let node = Node::Doctype {
                    name: token.value.clone(),
                    span: Span::new(token.start, token.end),
                };
                append(&mut root, &mut stack, node);
            }
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(ParseError::at(
            unclosed.pos.start,
            format!("unclosed tag <{}>", unclosed.tag),
        ));
    }

    Ok(root)
}
