//! Tokenizer for Hop template sources
//!
//! The tokenizer converts template source text into a stream of tagged
//! tokens with precise source spans. It is a hand-written state machine:
//! the rawtext mode (everything inside `<script>`, `<style>`, and friends
//! up to the matching close tag) depends on a tag name stored at runtime,
//! which rules out a table- or regex-driven lexer.
//!
//! Errors do not stop the tokenizer: an error token carries its message,
//! the state resets to `Text`, and lexing continues. Consumers decide how
//! to react; the parser treats the first error token as fatal.

use crate::span::Position;
use std::ops::Range;

/// Tag names whose content is lexed verbatim until the matching end tag.
pub const RAWTEXT_ELEMENTS: [&str; 5] = ["textarea", "title", "script", "style", "template"];

/// The kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Doctype,
    StartTag,
    EndTag,
    SelfClosingTag,
    Text,
    Comment,
    Error,
}

/// An attribute on a tag token. `value` is `None` for boolean
/// (valueless) attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// A lexical token. Tag tokens carry the tag name in `value`; text,
/// comment, and error tokens carry their text or message there. `raw`
/// is the byte range of the token in the source, which the parser uses
/// to recover attribute spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub attributes: Vec<Attribute>,
    pub start: Position,
    pub end: Position,
    pub raw: Range<usize>,
}

/// Tokenizer states, one per lexical context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    StartTagName,
    EndTagOpen,
    EndTagName,
    AfterEndTagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValueDoubleQuote,
    AttrValueSingleQuote,
    SelfClosing,
    MarkupDeclaration,
    Comment,
    Doctype,
    BeforeDoctypeName,
    DoctypeName,
    RawtextData,
}

fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

fn is_tag_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

fn is_attr_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_'
}

fn is_whitespace(c: u8) -> bool {
    c.is_ascii_whitespace()
}

/// Tokenize a whole template source.
pub fn tokenize(input: &str) -> Vec<Token> {
    Tokenizer::new(input).run()
}

/// The Hop tokenizer. Positions advance per byte; `\n` starts a new line.
///
/// Token and attribute values accumulate as raw bytes and convert to
/// strings at token boundaries, so multibyte text survives the
/// byte-driven state machine intact.
pub struct Tokenizer<'src> {
    input: &'src [u8],
    state: State,
    pos: Position,
    offset: usize,
    tokens: Vec<Token>,
    current: Token,
    /// Bytes of the current token's value (tag name or text run).
    value: Vec<u8>,
    current_attr: Option<Attribute>,
    /// Bytes of the current attribute's value; `Some` once a quote has
    /// opened, so an empty quoted value is still a value.
    attr_value: Option<Vec<u8>>,
    doctype_name: String,
    stored_tag_name: String,
}

impl<'src> Tokenizer<'src> {
    pub fn new(input: &'src str) -> Self {
        Self {
            input: input.as_bytes(),
            state: State::Text,
            pos: Position::default(),
            offset: 0,
            tokens: Vec::new(),
            current: Token {
                kind: TokenKind::Text,
                value: String::new(),
                attributes: Vec::new(),
                start: Position::default(),
                end: Position::default(),
                raw: 0..0,
            },
            value: Vec::new(),
            current_attr: None,
            attr_value: None,
            doctype_name: String::new(),
            stored_tag_name: String::new(),
        }
    }

    fn peek(&self) -> u8 {
        self.input[self.offset]
    }

    /// Consume the next byte and advance the position.
    fn advance(&mut self) -> u8 {
        let c = self.input[self.offset];
        self.offset += 1;
        self.pos.advance(c);
        c
    }

    /// Consume the next byte into the current token's value.
    fn consume_into_value(&mut self) {
        let c = self.advance();
        self.value.push(c);
    }

    fn value_str(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Start a fresh token at the current position.
    fn init_token(&mut self) {
        self.value.clear();
        self.current = Token {
            kind: TokenKind::Text,
            value: String::new(),
            attributes: Vec::new(),
            start: self.pos,
            end: self.pos,
            raw: self.offset..self.offset,
        };
    }

    /// Finish the current token and start a fresh one in its place.
    /// Error and doctype tokens set their value directly; everything
    /// else takes the accumulated value bytes.
    fn push_token(&mut self) {
        if self.current.value.is_empty() && !self.value.is_empty() {
            self.current.value = self.value_str();
        }
        self.value.clear();
        self.current.end = self.pos;
        self.current.raw.end = self.offset;
        let token = std::mem::replace(
            &mut self.current,
            Token {
                kind: TokenKind::Text,
                value: String::new(),
                attributes: Vec::new(),
                start: self.pos,
                end: self.pos,
                raw: self.offset..self.offset,
            },
        );
        self.tokens.push(token);
    }

    fn init_attr(&mut self) {
        self.current_attr = Some(Attribute {
            name: String::new(),
            value: None,
        });
        self.attr_value = None;
    }

    fn push_attr(&mut self) {
        if let Some(mut attr) = self.current_attr.take() {
            attr.value = self
                .attr_value
                .take()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            self.current.attributes.push(attr);
        }
        self.attr_value = None;
    }

    fn attr_name_push(&mut self, c: u8) {
        if let Some(attr) = self.current_attr.as_mut() {
            attr.name.push(c as char);
        }
    }

    /// Turn the current token into an error token and reset to `Text`.
    fn push_error(&mut self, message: &str) {
        self.value.clear();
        self.current.kind = TokenKind::Error;
        self.current.value = message.to_string();
        self.push_token();
        self.state = State::Text;
    }

    fn is_rawtext_tag(&self) -> bool {
        let name = self.value_str().to_ascii_lowercase();
        RAWTEXT_ELEMENTS.contains(&name.as_str())
    }

    /// The `>` of an open tag has been consumed: emit the token and pick
    /// the follow state (rawtext for the special tag names).
    fn finish_open_tag(&mut self) {
        if self.current.kind == TokenKind::StartTag && self.is_rawtext_tag() {
            self.stored_tag_name = self.value_str();
            self.push_token();
            self.state = State::RawtextData;
        } else {
            self.push_token();
            self.state = State::Text;
        }
    }

    fn rest(&self) -> &[u8] {
        &self.input[self.offset..]
    }

    fn rest_starts_with_ignore_case(&self, prefix: &str) -> bool {
        let rest = self.rest();
        rest.len() >= prefix.len()
            && rest[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }

    /// In rawtext, check for the case-insensitive `</name>` of the tag
    /// that opened the rawtext section.
    fn at_rawtext_end_tag(&self) -> bool {
        let expected = format!("</{}>", self.stored_tag_name);
        self.rest_starts_with_ignore_case(&expected)
    }

    /// Run the state machine over the whole input.
    pub fn run(mut self) -> Vec<Token> {
        self.init_token();

        while self.offset < self.input.len() {
            let c = self.peek();

            match self.state {
                State::Text => {
                    if c == b'<' {
                        if !self.value.is_empty() {
                            self.push_token();
                        }
                        self.init_token();
                        self.advance();
                        self.state = State::TagOpen;
                    } else {
                        self.consume_into_value();
                    }
                }

                State::TagOpen => {
                    if is_letter(c) {
                        self.current.kind = TokenKind::StartTag;
                        self.consume_into_value();
                        self.state = State::StartTagName;
                    } else if c == b'/' {
                        self.current.kind = TokenKind::EndTag;
                        self.advance();
                        self.state = State::EndTagOpen;
                    } else if c == b'!' {
                        self.advance();
                        self.state = State::MarkupDeclaration;
                    } else {
                        self.advance();
                        self.push_error("Invalid character after '<'");
                    }
                }

                State::StartTagName => {
                    if is_tag_name_char(c) {
                        self.consume_into_value();
                    } else if is_whitespace(c) {
                        self.advance();
                        self.state = State::BeforeAttrName;
                    } else if c == b'>' {
                        self.advance();
                        self.finish_open_tag();
                    } else if c == b'/' {
                        self.current.kind = TokenKind::SelfClosingTag;
                        self.advance();
                        self.state = State::SelfClosing;
                    } else {
                        self.advance();
                        self.push_error("Invalid character in tag name");
                    }
                }

                State::EndTagOpen => {
                    if is_letter(c) {
                        self.consume_into_value();
                        self.state = State::EndTagName;
                    } else {
                        self.advance();
                        self.push_error("Expected tag name after '</'");
                    }
                }

                State::EndTagName => {
                    if is_tag_name_char(c) {
                        self.consume_into_value();
                    } else if c == b'>' {
                        self.advance();
                        self.push_token();
                        self.state = State::Text;
                    } else if is_whitespace(c) {
                        self.advance();
                        self.state = State::AfterEndTagName;
                    } else {
                        self.advance();
                        self.push_error("Invalid character in end tag name");
                    }
                }

                State::AfterEndTagName => {
                    if is_whitespace(c) {
                        self.advance();
                    } else if c == b'>' {
                        self.advance();
                        self.push_token();
                        self.state = State::Text;
                    } else {
                        self.advance();
                        self.push_error("Expected '>' after end tag name");
                    }
                }

                State::BeforeAttrName => {
                    if is_whitespace(c) {
                        self.advance();
                    } else if is_letter(c) {
                        self.init_attr();
                        let c = self.advance();
                        self.attr_name_push(c);
                        self.state = State::AttrName;
                    } else if c == b'/' {
                        self.current.kind = TokenKind::SelfClosingTag;
                        self.advance();
                        self.state = State::SelfClosing;
                    } else if c == b'>' {
                        self.advance();
                        self.finish_open_tag();
                    } else {
                        self.advance();
                        self.push_error("Invalid character before attribute name");
                    }
                }

                State::AttrName => {
                    if is_attr_name_char(c) {
                        let c = self.advance();
                        self.attr_name_push(c);
                    } else if is_whitespace(c) {
                        self.advance();
                        self.state = State::AfterAttrName;
                    } else if c == b'=' {
                        self.advance();
                        self.state = State::BeforeAttrValue;
                    } else if c == b'>' {
                        self.push_attr();
                        self.advance();
                        self.finish_open_tag();
                    } else if c == b'/' {
                        self.push_attr();
                        self.current.kind = TokenKind::SelfClosingTag;
                        self.advance();
                        self.state = State::SelfClosing;
                    } else {
                        self.advance();
                        self.push_error("Invalid character in attribute name");
                    }
                }

                State::AfterAttrName => {
                    if is_whitespace(c) {
                        self.advance();
                    } else if c == b'=' {
                        self.advance();
                        self.state = State::BeforeAttrValue;
                    } else if is_letter(c) {
                        // The previous attribute was boolean; this letter
                        // starts the next one.
                        self.push_attr();
                        self.init_attr();
                        let c = self.advance();
                        self.attr_name_push(c);
                        self.state = State::AttrName;
                    } else if c == b'/' {
                        self.push_attr();
                        self.current.kind = TokenKind::SelfClosingTag;
                        self.advance();
                        self.state = State::SelfClosing;
                    } else if c == b'>' {
                        self.push_attr();
                        self.advance();
                        self.finish_open_tag();
                    } else {
                        self.advance();
                        self.push_error("Expected '=' after attribute name");
                    }
                }

                State::BeforeAttrValue => {
                    if is_whitespace(c) {
                        self.advance();
                    } else if c == b'"' {
                        self.advance();
                        self.attr_value = Some(Vec::new());
                        self.state = State::AttrValueDoubleQuote;
                    } else if c == b'\'' {
                        self.advance();
                        self.attr_value = Some(Vec::new());
                        self.state = State::AttrValueSingleQuote;
                    } else {
                        self.advance();
                        self.push_error("Expected quoted attribute value");
                    }
                }

                State::AttrValueDoubleQuote => {
                    if c == b'"' {
                        self.advance();
                        self.push_attr();
                        self.state = State::BeforeAttrName;
                    } else {
                        let c = self.advance();
                        if let Some(buffer) = self.attr_value.as_mut() {
                            buffer.push(c);
                        }
                    }
                }

                State::AttrValueSingleQuote => {
                    if c == b'\'' {
                        self.advance();
                        self.push_attr();
                        self.state = State::BeforeAttrName;
                    } else {
                        let c = self.advance();
                        if let Some(buffer) = self.attr_value.as_mut() {
                            buffer.push(c);
                        }
                    }
                }

                State::SelfClosing => {
                    if c == b'>' {
                        self.advance();
                        self.push_token();
                        self.state = State::Text;
                    } else {
                        self.advance();
                        self.push_error("Expected '>' after '/'");
                    }
                }

                State::MarkupDeclaration => {
                    if self.rest().starts_with(b"--") {
                        self.current.kind = TokenKind::Comment;
                        self.advance();
                        self.advance();
                        self.state = State::Comment;
                    } else if self.rest_starts_with_ignore_case("DOCTYPE") {
                        self.current.kind = TokenKind::Doctype;
                        for _ in 0.."DOCTYPE".len() {
                            self.advance();
                        }
                        self.state = State::Doctype;
                    } else {
                        self.advance();
                        self.push_error("Invalid markup declaration");
                    }
                }

                State::Comment => {
                    if self.rest().starts_with(b"-->") {
                        self.advance();
                        self.advance();
                        self.advance();
                        self.push_token();
                        self.state = State::Text;
                    } else {
                        self.consume_into_value();
                    }
                }

                State::Doctype => {
                    if is_whitespace(c) {
                        self.advance();
                        self.state = State::BeforeDoctypeName;
                    } else {
                        self.advance();
                        self.push_error("Expected whitespace after DOCTYPE");
                    }
                }

                State::BeforeDoctypeName => {
                    if is_whitespace(c) {
                        self.advance();
                    } else if is_letter(c) {
                        self.doctype_name.clear();
                        let c = self.advance();
                        self.doctype_name.push(c as char);
                        self.state = State::DoctypeName;
                    } else {
                        self.advance();
                        self.push_error("Expected DOCTYPE name");
                    }
                }

                State::DoctypeName => {
                    if is_letter(c) {
                        let c = self.advance();
                        self.doctype_name.push(c as char);
                    } else if c == b'>' {
                        if self.doctype_name.eq_ignore_ascii_case("html") {
                            self.current.value = self.doctype_name.clone();
                            self.advance();
                            self.push_token();
                            self.state = State::Text;
                        } else {
                            self.advance();
                            self.push_error("Invalid DOCTYPE name");
                        }
                    } else {
                        self.advance();
                        self.push_error("Invalid character in DOCTYPE name");
                    }
                }

                State::RawtextData => {
                    if self.at_rawtext_end_tag() {
                        if !self.value.is_empty() {
                            self.push_token();
                        }

                        let end_tag_start = self.pos;
                        let raw_start = self.offset;
                        let tag_length = self.stored_tag_name.len() + 3;
                        for _ in 0..tag_length {
                            self.advance();
                        }
                        self.tokens.push(Token {
                            kind: TokenKind::EndTag,
                            value: self.stored_tag_name.clone(),
                            attributes: Vec::new(),
                            start: end_tag_start,
                            end: self.pos,
                            raw: raw_start..self.offset,
                        });

                        self.init_token();
                        self.state = State::Text;
                    } else {
                        self.consume_into_value();
                    }
                }
            }
        }

        if !self.value.is_empty() {
            self.push_token();
        }

        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    /// Format a token the way failure output is easiest to read:
    /// `Kind(value) line:col-line:col`.
    fn describe(t: &Token) -> String {
        match t.kind {
            TokenKind::StartTag | TokenKind::EndTag | TokenKind::SelfClosingTag => format!(
                "{:?}({}) {}:{}-{}:{}",
                t.kind, t.value, t.start.line, t.start.column, t.end.line, t.end.column
            ),
            TokenKind::Error => format!("Error({})", t.value),
            _ => format!(
                "{:?} {}:{}-{}:{}",
                t.kind, t.start.line, t.start.column, t.end.line, t.end.column
            ),
        }
    }

    fn describe_all(input: &str) -> Vec<String> {
        tokenize(input).iter().map(describe).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("hello world");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].value, "hello world");
    }

    #[test]
    fn test_multibyte_text_survives() {
        let tokens = tokenize("<p>héllo — wörld</p>");
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens[1].value, "héllo — wörld");
    }

    #[test]
    fn test_multibyte_attribute_value() {
        let tokens = tokenize(r#"<p title="café"></p>"#);
        assert_eq!(tokens[0].attributes, vec![Attribute::new("title", "café")]);
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            describe_all("<div>hello</div>"),
            vec!["StartTag(div) 1:1-1:6", "Text 1:6-1:11", "EndTag(div) 1:11-1:17"]
        );
    }

    #[test]
    fn test_positions_across_lines() {
        assert_eq!(
            describe_all("<div>\n  hi\n</div>"),
            vec!["StartTag(div) 1:1-1:6", "Text 1:6-3:1", "EndTag(div) 3:1-3:7"]
        );
    }

    #[test]
    fn test_attributes() {
        let tokens = tokenize(r#"<div class="foo" id='bar'></div>"#);
        assert_eq!(tokens[0].kind, TokenKind::StartTag);
        assert_eq!(
            tokens[0].attributes,
            vec![Attribute::new("class", "foo"), Attribute::new("id", "bar")]
        );
    }

    #[test]
    fn test_empty_attribute_value() {
        let tokens = tokenize(r#"<div class=""></div>"#);
        assert_eq!(tokens[0].attributes, vec![Attribute::new("class", "")]);
    }

    #[test]
    fn test_boolean_attribute() {
        let tokens = tokenize("<input disabled>");
        assert_eq!(tokens[0].attributes, vec![Attribute::boolean("disabled")]);
    }

    #[test]
    fn test_consecutive_boolean_attributes() {
        let tokens = tokenize("<input disabled required>");
        assert_eq!(
            tokens[0].attributes,
            vec![Attribute::boolean("disabled"), Attribute::boolean("required")]
        );
    }

    #[test]
    fn test_boolean_attribute_then_valued() {
        let tokens = tokenize(r#"<input disabled class="x">"#);
        assert_eq!(
            tokens[0].attributes,
            vec![Attribute::boolean("disabled"), Attribute::new("class", "x")]
        );
    }

    #[test]
    fn test_spaces_around_equals() {
        let tokens = tokenize(r#"<div class = "foo"></div>"#);
        assert_eq!(tokens[0].attributes, vec![Attribute::new("class", "foo")]);
    }

    #[test]
    fn test_self_closing_tag() {
        assert_eq!(
            describe_all(r#"<import from="card" function="card"/>"#),
            vec!["SelfClosingTag(import) 1:1-1:38"]
        );
    }

    #[test]
    fn test_unquoted_attribute_value_is_error() {
        let tokens = tokenize("<div class=foo></div>");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].value, "Expected quoted attribute value");
    }

    #[test]
    fn test_invalid_character_after_open_angle() {
        let tokens = tokenize("<1div>");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].value, "Invalid character after '<'");
    }

    #[test]
    fn test_lexing_continues_after_error() {
        let kinds = kinds("<?bad>ok<div></div>");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Error,
                TokenKind::Text,
                TokenKind::StartTag,
                TokenKind::EndTag
            ]
        );
    }

    #[test]
    fn test_comment() {
        let tokens = tokenize("<!-- a < b -->");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].value, " a < b ");
        assert_eq!(tokens[0].start, Position::new(1, 1));
        assert_eq!(tokens[0].end, Position::new(1, 15));
    }

    #[test]
    fn test_doctype() {
        let tokens = tokenize("<!DOCTYPE html>");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Doctype);
        assert_eq!(tokens[0].value, "html");
    }

    #[test]
    fn test_doctype_case_insensitive() {
        let tokens = tokenize("<!doctype HTML>");
        assert_eq!(tokens[0].kind, TokenKind::Doctype);
    }

    #[test]
    fn test_invalid_doctype_name() {
        let tokens = tokenize("<!DOCTYPE xml>");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].value, "Invalid DOCTYPE name");
    }

    #[test]
    fn test_rawtext_script() {
        assert_eq!(
            describe_all(r#"<script>let a = "<div>"</script>"#),
            vec![
                "StartTag(script) 1:1-1:9",
                "Text 1:9-1:24",
                "EndTag(script) 1:24-1:33"
            ]
        );
        let tokens = tokenize(r#"<script>let a = "<div>"</script>"#);
        assert_eq!(tokens[1].value, r#"let a = "<div>""#);
    }

    #[test]
    fn test_rawtext_end_tag_case_insensitive() {
        let tokens = tokenize("<style>a { }</STYLE>");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::StartTag, TokenKind::Text, TokenKind::EndTag]
        );
        assert_eq!(tokens[2].value, "style");
    }

    #[test]
    fn test_rawtext_ignores_other_close_tags() {
        let tokens = tokenize("<script></div></script>");
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens[1].value, "</div>");
    }

    #[test]
    fn test_raw_byte_ranges() {
        let src = r#"<div class="foo">x</div>"#;
        let tokens = tokenize(src);
        assert_eq!(&src[tokens[0].raw.clone()], r#"<div class="foo">"#);
        assert_eq!(&src[tokens[1].raw.clone()], "x");
        assert_eq!(&src[tokens[2].raw.clone()], "</div>");
    }

    #[test]
    fn test_end_tag_with_trailing_whitespace() {
        let tokens = tokenize("<div>x</div >");
        assert_eq!(tokens[2].kind, TokenKind::EndTag);
        assert_eq!(tokens[2].value, "div");
    }

    #[test]
    fn test_token_spans_are_ordered() {
        let src = "<div class=\"a\">x<br>\n<em>y</em></div>";
        for t in tokenize(src) {
            let ordered = t.start.line < t.end.line
                || (t.start.line == t.end.line && t.start.column <= t.end.column);
            assert!(ordered, "span out of order in {:?}", t);
        }
    }

    #[test]
    fn test_digits_allowed_in_attribute_names() {
        let tokens = tokenize(r#"<div data2="x"></div>"#);
        assert_eq!(tokens[0].attributes, vec![Attribute::new("data2", "x")]);
    }
}
