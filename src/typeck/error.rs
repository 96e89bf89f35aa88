//! Type error definitions
//!
//! A type error carries the source span of the offending node or
//! attribute together with its message. The checker stops at the first
//! error.

use crate::parser::Element;
use crate::span::Span;
use thiserror::Error;

/// Result type for typechecking operations
pub type TypeResult<T> = Result<T, TypeError>;

/// A type mismatch or related fault in template usage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{span}: type error: {message}")]
pub struct TypeError {
    pub span: Span,
    pub message: String,
}

impl TypeError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    /// An error anchored at the whole element.
    pub fn for_node(element: &Element, message: impl Into<String>) -> Self {
        Self::new(element.span(), message)
    }

    /// An error anchored at one attribute: the attribute's value span
    /// when it has one, its name span otherwise, the node span as a
    /// last resort.
    pub fn for_attr(element: &Element, attr: &str, message: impl Into<String>) -> Self {
        Self::new(element.attr_span(attr), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::span::Position;

    #[test]
    fn test_attr_error_uses_value_span() {
        let root = parse(r#"<if true="x"></if>"#).unwrap();
        let el = root.children[0].as_element().unwrap();
        let err = TypeError::for_attr(el, "true", "condition must be boolean");
        assert_eq!(err.span.start, Position::new(1, 11));
        assert_eq!(err.span.end, Position::new(1, 12));
    }

    #[test]
    fn test_rendering() {
        let err = TypeError::new(
            Span::new(Position::new(1, 11), Position::new(1, 12)),
            "condition must be boolean: cannot unify number with boolean",
        );
        assert_eq!(
            err.to_string(),
            "line 1, column 11-line 1, column 12: type error: \
             condition must be boolean: cannot unify number with boolean"
        );
    }
}
