//! Path expression parsing
//!
//! Attribute values used as lookups are paths like `a.b[0].c`: dotted
//! segments denote field access, bracketed segments denote array
//! indexing. The grammar is regular, so a `logos` lexer drives it.

use logos::Logos;

/// One component of a path, with a flag for whether it is an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPart {
    pub value: String,
    pub is_array_ref: bool,
}

impl PathPart {
    pub fn field(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_array_ref: false,
        }
    }

    pub fn index(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_array_ref: true,
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"\.")]
enum PathToken {
    /// A segment between dots or at the start/end of the path.
    #[regex(r"[^.\[\]]+")]
    Segment,

    /// Anything in square brackets.
    #[regex(r"\[[^\]]+\]")]
    Index,
}

/// Split a path string into its parts.
///
/// ```
/// use hop::path::{parse_path, PathPart};
///
/// assert_eq!(
///     parse_path("foo.bar[0]"),
///     vec![
///         PathPart::field("foo"),
///         PathPart::field("bar"),
///         PathPart::index("0"),
///     ]
/// );
/// ```
///
/// Unmatchable input bytes are skipped; callers reject empty results and
/// leading array refs.
pub fn parse_path(path: &str) -> Vec<PathPart> {
    let mut lexer = PathToken::lexer(path);
    let mut parts = Vec::new();

    while let Some(token) = lexer.next() {
        match token {
            Ok(PathToken::Segment) => parts.push(PathPart::field(lexer.slice())),
            Ok(PathToken::Index) => {
                let slice = lexer.slice();
                parts.push(PathPart::index(&slice[1..slice.len() - 1]));
            }
            Err(()) => {}
        }
    }

    parts
}
