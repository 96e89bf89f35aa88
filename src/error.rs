//! Crate-wide error type
//!
//! Every failure in compiling or executing a template is one of five
//! disjoint kinds. The first error aborts; there are no warnings or
//! partial results. Errors render as
//! `line L, column C-line L, column C: <kind>: <message>` when a source
//! span applies and `<kind>: <message>` otherwise.

use crate::eval::RuntimeError;
use crate::parser::ParseError;
use crate::span::Span;
use crate::toposort::SortError;
use crate::typeck::error::TypeError;
use thiserror::Error;

/// A compile-time or runtime failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("cycle error: {0}")]
    Cycle(SortError),

    #[error("undefined reference: {0}")]
    UndefinedReference(ReferenceError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// A reference to something that does not exist: a dependency edge into
/// an undeclared module or function, or an import of a function its
/// module does not define.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error(transparent)]
    Dependency(SortError),

    #[error("function '{function}' not found in module '{module}'")]
    ImportedFunction { function: String, module: String },
}

impl From<SortError> for Error {
    fn from(err: SortError) -> Self {
        match err {
            SortError::Cycle { .. } => Error::Cycle(err),
            SortError::UndefinedDependency { .. } => {
                Error::UndefinedReference(ReferenceError::Dependency(err))
            }
        }
    }
}

impl Error {
    /// The kind label used in the rendered form.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "parse error",
            Error::Cycle(_) => "cycle error",
            Error::UndefinedReference(_) => "undefined reference",
            Error::Type(_) => "type error",
            Error::Runtime(_) => "runtime error",
        }
    }

    /// The source span, for the kinds that carry one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(err) => Some(err.span),
            Error::Type(err) => Some(err.span),
            _ => None,
        }
    }
}
