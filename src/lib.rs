//! Hop template language compiler and runtime
//!
//! Hop is a multi-module template language: HTML-like sources with
//! embedded control-flow and function-call directives, compiled into an
//! in-memory program and rendered against arbitrary structured input
//! data.
//!
//! # Architecture
//!
//! ```text
//! template source
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Tokenizer  │  → position-tagged tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → node tree per module
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Topological │  → modules and functions in
//! │    sort     │    dependency order
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Typechecker │  → inferred parameter types
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Evaluator  │  → HTML output stream
//! └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use hop::Compiler;
//!
//! let mut compiler = Compiler::new();
//! compiler.add_module(
//!     "main",
//!     r#"<function name="main" params-as="items"><for each="items" as="i"><div inner-text="i.title"></div></for></function>"#,
//! );
//! let program = compiler.compile().unwrap();
//!
//! let mut out = Vec::new();
//! let data = serde_json::json!([{"title": "foo"}, {"title": "bar"}]);
//! program.execute_value(&mut out, "main", "main", &data).unwrap();
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "<div>foo</div><div>bar</div>"
//! );
//! ```

pub mod compiler;
pub mod error;
pub mod eval;
pub mod parser;
pub mod path;
pub mod render;
pub mod span;
pub mod tokenizer;
pub mod toposort;
pub mod typeck;

// Re-exports for convenience
pub use compiler::{Compiler, Program};
pub use error::Error;
pub use eval::RuntimeError;
pub use span::{Position, Span};
pub use typeck::ty::Type;

/// The dynamic value universe the evaluator accepts.
pub use serde_json::Value;

/// File extension for Hop template sources
pub const FILE_EXTENSION: &str = "hop";
