//! AST-backed analysis of Go source files.
//!
//! Every analyzer goes through this module to turn raw source into a
//! tree-sitter tree and to pull out the few structural facts it needs:
//!
//! - Function and method declarations with their spans
//! - Control flow decision points for cyclomatic complexity
//! - The import table, so rules can tell `math/rand` from `crypto/rand`
//! - Line text and snippets for issue reporting
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ Go source   │────▶│ go::parse    │────▶│ ParsedSource     │
//! └─────────────┘     └──────────────┘     │ (tree + lines)   │
//!                                          └──────────────────┘
//!                                                   │
//!                          ┌────────────────────────┼───────────────┐
//!                          ▼                        ▼               ▼
//!                   go::functions          go::control_flow   RuleEngine
//! ```

mod facts;
pub mod go;
mod source;

pub use facts::{ControlFlowInfo, FunctionDecl, FunctionKind, Span};
pub use go::AnalysisError;
pub use source::{truncate_snippet, ParsedSource, SNIPPET_MAX_CHARS};
