//! Goinsight - pluggable Go code-quality toolkit.
//!
//! Three analyzers sit behind one tool contract: a cyclomatic complexity
//! analyzer, a security scanner and a bug detector. Every invocation goes
//! through the [`ToolManager`], which validates input and applies
//! per-tool timeouts and retries.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `analysis`: Go parsing, function and control-flow facts
//! - `detect`: The rule engine and the three analyzers
//! - `tools`: Tool contract, execution context and manager
//! - `config`: YAML settings with environment overrides
//! - `logging`: tracing subscriber setup
//! - `report`: Output formatting (pretty, JSON)
//!
//! # Adding a New Rule
//!
//! Implement [`detect::Rule`] with a static [`detect::RuleMeta`] and add it
//! to the analyzer's engine in `detect/security.rs` or `detect/bugs.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod logging;
pub mod report;
pub mod tools;

pub use config::Settings;
pub use detect::{
    BugDetector, ComplexityAnalyzer, Issue, IssueStatistics, SecurityScanner, Severity,
};
pub use tools::{
    register_builtin, Tool, ToolConfig, ToolContext, ToolError, ToolInput, ToolManager,
    ToolResult,
};
