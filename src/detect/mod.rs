//! Go analyzers: complexity metrics and the rule-based security and bug scans.

mod bugs;
mod complexity;
mod engine;
mod security;
mod types;

pub use bugs::{detect_language, BatchStatus, BugDetector, BugReport, FileState, FileStatus};
pub use complexity::{
    function_flags, ComplexityAnalyzer, ComplexityReport, ComplexityStatistics, FunctionResult,
};
pub use engine::{
    list_items, CallTarget, Rule, RuleContext, RuleEngine, RuleMeta, DISABLED_RULES_KEY,
};
pub use security::{SecurityReport, SecurityScanner};
pub use types::{deduplicate, Confidence, Issue, IssueStatistics, Severity};

/// Registry names of the built-in analyzers.
pub mod names {
    pub use super::bugs::NAME as BUG_DETECTOR;
    pub use super::complexity::NAME as COMPLEXITY_ANALYZER;
    pub use super::security::NAME as SECURITY_SCANNER;
}
