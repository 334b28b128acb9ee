//! Bug detector: common Go bug patterns over one source or a batch of files.
//!
//! Single-source input is scanned directly. File lists and directories are
//! analysed file by file in parallel; a file that cannot be read or parsed
//! is recorded in `error_files` and the rest of the batch proceeds.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tree_sitter::Node;
use walkdir::WalkDir;

use crate::analysis::go;
use crate::tools::{validate_input, InputKind, Tool, ToolContext, ToolError, ToolInput};

use super::engine::{list_items, CallTarget, Rule, RuleContext, RuleEngine, RuleMeta};
use super::{deduplicate, Confidence, Issue, IssueStatistics, Severity};

/// Registry name of the bug detector.
pub const NAME: &str = "bug_detector";

const DEFAULT_FILE: &str = "input.go";

const ERROR_PRONE_PREFIXES: &[&str] = &["Read", "Write", "Open", "Create", "Get", "Post"];

const FILE_OPEN_FUNCS: &[&str] = &["Open", "Create", "OpenFile", "WriteFile"];

const RECOMMENDATIONS: &[&str] = &[
    "Run `go build ./...` to catch compile errors",
    "Run `go vet ./...` for type-aware checks",
    "Run `go fmt ./...` to normalise formatting",
];

/// Map a file extension to a language name.
pub fn detect_language(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "go" => "go",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "rs" => "rust",
        "rb" => "ruby",
        "php" => "php",
        _ => "unknown",
    }
}

// =============================================================================
// Rules
// =============================================================================

static IGNORED_ERROR: RuleMeta = RuleMeta {
    id: "B101",
    name: "Ignored Error Return Value",
    severity: Severity::High,
    category: "Error Handling",
    description: "Error return value discarded with `_`",
    suggestion: "Check the error:\nf, err := os.Open(\"file.txt\")\nif err != nil {\n    return err\n}",
    confidence: Some(Confidence::High),
};

/// `_` on the left of an assignment whose value is an error-returning call.
struct IgnoredError;

impl IgnoredError {
    fn returns_error(call: Node, ctx: &RuleContext) -> bool {
        match ctx.call_target(call) {
            CallTarget::Selector { operand, .. } => matches!(operand, "os" | "http" | "ioutil"),
            CallTarget::Ident(name) => ERROR_PRONE_PREFIXES.iter().any(|p| name.starts_with(p)),
            CallTarget::Other => false,
        }
    }
}

impl Rule for IgnoredError {
    fn meta(&self) -> &'static RuleMeta {
        &IGNORED_ERROR
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        if !matches!(node.kind(), "short_var_declaration" | "assignment_statement") {
            return false;
        }
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return false;
        };
        if !list_items(left).iter().any(|n| ctx.text(*n) == "_") {
            return false;
        }
        list_items(right)
            .first()
            .is_some_and(|first| first.kind() == "call_expression" && Self::returns_error(*first, ctx))
    }
}

static RESOURCE_NOT_CLOSED: RuleMeta = RuleMeta {
    id: "B102",
    name: "Resource Not Closed",
    severity: Severity::High,
    category: "Resource Management",
    description: "File opened without a visible deferred Close",
    suggestion: "Release the handle with defer:\nf, err := os.Open(\"file.txt\")\nif err != nil {\n    return err\n}\ndefer f.Close()",
    confidence: Some(Confidence::Medium),
};

/// Any `os.Open`-style call. Heuristic: the matching Close is not looked for.
struct ResourceNotClosed;

impl Rule for ResourceNotClosed {
    fn meta(&self) -> &'static RuleMeta {
        &RESOURCE_NOT_CLOSED
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        node.kind() == "call_expression"
            && matches!(
                ctx.call_target(node),
                CallTarget::Selector { operand: "os", field } if FILE_OPEN_FUNCS.contains(&field)
            )
    }
}

static SWITCH_WITHOUT_DEFAULT: RuleMeta = RuleMeta {
    id: "B103",
    name: "Switch Without Default",
    severity: Severity::Low,
    category: "Control Flow",
    description: "switch statement has no default branch",
    suggestion: "Add a default branch for unexpected values:\nswitch x {\ncase 1:\n    ...\ndefault:\n    ...\n}",
    confidence: Some(Confidence::High),
};

/// Expression switch whose own case list has no `default:`.
struct SwitchWithoutDefault;

impl Rule for SwitchWithoutDefault {
    fn meta(&self) -> &'static RuleMeta {
        &SWITCH_WITHOUT_DEFAULT
    }

    fn matches(&self, node: Node, _ctx: &RuleContext) -> bool {
        if node.kind() != "expression_switch_statement" {
            return false;
        }
        let mut cursor = node.walk();
        let has_default = node
            .named_children(&mut cursor)
            .any(|child| child.kind() == "default_case");
        !has_default
    }
}

static POTENTIAL_NIL_POINTER: RuleMeta = RuleMeta {
    id: "B104",
    name: "Potential Nil Pointer Dereference",
    severity: Severity::Medium,
    category: "Null Safety",
    description: "Method called on a value that may be nil",
    suggestion: "Guard the receiver:\nif ptr != nil {\n    ptr.Method()\n}",
    confidence: Some(Confidence::Low),
};

/// Every call through a selector. Heuristic without nil provenance.
struct PotentialNilPointer;

impl Rule for PotentialNilPointer {
    fn meta(&self) -> &'static RuleMeta {
        &POTENTIAL_NIL_POINTER
    }

    fn matches(&self, node: Node, _ctx: &RuleContext) -> bool {
        node.kind() == "call_expression"
            && node
                .child_by_field_name("function")
                .is_some_and(|f| f.kind() == "selector_expression")
    }
}

// =============================================================================
// Report
// =============================================================================

/// Overall outcome of a bug scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Every Go file was analysed.
    Success,
    /// Some Go files failed.
    Partial,
    /// Every Go file failed.
    Error,
}

/// Per-file state for files that were not analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Skipped,
    Error,
}

/// A file that was skipped or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub language: String,
    pub status: FileState,
    pub reason: String,
}

impl FileStatus {
    fn skipped(path: &Path, language: &str) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            language: language.to_string(),
            status: FileState::Skipped,
            reason: "the bug detector only supports Go".to_string(),
        }
    }

    fn error(path: &Path, reason: String) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            language: "go".to_string(),
            status: FileState::Error,
            reason,
        }
    }
}

/// Bug scan payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugReport {
    pub language: String,
    pub status: BatchStatus,
    pub total_files: usize,
    pub analyzed_files: usize,
    pub skipped_files: Vec<FileStatus>,
    pub error_files: Vec<FileStatus>,
    pub total: usize,
    pub issues: Vec<Issue>,
    pub summary: String,
    pub statistics: IssueStatistics,
    pub recommendations: Vec<String>,
}

/// Files gathered from a batch input.
#[derive(Debug, Default)]
struct Collected {
    go_files: Vec<PathBuf>,
    skipped: Vec<FileStatus>,
    /// Listed files that do not exist and entries the walk could not read.
    failed: Vec<FileStatus>,
}

// =============================================================================
// Detector
// =============================================================================

/// Rule-engine backed bug detector.
pub struct BugDetector {
    engine: RuleEngine,
    excluded: Option<GlobSet>,
}

impl BugDetector {
    pub fn new() -> Self {
        Self {
            engine: RuleEngine::new(
                "bug",
                vec![
                    Box::new(IgnoredError),
                    Box::new(ResourceNotClosed),
                    Box::new(SwitchWithoutDefault),
                    Box::new(PotentialNilPointer),
                ],
            ),
            excluded: None,
        }
    }

    /// Skip paths matching any of these globs during directory walks.
    pub fn excluded_paths(mut self, patterns: &[String]) -> Result<Self, globset::Error> {
        if patterns.is_empty() {
            self.excluded = None;
            return Ok(self);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.excluded = Some(builder.build()?);
        Ok(self)
    }

    /// The underlying rule set.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.as_ref().is_some_and(|set| set.is_match(path))
    }

    /// Parse and scan one in-memory source.
    pub fn analyze_source(
        &self,
        ctx: &ToolContext,
        code: &str,
        file: &str,
    ) -> Result<Vec<Issue>, ToolError> {
        let parsed = go::parse(file, code)?;
        self.engine.scan(&parsed, ctx)
    }

    fn analyze_file(&self, ctx: &ToolContext, path: &Path) -> Result<Vec<Issue>, ToolError> {
        ctx.check()?;
        let code = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Execution(format!("failed to read file: {}", e)))?;
        self.analyze_source(ctx, &code, &path.to_string_lossy())
    }

    /// Run over any accepted input and build the report.
    pub fn analyze(&self, ctx: &ToolContext, input: &ToolInput) -> Result<BugReport, ToolError> {
        if let ToolInput::Source { code, file } = input {
            let issues = self.analyze_source(ctx, code, file.as_deref().unwrap_or(DEFAULT_FILE))?;
            return Ok(build_report(1, 1, Vec::new(), Vec::new(), issues));
        }

        let collected = self.collect(input);
        let candidates = collected.go_files.len() + collected.failed.len();
        if candidates == 0 {
            return Ok(empty_report(collected.skipped));
        }

        let outcomes: Vec<(usize, &PathBuf, Result<Vec<Issue>, ToolError>)> = collected
            .go_files
            .par_iter()
            .enumerate()
            .map(|(index, path)| (index, path, self.analyze_file(ctx, path)))
            .collect();

        let mut issues = Vec::new();
        let mut errors = collected.failed;
        for (index, path, outcome) in outcomes {
            match outcome {
                Ok(found) => issues.extend(found.into_iter().map(|mut issue| {
                    issue.id = batch_issue_id(&issue.id, index);
                    issue
                })),
                Err(err) if err.is_terminal() => return Err(err),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping file");
                    errors.push(FileStatus::error(path, err.to_string()));
                }
            }
        }

        let analyzed = candidates - errors.len();
        debug!(
            files = candidates,
            analyzed,
            skipped = collected.skipped.len(),
            "bug scan finished"
        );
        Ok(build_report(
            candidates,
            analyzed,
            collected.skipped,
            errors,
            deduplicate(issues),
        ))
    }

    fn collect(&self, input: &ToolInput) -> Collected {
        let mut collected = Collected::default();
        match input {
            ToolInput::Source { .. } => {}
            ToolInput::Files { paths } => {
                for path in paths {
                    match detect_language(path) {
                        "go" if path.is_file() => collected.go_files.push(path.clone()),
                        "go" => collected
                            .failed
                            .push(FileStatus::error(path, "file not found".to_string())),
                        lang => collected.skipped.push(FileStatus::skipped(path, lang)),
                    }
                }
            }
            ToolInput::Directory { path } => {
                let walker = WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| {
                        if e.depth() == 0 {
                            return true;
                        }
                        let hidden = e.file_name().to_string_lossy().starts_with('.');
                        !(e.file_type().is_dir() && hidden) && !self.is_excluded(e.path())
                    });
                for entry in walker {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            let at = err.path().unwrap_or(path.as_path()).to_path_buf();
                            warn!(path = %at.display(), error = %err, "cannot walk entry");
                            collected.failed.push(FileStatus::error(&at, err.to_string()));
                            continue;
                        }
                    };
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    match detect_language(entry.path()) {
                        "go" => collected.go_files.push(entry.into_path()),
                        "unknown" => {}
                        lang => collected.skipped.push(FileStatus::skipped(entry.path(), lang)),
                    }
                }
            }
        }
        collected
    }
}

impl Default for BugDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Qualify an engine id (`bug-<offset>`) with the file's position in the batch,
/// so equal offsets in different files stay distinct.
fn batch_issue_id(id: &str, index: usize) -> String {
    match id.rsplit_once('-') {
        Some((prefix, offset)) => format!("{}-{}-{}", prefix, index, offset),
        None => format!("{}-{}", id, index),
    }
}

fn build_report(
    candidates: usize,
    analyzed: usize,
    skipped: Vec<FileStatus>,
    errors: Vec<FileStatus>,
    issues: Vec<Issue>,
) -> BugReport {
    let status = if errors.is_empty() {
        BatchStatus::Success
    } else if analyzed == 0 {
        BatchStatus::Error
    } else {
        BatchStatus::Partial
    };
    let statistics = IssueStatistics::from_issues(&issues, false);

    let mut summary = format!(
        "Analyzed {} Go file{}",
        analyzed,
        if analyzed == 1 { "" } else { "s" }
    );
    if issues.is_empty() {
        summary.push_str(", no bugs detected");
    } else {
        summary.push_str(&format!(
            ", detected {} potential bug{} ({})",
            issues.len(),
            if issues.len() == 1 { "" } else { "s" },
            statistics.breakdown()
        ));
    }
    if !errors.is_empty() {
        summary.push_str(&format!(", {} failed", errors.len()));
    }
    if !skipped.is_empty() {
        summary.push_str(&format!(", skipped {} non-Go file(s)", skipped.len()));
    }

    BugReport {
        language: "go".to_string(),
        status,
        total_files: candidates + skipped.len(),
        analyzed_files: analyzed,
        skipped_files: skipped,
        error_files: errors,
        total: issues.len(),
        issues,
        summary,
        statistics,
        recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    }
}

fn empty_report(skipped: Vec<FileStatus>) -> BugReport {
    BugReport {
        language: "go".to_string(),
        status: BatchStatus::Success,
        total_files: skipped.len(),
        analyzed_files: 0,
        skipped_files: skipped,
        error_files: Vec::new(),
        total: 0,
        issues: Vec::new(),
        summary: "No Go files detected".to_string(),
        statistics: IssueStatistics::default(),
        recommendations: vec!["The bug detector only supports Go".to_string()],
    }
}

impl Tool for BugDetector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Detects common Go bugs (ignored errors, leaked files, missing switch defaults, nil calls)"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::SourceOrPaths
    }

    fn validate(&self, input: &ToolInput) -> Result<(), ToolError> {
        validate_input(self.input_kind(), input)?;
        if let ToolInput::Directory { path } = input {
            if !path.is_dir() {
                return Err(ToolError::InvalidInput(format!(
                    "not a directory: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn run(&self, ctx: &ToolContext, input: &ToolInput) -> Result<String, ToolError> {
        let report = self.analyze(ctx, input)?;
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
