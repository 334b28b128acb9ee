//! Plain data extracted from a parsed Go file.

use serde::Serialize;

/// Source span information, 1-indexed for lines and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1,
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }

    /// Number of source lines covered, inclusive of both ends.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Decision points counted inside one function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlowInfo {
    /// `if` statements.
    pub if_count: usize,
    /// `for` statements, range loops included.
    pub loop_count: usize,
    /// Expression and type switches.
    pub switch_count: usize,
    /// Non-default expression/type cases.
    pub case_count: usize,
    /// `select` statements.
    pub select_count: usize,
    /// Select clauses, default included.
    pub select_clause_count: usize,
    /// `&&` operators.
    pub and_count: usize,
    /// `||` operators.
    pub or_count: usize,
}

impl ControlFlowInfo {
    /// Number of decision points.
    pub fn decision_points(&self) -> usize {
        self.if_count
            + self.loop_count
            + self.switch_count
            + self.case_count
            + self.select_count
            + self.select_clause_count
            + self.and_count
            + self.or_count
    }

    /// Cyclomatic complexity: one baseline path plus every decision point.
    pub fn cyclomatic_complexity(&self) -> u32 {
        1 + self.decision_points() as u32
    }
}

/// Kind of callable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Method,
}

/// A function or method declaration found at the top level of a file.
#[derive(Debug, Clone)]
pub struct FunctionDecl<'tree> {
    pub name: String,
    pub kind: FunctionKind,
    /// Receiver type for methods, without the pointer star.
    pub receiver: Option<String>,
    pub span: Span,
    /// The whole declaration node.
    pub node: tree_sitter::Node<'tree>,
}
