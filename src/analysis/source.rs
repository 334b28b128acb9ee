//! Parsed source container with position and text lookups.

use tree_sitter::{Node, Tree};

/// Maximum number of characters kept in an issue snippet.
pub const SNIPPET_MAX_CHARS: usize = 100;

/// Holds a parsed tree-sitter tree together with its source text.
///
/// The tree is reused by every pass over the file (functions, imports,
/// rule traversal), so a file is parsed exactly once per analysis.
#[derive(Debug)]
pub struct ParsedSource {
    /// The tree-sitter parse tree.
    pub tree: Tree,
    /// Full source text.
    pub source: String,
    /// Display path used in issues and errors.
    pub path: String,
    line_starts: Vec<usize>,
}

impl ParsedSource {
    pub(crate) fn new(tree: Tree, source: String, path: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            tree,
            source,
            path,
            line_starts,
        }
    }

    /// Root node of the tree.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Text of a 1-indexed line without its line terminator.
    ///
    /// Out-of-range lines yield an empty string.
    pub fn line_text(&self, line: usize) -> &str {
        if line == 0 || line > self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.source.len());
        self.source[start..end].trim_end_matches(&['\n', '\r'][..])
    }

    /// Trimmed, length-capped text of a 1-indexed line.
    pub fn snippet(&self, line: usize) -> String {
        truncate_snippet(self.line_text(line).trim())
    }
}

/// Cap a snippet at [`SNIPPET_MAX_CHARS`] characters, appending `...` when cut.
pub fn truncate_snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
