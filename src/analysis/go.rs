//! Go language support using tree-sitter.
//!
//! Extracts:
//! - Function and method declarations
//! - Import table (alias to path)
//! - Control flow decision points for complexity
//! - Literal values used by the rule catalogues

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use streaming_iterator::StreamingIterator;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use super::{ControlFlowInfo, FunctionDecl, FunctionKind, ParsedSource, Span};

/// Tree-sitter query for function and method declarations.
const FUNCTION_QUERY: &str = r#"
(function_declaration
  name: (identifier) @func_name
) @function

(method_declaration
  receiver: (parameter_list) @receiver
  name: (field_identifier) @method_name
) @method
"#;

/// Tree-sitter query for import specs, grouped or not.
const IMPORT_QUERY: &str = r#"
(import_spec
  name: (_)? @alias
  path: (_) @path
)
"#;

/// Tree-sitter query for control flow nodes (complexity calculation).
const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(expression_switch_statement) @switch
(type_switch_statement) @switch
(select_statement) @select
(expression_case) @case
(type_case) @case
(communication_case) @select_clause
(select_statement (default_case) @select_clause)
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

static FUNCTIONS: OnceCell<Query> = OnceCell::new();
static IMPORTS: OnceCell<Query> = OnceCell::new();
static CONTROL_FLOW: OnceCell<Query> = OnceCell::new();

/// Errors raised while turning Go source into a tree.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to load Go grammar: {0}")]
    Grammar(String),

    #[error("invalid tree-sitter query: {0}")]
    Query(String),

    #[error("failed to parse Go source: {path}")]
    Parse { path: String },

    #[error("syntax error in {path} at line {line}, column {column}")]
    Syntax {
        path: String,
        line: usize,
        column: usize,
    },
}

/// The tree-sitter Go grammar.
pub fn language() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn compiled(cell: &'static OnceCell<Query>, source: &str) -> Result<&'static Query, AnalysisError> {
    cell.get_or_try_init(|| {
        Query::new(&language(), source).map_err(|e| AnalysisError::Query(e.to_string()))
    })
}

/// Parse Go source into a tree.
///
/// A tree that contains ERROR or MISSING nodes is rejected with the position
/// of the first one; analyzers never run on a partial tree.
pub fn parse(path: &str, source: &str) -> Result<ParsedSource, AnalysisError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language())
        .map_err(|e| AnalysisError::Grammar(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or_else(|| AnalysisError::Parse {
        path: path.to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let at = first_error(root).unwrap_or(root).start_position();
        return Err(AnalysisError::Syntax {
            path: path.to_string(),
            line: at.row + 1,
            column: at.column + 1,
        });
    }

    Ok(ParsedSource::new(tree, source.to_string(), path.to_string()))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

/// All function and method declarations, in source order.
pub fn functions(parsed: &ParsedSource) -> Result<Vec<FunctionDecl<'_>>, AnalysisError> {
    let query = compiled(&FUNCTIONS, FUNCTION_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root(), parsed.source.as_bytes());

    let mut decls = Vec::new();
    while let Some(m) = matches.next() {
        let mut name = String::new();
        let mut kind = FunctionKind::Function;
        let mut receiver = None;
        let mut decl_node = None;

        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "func_name" => name = parsed.node_text(capture.node).to_string(),
                "method_name" => {
                    name = parsed.node_text(capture.node).to_string();
                    kind = FunctionKind::Method;
                }
                "receiver" => receiver = receiver_type(parsed, capture.node),
                "function" | "method" => decl_node = Some(capture.node),
                _ => {}
            }
        }

        if let Some(node) = decl_node {
            decls.push(FunctionDecl {
                name,
                kind,
                receiver,
                span: Span::from_node(node),
                node,
            });
        }
    }

    decls.sort_by_key(|d| d.span.start_byte);
    Ok(decls)
}

fn receiver_type(parsed: &ParsedSource, params: Node) -> Option<String> {
    let mut cursor = params.walk();
    let decl = params
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = decl.child_by_field_name("type")?;
    Some(parsed.node_text(ty).trim_start_matches('*').to_string())
}

/// Count decision points inside a function declaration's body.
///
/// Declarations without a body (assembly stubs) have no decision points.
pub fn control_flow(parsed: &ParsedSource, decl: Node) -> Result<ControlFlowInfo, AnalysisError> {
    let mut info = ControlFlowInfo::default();
    let Some(body) = decl.child_by_field_name("body") else {
        return Ok(info);
    };

    let query = compiled(&CONTROL_FLOW, CONTROL_FLOW_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, body, parsed.source.as_bytes());

    while let Some(m) = matches.next() {
        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "if" => info.if_count += 1,
                "for" => info.loop_count += 1,
                "switch" => info.switch_count += 1,
                "select" => info.select_count += 1,
                "case" => info.case_count += 1,
                "select_clause" => info.select_clause_count += 1,
                "and" => info.and_count += 1,
                "or" => info.or_count += 1,
                _ => {}
            }
        }
    }

    Ok(info)
}

/// Import table of a file: local package name to import path.
///
/// Unaliased imports are keyed by the last path segment. Blank and dot
/// imports bind no name and are left out.
pub fn imports(parsed: &ParsedSource) -> Result<HashMap<String, String>, AnalysisError> {
    let query = compiled(&IMPORTS, IMPORT_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root(), parsed.source.as_bytes());

    let mut table = HashMap::new();
    while let Some(m) = matches.next() {
        let mut alias = None;
        let mut path = None;
        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "alias" => alias = Some(parsed.node_text(capture.node).to_string()),
                "path" => path = string_literal(parsed, capture.node),
                _ => {}
            }
        }

        let Some(path) = path else { continue };
        let name = match alias {
            Some(a) if a == "_" || a == "." => continue,
            Some(a) => a,
            None => path.rsplit('/').next().unwrap_or(&path).to_string(),
        };
        table.insert(name, path);
    }

    Ok(table)
}

/// Name of the function or method declaration enclosing `node`.
///
/// Returns an empty string at package level.
pub fn enclosing_function(parsed: &ParsedSource, node: Node) -> String {
    let mut current = node.parent();
    while let Some(n) = current {
        if matches!(n.kind(), "function_declaration" | "method_declaration") {
            return n
                .child_by_field_name("name")
                .map(|name| parsed.node_text(name).to_string())
                .unwrap_or_default();
        }
        current = n.parent();
    }
    String::new()
}

/// Whether a node is a Go string literal.
pub fn is_string_literal(node: Node) -> bool {
    matches!(
        node.kind(),
        "interpreted_string_literal" | "raw_string_literal"
    )
}

/// Value of a string literal node without its delimiters.
///
/// Escape sequences are kept as written.
pub fn string_literal(parsed: &ParsedSource, node: Node) -> Option<String> {
    if !is_string_literal(node) {
        return None;
    }
    let text = parsed.node_text(node);
    if text.len() < 2 {
        return None;
    }
    Some(text[1..text.len() - 1].to_string())
}

/// Value of a Go integer literal (`0755`, `0o755`, `0x1ed`, `0b1`, `493`).
pub fn int_literal(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        u64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(code: &str) -> ParsedSource {
        parse("test.go", code).expect("should parse")
    }

    #[test]
    fn test_parse_valid_source() {
        let parsed = parse_ok("package main\n\nfunc main() {}\n");
        assert_eq!(parsed.path, "test.go");
        assert_eq!(parsed.root().kind(), "source_file");
    }

    #[test]
    fn test_parse_reports_syntax_error_position() {
        let err = parse("bad.go", "package main\n\nfunc main() {\n\tx := \n").unwrap_err();
        match err {
            AnalysisError::Syntax { path, line, .. } => {
                assert_eq!(path, "bad.go");
                assert!(line >= 3, "error should be reported inside main, got line {}", line);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_functions_and_methods() {
        let parsed = parse_ok(
            r#"package main

type Server struct{}

func (s *Server) Start() error {
	return nil
}

func helper(x int) int {
	return x
}
"#,
        );
        let decls = functions(&parsed).unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "Start");
        assert_eq!(decls[0].kind, FunctionKind::Method);
        assert_eq!(decls[0].receiver.as_deref(), Some("Server"));
        assert_eq!(decls[0].span.start_line, 5);
        assert_eq!(decls[1].name, "helper");
        assert_eq!(decls[1].kind, FunctionKind::Function);
        assert_eq!(decls[1].span.line_count(), 3);
    }

    #[test]
    fn test_control_flow_counts() {
        let parsed = parse_ok(
            r#"package main

func f(a, b bool, xs []int, ch chan int) {
	if a && b {
	}
	for _, x := range xs {
		_ = x
	}
	select {
	case <-ch:
	default:
	}
}
"#,
        );
        let decls = functions(&parsed).unwrap();
        let info = control_flow(&parsed, decls[0].node).unwrap();
        assert_eq!(info.if_count, 1);
        assert_eq!(info.and_count, 1);
        assert_eq!(info.loop_count, 1);
        assert_eq!(info.select_count, 1);
        assert_eq!(info.select_clause_count, 2);
        assert_eq!(info.cyclomatic_complexity(), 7);
    }

    #[test]
    fn test_imports_table() {
        let parsed = parse_ok(
            r#"package main

import (
	"crypto/rand"
	mrand "math/rand"
	_ "net/http/pprof"
	"fmt"
)
"#,
        );
        let table = imports(&parsed).unwrap();
        assert_eq!(table.get("rand").map(String::as_str), Some("crypto/rand"));
        assert_eq!(table.get("mrand").map(String::as_str), Some("math/rand"));
        assert_eq!(table.get("fmt").map(String::as_str), Some("fmt"));
        assert!(!table.contains_key("_"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_enclosing_function() {
        let parsed = parse_ok("package main\n\nvar top = 1\n\nfunc run() {\n\tx := 2\n\t_ = x\n}\n");
        let root = parsed.root();
        let text = &parsed.source;
        let offset = text.find("x := 2").unwrap();
        let node = root.descendant_for_byte_range(offset, offset + 1).unwrap();
        assert_eq!(enclosing_function(&parsed, node), "run");

        let offset = text.find("top").unwrap();
        let node = root.descendant_for_byte_range(offset, offset + 1).unwrap();
        assert_eq!(enclosing_function(&parsed, node), "");
    }

    #[test]
    fn test_int_literal_forms() {
        assert_eq!(int_literal("0777"), Some(0o777));
        assert_eq!(int_literal("0o644"), Some(0o644));
        assert_eq!(int_literal("0x1FF"), Some(0x1ff));
        assert_eq!(int_literal("0b101"), Some(5));
        assert_eq!(int_literal("420"), Some(420));
        assert_eq!(int_literal("0"), Some(0));
        assert_eq!(int_literal("1_000"), Some(1000));
        assert_eq!(int_literal("09"), None);
    }
}
