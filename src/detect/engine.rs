//! Rule engine shared by the security scanner and the bug detector.
//!
//! An engine owns an ordered list of stateless [`Rule`]s. A scan walks the
//! syntax tree once, depth first, and asks every enabled rule about every
//! named node. Matches become [`Issue`]s on the spot; duplicates on the same
//! line are collapsed afterwards.

use std::collections::{HashMap, HashSet};

use tracing::trace;
use tree_sitter::Node;

use crate::analysis::{go, ParsedSource};
use crate::tools::{ToolContext, ToolError};

use super::{deduplicate, Confidence, Issue, Severity};

/// Custom config key holding rule ids to skip.
pub const DISABLED_RULES_KEY: &str = "disabled_rules";

/// Nodes visited between two cancellation checks.
const CHECK_INTERVAL: usize = 512;

/// Identity and remediation text of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMeta {
    /// Stable short code, e.g. `G101`.
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub category: &'static str,
    pub description: &'static str,
    pub suggestion: &'static str,
    pub confidence: Option<Confidence>,
}

/// A stateless predicate over one syntax node.
pub trait Rule: Send + Sync {
    fn meta(&self) -> &'static RuleMeta;

    /// Whether `node` exhibits the pattern. Must only look at the node, its
    /// immediate structure and the context.
    fn matches(&self, node: Node, ctx: &RuleContext) -> bool;

    fn id(&self) -> &'static str {
        self.meta().id
    }
}

/// The callee of a call expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget<'a> {
    /// `pkg.Name(...)` where `pkg` is a plain identifier.
    Selector { operand: &'a str, field: &'a str },
    /// `Name(...)`.
    Ident(&'a str),
    /// Anything else (method chains, closures, index expressions).
    Other,
}

/// Per-scan context handed to every rule.
pub struct RuleContext<'a> {
    pub parsed: &'a ParsedSource,
    /// Local package name to import path.
    pub imports: HashMap<String, String>,
}

impl<'a> RuleContext<'a> {
    pub fn new(parsed: &'a ParsedSource) -> Result<Self, ToolError> {
        Ok(Self {
            parsed,
            imports: go::imports(parsed)?,
        })
    }

    /// Source text of a node.
    pub fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    /// Import path bound to a local package name.
    pub fn import_path(&self, name: &str) -> Option<&str> {
        self.imports.get(name).map(String::as_str)
    }

    /// `(operand, field)` of a selector whose operand is a plain identifier.
    pub fn selector(&self, node: Node) -> Option<(&'a str, &'a str)> {
        if node.kind() != "selector_expression" {
            return None;
        }
        let operand = node.child_by_field_name("operand")?;
        let field = node.child_by_field_name("field")?;
        if operand.kind() != "identifier" {
            return None;
        }
        Some((self.text(operand), self.text(field)))
    }

    /// Callee of a call expression.
    pub fn call_target(&self, call: Node) -> CallTarget<'a> {
        let Some(function) = call.child_by_field_name("function") else {
            return CallTarget::Other;
        };
        match function.kind() {
            "identifier" => CallTarget::Ident(self.text(function)),
            "selector_expression" => match self.selector(function) {
                Some((operand, field)) => CallTarget::Selector { operand, field },
                None => CallTarget::Other,
            },
            _ => CallTarget::Other,
        }
    }

    /// Argument expressions of a call, comments skipped.
    pub fn call_args<'t>(&self, call: Node<'t>) -> Vec<Node<'t>> {
        let Some(args) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut cursor = args.walk();
        let items = args
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        items
    }
}

/// Named expressions of an expression list (or the node itself otherwise).
pub fn list_items(node: Node) -> Vec<Node> {
    if node.kind() != "expression_list" {
        return vec![node];
    }
    let mut cursor = node.walk();
    let items = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    items
}

/// Ordered, immutable rule set for one analyzer.
pub struct RuleEngine {
    prefix: &'static str,
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Build an engine whose issue ids start with `prefix`.
    pub fn new(prefix: &'static str, rules: Vec<Box<dyn Rule>>) -> Self {
        debug_assert!(
            {
                let mut ids = HashSet::new();
                rules.iter().all(|r| ids.insert(r.id()))
            },
            "rule ids must be unique"
        );
        Self { prefix, rules }
    }

    /// Registered rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every enabled rule to every named node in one traversal.
    ///
    /// Rules listed under [`DISABLED_RULES_KEY`] in the context's custom
    /// config are skipped. The context is checked every few hundred nodes.
    pub fn scan(&self, parsed: &ParsedSource, ctx: &ToolContext) -> Result<Vec<Issue>, ToolError> {
        let disabled: HashSet<String> = ctx.custom_strings(DISABLED_RULES_KEY).into_iter().collect();
        let active: Vec<&dyn Rule> = self
            .rules()
            .filter(|r| !disabled.contains(r.id()))
            .collect();
        if active.is_empty() {
            return Ok(Vec::new());
        }

        let rule_ctx = RuleContext::new(parsed)?;
        let mut issues = Vec::new();
        let mut visited = 0usize;
        let mut cursor = parsed.root().walk();

        'walk: loop {
            let node = cursor.node();
            if node.is_named() {
                visited += 1;
                if visited % CHECK_INTERVAL == 0 {
                    ctx.check()?;
                }
                for rule in &active {
                    if rule.matches(node, &rule_ctx) {
                        issues.push(self.build_issue(*rule, node, parsed));
                    }
                }
            }

            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        Ok(deduplicate(issues))
    }

    fn build_issue(&self, rule: &dyn Rule, node: Node, parsed: &ParsedSource) -> Issue {
        let meta = rule.meta();
        let line = node.start_position().row + 1;
        trace!(rule = meta.id, name = meta.name, file = %parsed.path, line, "rule matched");
        Issue {
            id: format!("{}-{}", self.prefix, node.start_byte()),
            rule_id: meta.id.to_string(),
            severity: meta.severity,
            category: meta.category.to_string(),
            description: meta.description.to_string(),
            file: parsed.path.clone(),
            line,
            function: go::enclosing_function(parsed, node),
            code_snippet: parsed.snippet(line),
            suggestion: meta.suggestion.to_string(),
            confidence: meta.confidence,
        }
    }
}
