//! Cyclomatic complexity of Go functions and methods.
//!
//! Complexity is calculated as:
//! - Start at 1
//! - Add 1 for each: if, for, switch, non-default case, select, select
//!   clause, &&, ||
//!
//! Each function also gets flags for high complexity, excessive length and
//! a dense ratio of branches to lines.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::analysis::go;
use crate::tools::{InputKind, Tool, ToolContext, ToolError, ToolInput};

/// Registry name of the complexity analyzer.
pub const NAME: &str = "complexity_analyzer";

const DEFAULT_FILE: &str = "input.go";

const CRITICAL_COMPLEXITY: u32 = 50;
const HIGH_COMPLEXITY: u32 = 20;
const CAUTION_COMPLEXITY: u32 = 10;
const TOO_LONG_LINES: usize = 100;
const LONG_LINES: usize = 50;
const DENSITY_MIN_LINES: usize = 20;
const DENSITY_LIMIT: f64 = 0.5;

/// Metrics for a single function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub name: String,
    pub line: usize,
    pub complexity: u32,
    pub lines: usize,
    /// Human readable flags, empty when the function looks fine.
    pub issues: Vec<String>,
}

/// Functions per complexity bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityStatistics {
    pub total_functions: usize,
    /// Complexity 10 or less.
    pub simple_functions: usize,
    /// 11 to 20.
    pub medium_functions: usize,
    /// 21 to 50.
    pub complex_functions: usize,
    /// Above 50.
    pub very_complex_functions: usize,
}

impl ComplexityStatistics {
    fn from_functions(functions: &[FunctionResult]) -> Self {
        let mut stats = ComplexityStatistics {
            total_functions: functions.len(),
            ..Default::default()
        };
        for f in functions {
            match f.complexity {
                c if c > CRITICAL_COMPLEXITY => stats.very_complex_functions += 1,
                c if c > HIGH_COMPLEXITY => stats.complex_functions += 1,
                c if c > CAUTION_COMPLEXITY => stats.medium_functions += 1,
                _ => stats.simple_functions += 1,
            }
        }
        stats
    }
}

/// Complexity payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub file: String,
    /// Number of analysed functions.
    pub total: usize,
    pub total_complexity: u32,
    pub functions: Vec<FunctionResult>,
    pub summary: String,
    pub statistics: ComplexityStatistics,
}

/// Flags for one function's metrics.
pub fn function_flags(complexity: u32, lines: usize) -> Vec<String> {
    let mut flags = Vec::new();

    if complexity > CRITICAL_COMPLEXITY {
        flags.push(format!(
            "Critical: cyclomatic complexity above {}, split this function",
            CRITICAL_COMPLEXITY
        ));
    } else if complexity > HIGH_COMPLEXITY {
        flags.push(format!(
            "High: cyclomatic complexity above {}, consider splitting",
            HIGH_COMPLEXITY
        ));
    } else if complexity > CAUTION_COMPLEXITY {
        flags.push(format!(
            "Caution: cyclomatic complexity above {}, may need refactoring",
            CAUTION_COMPLEXITY
        ));
    }

    if lines > TOO_LONG_LINES {
        flags.push(format!("Too long: more than {} lines", TOO_LONG_LINES));
    } else if lines > LONG_LINES {
        flags.push(format!("Long: more than {} lines", LONG_LINES));
    }

    if lines > DENSITY_MIN_LINES && complexity as f64 / lines as f64 > DENSITY_LIMIT {
        flags.push("Dense: too many branches per line".to_string());
    }

    flags
}

fn summarize(functions: &[FunctionResult], total_complexity: u32) -> String {
    if functions.is_empty() {
        return "No functions found".to_string();
    }
    let average = total_complexity as f64 / functions.len() as f64;
    let flagged = functions.iter().filter(|f| !f.issues.is_empty()).count();

    let mut summary = format!(
        "Analyzed {} function{}, average complexity {:.1}",
        functions.len(),
        if functions.len() == 1 { "" } else { "s" },
        average
    );
    if flagged > 0 {
        summary.push_str(&format!(
            ", {} function{} with potential issues",
            flagged,
            if flagged == 1 { "" } else { "s" }
        ));
    } else {
        summary.push_str(", all functions within normal range");
    }
    summary
}

/// Per-function cyclomatic complexity of one Go source.
#[derive(Debug, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Parse `code` and measure every function and method in source order.
    pub fn analyze(
        &self,
        ctx: &ToolContext,
        code: &str,
        file: &str,
    ) -> Result<ComplexityReport, ToolError> {
        let parsed = go::parse(file, code)?;
        let decls = go::functions(&parsed)?;

        let mut functions = Vec::with_capacity(decls.len());
        for decl in &decls {
            ctx.check()?;
            let complexity = go::control_flow(&parsed, decl.node)?.cyclomatic_complexity();
            let lines = decl.span.line_count();
            trace!(
                function = %decl.name,
                kind = ?decl.kind,
                receiver = decl.receiver.as_deref().unwrap_or(""),
                complexity,
                lines,
                "function measured"
            );
            functions.push(FunctionResult {
                name: decl.name.clone(),
                line: decl.span.start_line,
                complexity,
                lines,
                issues: function_flags(complexity, lines),
            });
        }

        let total_complexity = functions.iter().map(|f| f.complexity).sum();
        debug!(file, functions = functions.len(), total_complexity, "complexity computed");

        Ok(ComplexityReport {
            file: file.to_string(),
            total: functions.len(),
            total_complexity,
            summary: summarize(&functions, total_complexity),
            statistics: ComplexityStatistics::from_functions(&functions),
            functions,
        })
    }
}

impl Tool for ComplexityAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Measures cyclomatic complexity of Go functions and flags ones above 10"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Source
    }

    fn run(&self, ctx: &ToolContext, input: &ToolInput) -> Result<String, ToolError> {
        let ToolInput::Source { code, file } = input else {
            return Err(ToolError::InvalidInput(format!(
                "expected source input, got {}",
                input.kind_name()
            )));
        };
        let report = self.analyze(ctx, code, file.as_deref().unwrap_or(DEFAULT_FILE))?;
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(code: &str) -> ComplexityReport {
        ComplexityAnalyzer::new()
            .analyze(&ToolContext::background(), code, "main.go")
            .expect("analysis should succeed")
    }

    #[test]
    fn test_no_branches() {
        let report = analyze("package main\n\nfunc hello() {\n\tprintln(\"hi\")\n}\n");
        assert_eq!(report.total, 1);
        assert_eq!(report.functions[0].complexity, 1);
        assert_eq!(report.functions[0].line, 3);
        assert_eq!(report.functions[0].lines, 3);
        assert!(report.functions[0].issues.is_empty());
        assert_eq!(
            report.summary,
            "Analyzed 1 function, average complexity 1.0, all functions within normal range"
        );
    }

    #[test]
    fn test_if_with_and() {
        let report = analyze(
            r#"package main

func check(a, b bool) bool {
	if a && b {
		return true
	}
	return false
}
"#,
        );
        assert_eq!(report.functions[0].complexity, 3);
    }

    #[test]
    fn test_switch_with_three_cases() {
        let report = analyze(
            r#"package main

func name(x int) string {
	switch x {
	case 1:
		return "one"
	case 2:
		return "two"
	case 3:
		return "three"
	default:
		return "many"
	}
}
"#,
        );
        assert_eq!(report.functions[0].complexity, 5);
    }

    #[test]
    fn test_methods_and_totals() {
        let report = analyze(
            r#"package main

type S struct{}

func (s *S) Run(n int) {
	for i := 0; i < n; i++ {
		if i%2 == 0 || i%3 == 0 {
			continue
		}
	}
}

func plain() {}
"#,
        );
        assert_eq!(report.total, 2);
        assert_eq!(report.functions[0].name, "Run");
        assert_eq!(report.functions[0].complexity, 4);
        assert_eq!(report.functions[1].name, "plain");
        assert_eq!(report.total_complexity, 5);
        assert_eq!(report.statistics.simple_functions, 2);
        assert!(report.summary.contains("average complexity 2.5"));
    }

    #[test]
    fn test_no_functions() {
        let report = analyze("package main\n\nvar x = 1\n");
        assert_eq!(report.total, 0);
        assert!(report.functions.is_empty());
        assert_eq!(report.summary, "No functions found");
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["functions"].is_array());
    }

    #[test]
    fn test_flags() {
        assert!(function_flags(5, 10).is_empty());
        assert_eq!(function_flags(11, 10).len(), 1);
        assert!(function_flags(21, 10)[0].starts_with("High"));
        assert!(function_flags(51, 200)[0].starts_with("Critical"));
        assert!(function_flags(51, 200)[1].starts_with("Too long"));
        assert!(function_flags(2, 60)[0].starts_with("Long"));
        // 15 / 25 = 0.6
        let dense = function_flags(15, 25);
        assert!(dense.iter().any(|f| f.starts_with("Dense")));
        // density ignored for short functions
        assert!(function_flags(10, 12).is_empty());
    }

    #[test]
    fn test_many_ifs_flagged() {
        let body: String = (0..12).map(|i| format!("\tif x == {} {{\n\t\treturn\n\t}}\n", i)).collect();
        let code = format!("package main\n\nfunc big(x int) {{\n{}}}\n", body);
        let report = analyze(&code);
        assert_eq!(report.functions[0].complexity, 13);
        assert_eq!(report.statistics.medium_functions, 1);
        assert!(report.summary.ends_with("1 function with potential issues"));
    }

    #[test]
    fn test_syntax_error_rejected() {
        let err = ComplexityAnalyzer::new()
            .analyze(&ToolContext::background(), "package main\nfunc (", "bad.go")
            .unwrap_err();
        assert!(matches!(err, ToolError::Parse(_)));
    }

    #[test]
    fn test_cancelled_context() {
        let ctx = ToolContext::background();
        ctx.cancel();
        let err = ComplexityAnalyzer::new()
            .analyze(&ctx, "package main\n\nfunc f() {}\n", "main.go")
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }
}
