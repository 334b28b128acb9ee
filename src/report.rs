//! Output formatting for goinsight results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the tool payload verbatim, or a tool envelope when a run failed
//!   or several tools ran

use std::str::FromStr;

use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::{
    names, BatchStatus, BugReport, ComplexityReport, FileStatus, Issue, SecurityReport, Severity,
};
use crate::tools::{ToolResult, ToolStatus};

/// Output format selected on the command line or in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("invalid format {:?}, must be 'pretty' or 'json'", s)),
        }
    }
}

/// Number of findings in a successful result; zero for failures.
///
/// For the complexity analyzer a finding is a function with at least one
/// flag. For the other tools it is the payload's `total`.
pub fn finding_count(tool: &str, result: &ToolResult) -> usize {
    if !result.success {
        return 0;
    }
    let Ok(payload) = result.payload() else {
        return 0;
    };
    if tool == names::COMPLEXITY_ANALYZER {
        return payload["functions"]
            .as_array()
            .map(|fs| {
                fs.iter()
                    .filter(|f| f["issues"].as_array().is_some_and(|i| !i.is_empty()))
                    .count()
            })
            .unwrap_or(0);
    }
    payload["total"].as_u64().unwrap_or(0) as usize
}

// =============================================================================
// JSON Format
// =============================================================================

/// One tool's outcome in JSON output.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonToolOutput {
    pub tool: String,
    pub success: bool,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Parsed payload, `null` for failures.
    pub result: Value,
    pub attempts: u64,
}

impl JsonToolOutput {
    pub fn new(tool: &str, result: &ToolResult) -> Self {
        Self {
            tool: tool.to_string(),
            success: result.success,
            execution_time_ms: result.execution_time.as_millis() as u64,
            error: result.error.clone(),
            result: result.payload().unwrap_or(Value::Null),
            attempts: result
                .metadata
                .get("attempts")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        }
    }
}

/// Render results as JSON text.
///
/// A single successful result prints its payload unchanged; anything else
/// prints an array of [`JsonToolOutput`].
pub fn render_json(results: &[(String, ToolResult)]) -> anyhow::Result<String> {
    if let [(_, result)] = results {
        if result.success {
            return Ok(result.result.clone());
        }
    }
    let outputs: Vec<JsonToolOutput> = results
        .iter()
        .map(|(name, result)| JsonToolOutput::new(name, result))
        .collect();
    Ok(serde_json::to_string_pretty(&outputs)?)
}

/// Write results in JSON format.
pub fn write_json(results: &[(String, ToolResult)]) -> anyhow::Result<()> {
    println!("{}", render_json(results)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(target: &str, results: &[(String, ToolResult)], verbose: bool) {
    println!();
    print!("  ");
    print!("{}", "goinsight".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("  {}", "Target: ".dimmed());
    println!("{}", target);
    println!();

    for (name, result) in results {
        write_tool_header(name, result);
        if !result.success {
            println!(
                "    {}",
                result.error.as_deref().unwrap_or("unknown error").red()
            );
            println!();
            continue;
        }
        let rendered = match name.as_str() {
            names::COMPLEXITY_ANALYZER => parse::<ComplexityReport>(result).map(|r| write_complexity(&r, verbose)),
            names::SECURITY_SCANNER => parse::<SecurityReport>(result).map(|r| write_security(&r, verbose)),
            names::BUG_DETECTOR => parse::<BugReport>(result).map(|r| write_bugs(&r, verbose)),
            _ => None,
        };
        if rendered.is_none() {
            println!("{}", result.result);
        }
        println!();
    }
}

fn parse<T: for<'de> Deserialize<'de>>(result: &ToolResult) -> Option<T> {
    serde_json::from_str(&result.result).ok()
}

fn write_tool_header(name: &str, result: &ToolResult) {
    let status = if result.success {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "  {} {}  {}",
        status,
        name.bold(),
        format!("({} ms)", result.execution_time.as_millis()).dimmed()
    );
}

fn write_complexity(report: &ComplexityReport, verbose: bool) {
    println!("    {}", report.summary);
    let flagged: Vec<_> = report
        .functions
        .iter()
        .filter(|f| verbose || !f.issues.is_empty())
        .collect();
    if flagged.is_empty() {
        return;
    }
    println!();
    for f in flagged {
        print!("    {:<30}", f.name.blue());
        print!("{}", format!("line {:<5}", f.line).dimmed());
        print!(" complexity ");
        write_colored_complexity(f.complexity);
        println!("  {} lines", f.lines);
        for issue in &f.issues {
            println!("        {}", issue.yellow());
        }
    }
}

fn write_colored_complexity(c: u32) {
    match c {
        c if c <= 10 => print!("{:>3}", c.to_string().green()),
        c if c <= 20 => print!("{:>3}", c.to_string().yellow()),
        c if c <= 50 => print!("{:>3}", c.to_string().red()),
        _ => print!("{:>3}", c.to_string().red().bold()),
    }
}

fn write_security(report: &SecurityReport, verbose: bool) {
    println!("    {}", report.summary);
    write_issues(&report.issues, verbose);
}

fn write_bugs(report: &BugReport, verbose: bool) {
    let status = match report.status {
        BatchStatus::Success => "success".green(),
        BatchStatus::Partial => "partial".yellow(),
        BatchStatus::Error => "error".red(),
    };
    println!("    {}  [{}]", report.summary, status);
    write_issues(&report.issues, verbose);
    write_file_rows("Failed files", &report.error_files);
    if verbose {
        write_file_rows("Skipped files", &report.skipped_files);
        if !report.recommendations.is_empty() {
            println!();
            println!("    {}", "Recommendations:".bold());
            for r in &report.recommendations {
                println!("      - {}", r);
            }
        }
    }
}

fn write_file_rows(title: &str, rows: &[FileStatus]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("    {} ({}):", title.bold(), rows.len());
    for row in rows {
        println!("      {}  {}", row.path.blue(), row.reason.dimmed());
    }
}

fn write_issues(issues: &[Issue], verbose: bool) {
    if issues.is_empty() {
        return;
    }
    println!();
    for issue in issues {
        write_severity_tag(issue.severity);
        print!(" {:<6}", issue.rule_id.dimmed());
        print!("{}", issue.file.blue());
        print!("{}", format!(":{}", issue.line).dimmed());
        if !issue.function.is_empty() {
            print!("{}", format!(" in {}", issue.function).dimmed());
        }
        println!();
        println!("            {}", issue.description);
        if !issue.code_snippet.is_empty() {
            println!("            {}", issue.code_snippet.dimmed());
        }
        if verbose {
            for line in issue.suggestion.lines() {
                println!("            {}", line.green());
            }
        }
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Critical => print!("    {}", "CRIT".red().bold()),
        Severity::High => print!("    {}", "HIGH".red()),
        Severity::Medium => print!("    {}", "MED ".yellow()),
        Severity::Low => print!("    {}", "LOW ".blue()),
    }
}

/// Write the tool table for `goinsight list`.
pub fn write_tool_list(tools: &[ToolStatus], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(tools)?);
        return Ok(());
    }
    println!("Registered tools:");
    println!();
    for tool in tools {
        let state = if tool.enabled {
            "enabled ".green()
        } else {
            "disabled".red()
        };
        println!(
            "  {:<22} {}  {:>7}  {}",
            tool.name,
            state,
            format!("{}ms", tool.timeout.as_millis()),
            tool.description.dimmed()
        );
    }
    Ok(())
}
