//! Core types for analyzer findings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Severity levels for issues, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// How likely a rule match is a real defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// A single finding produced by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// `<prefix>-<byte offset>`, unique within one run over one file.
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub file: String,
    pub line: usize,
    /// Enclosing function or method, empty at package level.
    pub function: String,
    pub code_snippet: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

/// Severity histogram over a list of issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatistics {
    pub total_issues: usize,
    /// Omitted by analyzers whose rules never report Critical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<usize>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl IssueStatistics {
    /// Count issues by severity in one pass.
    pub fn from_issues(issues: &[Issue], with_critical: bool) -> Self {
        let mut stats = IssueStatistics {
            total_issues: issues.len(),
            critical: with_critical.then_some(0),
            ..Default::default()
        };
        for issue in issues {
            match issue.severity {
                Severity::Critical => {
                    // Without a critical bucket, critical findings count as high.
                    match stats.critical.as_mut() {
                        Some(c) => *c += 1,
                        None => stats.high += 1,
                    }
                }
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
            }
        }
        stats
    }

    /// Count for one severity.
    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical.unwrap_or(0),
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// "2 Critical, 1 Medium" style breakdown, most severe first.
    pub fn breakdown(&self) -> String {
        Severity::ALL
            .iter()
            .filter_map(|s| {
                let n = self.count(*s);
                (n > 0).then(|| format!("{} {}", n, s))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Collapse issues sharing `(file, rule_id, line)`; the first occurrence wins.
pub fn deduplicate(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert((issue.file.clone(), issue.rule_id.clone(), issue.line)))
        .collect()
}
