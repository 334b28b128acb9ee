//! Security scanner: syntactic checks for common Go security mistakes.
//!
//! Every check is a [`Rule`] over a single node. The scanner reports
//! hard-coded credentials, SQL built by string concatenation, weak random
//! number generators, secrets passed to print functions, broken hash and
//! cipher packages, world-writable file permissions and plain-HTTP requests.

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use crate::analysis::go;
use crate::tools::{InputKind, Tool, ToolContext, ToolError, ToolInput};

use super::engine::{list_items, CallTarget, Rule, RuleContext, RuleEngine, RuleMeta};
use super::{Issue, IssueStatistics, Severity};

/// Registry name of the security scanner.
pub const NAME: &str = "security_scanner";

/// Display name used when the input carries no file name.
const DEFAULT_FILE: &str = "input.go";

const SECRET_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "api_key",
    "apikey",
    "access_token",
    "accesstoken",
    "private_key",
    "privatekey",
    "auth_token",
    "authtoken",
    "token",
    "credential",
];

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "DROP", "CREATE", "ALTER",
    "TRUNCATE", "EXEC", "EXECUTE",
];

const WEAK_RAND_FUNCS: &[&str] = &[
    "Int", "Intn", "Int31", "Int31n", "Int63", "Int63n", "Float32", "Float64", "Perm", "Shuffle",
];

const PRINT_FUNCS: &[&str] = &[
    "Print", "Println", "Printf", "Fprint", "Fprintln", "Fprintf", "Sprint", "Sprintln",
    "Sprintf", "Log", "Logf", "Logln",
];

const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "private_key",
    "access_key",
    "credential",
    "auth",
    "ssn",
    "credit_card",
    "pin",
    "key",
];

const WEAK_CRYPTO_PACKAGES: &[&str] = &["md5", "sha1", "md4", "des", "rc4"];

const WEAK_CRYPTO_CONSTRUCTORS: &[&str] = &["md5new", "sha1new", "md4new"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|k| lower.contains(k))
}

// =============================================================================
// Rules
// =============================================================================

static HARDCODED_SECRET: RuleMeta = RuleMeta {
    id: "G101",
    name: "Hardcoded Secrets",
    severity: Severity::Critical,
    category: "Credentials",
    description: "Hard-coded password, key or token",
    suggestion: "Load secrets from environment variables or a secret manager, e.g. os.Getenv(\"DB_PASSWORD\")",
    confidence: None,
};

/// Secret-named identifier bound to a non-empty string literal.
struct HardcodedSecret;

impl HardcodedSecret {
    fn binds_secret(&self, names: &[Node], values: &[Node], ctx: &RuleContext) -> bool {
        if names.len() != values.len() {
            return false;
        }
        names.iter().zip(values).any(|(name, value)| {
            let ident = match name.kind() {
                "identifier" => ctx.text(*name),
                "selector_expression" => name
                    .child_by_field_name("field")
                    .map(|f| ctx.text(f))
                    .unwrap_or(""),
                _ => return false,
            };
            contains_any(ident, SECRET_KEYWORDS)
                && go::string_literal(ctx.parsed, *value).is_some_and(|v| !v.is_empty())
        })
    }
}

impl Rule for HardcodedSecret {
    fn meta(&self) -> &'static RuleMeta {
        &HARDCODED_SECRET
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        match node.kind() {
            "short_var_declaration" | "assignment_statement" => {
                if node.kind() == "assignment_statement"
                    && node
                        .child_by_field_name("operator")
                        .map(|op| ctx.text(op) != "=")
                        .unwrap_or(false)
                {
                    return false;
                }
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return false;
                };
                self.binds_secret(&list_items(left), &list_items(right), ctx)
            }
            "var_spec" | "const_spec" => {
                let Some(value) = node.child_by_field_name("value") else {
                    return false;
                };
                let mut cursor = node.walk();
                let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
                self.binds_secret(&names, &list_items(value), ctx)
            }
            _ => false,
        }
    }
}

static SQL_INJECTION: RuleMeta = RuleMeta {
    id: "G201",
    name: "SQL Injection",
    severity: Severity::Critical,
    category: "Injection",
    description: "SQL statement built by string concatenation",
    suggestion: "Use parameterized queries: db.Query(\"SELECT * FROM users WHERE id = ?\", id)",
    confidence: None,
};

/// `+` between an SQL-looking literal and a non-literal operand.
struct SqlInjection;

impl SqlInjection {
    fn has_sql_keyword(literal: &str) -> bool {
        literal
            .to_uppercase()
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| SQL_KEYWORDS.contains(&word))
    }
}

impl Rule for SqlInjection {
    fn meta(&self) -> &'static RuleMeta {
        &SQL_INJECTION
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        if node.kind() != "binary_expression" {
            return false;
        }
        let is_plus = node
            .child_by_field_name("operator")
            .is_some_and(|op| ctx.text(op) == "+");
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return false;
        };
        if !is_plus {
            return false;
        }

        let literal = match (go::is_string_literal(left), go::is_string_literal(right)) {
            (true, false) => left,
            (false, true) => right,
            _ => return false,
        };
        go::string_literal(ctx.parsed, literal).is_some_and(|v| Self::has_sql_keyword(&v))
    }
}

static WEAK_RANDOM: RuleMeta = RuleMeta {
    id: "G401",
    name: "Use of Weak Random Number Generator",
    severity: Severity::High,
    category: "Cryptography",
    description: "math/rand is not suitable for security-sensitive values",
    suggestion: "Use crypto/rand for tokens, keys and nonces",
    confidence: None,
};

/// `rand.Intn` and friends from `math/rand`.
struct WeakRandom;

impl Rule for WeakRandom {
    fn meta(&self) -> &'static RuleMeta {
        &WEAK_RANDOM
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        let Some((operand, field)) = ctx.selector(node) else {
            return false;
        };
        if !WEAK_RAND_FUNCS.contains(&field) {
            return false;
        }
        match ctx.import_path(operand) {
            Some(path) => matches!(path, "math/rand" | "math/rand/v2"),
            None => operand == "rand",
        }
    }
}

static INFO_DISCLOSURE: RuleMeta = RuleMeta {
    id: "G104",
    name: "Information Disclosure",
    severity: Severity::Medium,
    category: "Data Privacy",
    description: "Sensitive value passed to a print or log function",
    suggestion: "Do not log secrets; mask them or log only non-sensitive identifiers",
    confidence: None,
};

/// Print/log call with a sensitive-looking identifier argument.
struct InfoDisclosure;

impl Rule for InfoDisclosure {
    fn meta(&self) -> &'static RuleMeta {
        &INFO_DISCLOSURE
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        if node.kind() != "call_expression" {
            return false;
        }
        let is_print = match ctx.call_target(node) {
            CallTarget::Ident(name) => PRINT_FUNCS.contains(&name),
            CallTarget::Selector { operand, .. } => matches!(operand, "fmt" | "log"),
            CallTarget::Other => false,
        };
        if !is_print {
            return false;
        }
        ctx.call_args(node).iter().any(|arg| {
            let name = match arg.kind() {
                "identifier" => ctx.text(*arg),
                "selector_expression" => arg
                    .child_by_field_name("field")
                    .map(|f| ctx.text(f))
                    .unwrap_or(""),
                _ => return false,
            };
            contains_any(name, SENSITIVE_KEYWORDS)
        })
    }
}

static WEAK_CRYPTO: RuleMeta = RuleMeta {
    id: "G501",
    name: "Use of Weak Cryptographic Algorithm",
    severity: Severity::High,
    category: "Cryptography",
    description: "Broken hash or cipher (MD5, SHA-1, MD4, DES, RC4)",
    suggestion: "Use SHA-256 or better for hashing and AES-GCM for encryption",
    confidence: None,
};

/// Any use of a broken hash or cipher package.
struct WeakCrypto;

impl WeakCrypto {
    fn is_weak_package(operand: &str, ctx: &RuleContext) -> bool {
        if WEAK_CRYPTO_PACKAGES.contains(&operand.to_lowercase().as_str()) {
            return true;
        }
        ctx.import_path(operand)
            .and_then(|path| path.rsplit('/').next())
            .is_some_and(|last| WEAK_CRYPTO_PACKAGES.contains(&last))
    }
}

impl Rule for WeakCrypto {
    fn meta(&self) -> &'static RuleMeta {
        &WEAK_CRYPTO
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        match node.kind() {
            "selector_expression" => ctx
                .selector(node)
                .is_some_and(|(operand, _)| Self::is_weak_package(operand, ctx)),
            "call_expression" => match ctx.call_target(node) {
                CallTarget::Ident(name) => {
                    WEAK_CRYPTO_CONSTRUCTORS.contains(&name.to_lowercase().as_str())
                }
                _ => false,
            },
            _ => false,
        }
    }
}

static INSECURE_FILE_PERMISSIONS: RuleMeta = RuleMeta {
    id: "G302",
    name: "Insecure File Permissions",
    severity: Severity::Medium,
    category: "File System",
    description: "File or directory created world-writable",
    suggestion: "Use restrictive permissions such as 0600 for files and 0750 for directories",
    confidence: None,
};

/// World-writable permission literal passed to an os/ioutil call.
struct InsecureFilePermissions;

impl InsecureFilePermissions {
    fn perm_index(field: &str) -> Option<usize> {
        match field {
            "OpenFile" | "WriteFile" => Some(2),
            "Mkdir" | "MkdirAll" | "Chmod" => Some(1),
            _ => None,
        }
    }

    /// Integer value of a literal, also through `os.FileMode(0777)`.
    fn perm_value(arg: Node, ctx: &RuleContext) -> Option<u64> {
        match arg.kind() {
            "int_literal" => go::int_literal(ctx.text(arg)),
            "call_expression" => match ctx.call_target(arg) {
                CallTarget::Selector { field: "FileMode", .. } => ctx
                    .call_args(arg)
                    .first()
                    .and_then(|inner| Self::perm_value(*inner, ctx)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Rule for InsecureFilePermissions {
    fn meta(&self) -> &'static RuleMeta {
        &INSECURE_FILE_PERMISSIONS
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        if node.kind() != "call_expression" {
            return false;
        }
        let CallTarget::Selector { operand, field } = ctx.call_target(node) else {
            return false;
        };
        if !matches!(operand, "os" | "ioutil") {
            return false;
        }
        let Some(index) = Self::perm_index(field) else {
            return false;
        };
        ctx.call_args(node)
            .get(index)
            .and_then(|arg| Self::perm_value(*arg, ctx))
            .is_some_and(|perm| perm & 0o002 != 0)
    }
}

static INSECURE_HTTP: RuleMeta = RuleMeta {
    id: "G107",
    name: "Insecure HTTP Request",
    severity: Severity::Medium,
    category: "Network Security",
    description: "Request sent over plain HTTP",
    suggestion: "Use https:// URLs so traffic is encrypted",
    confidence: None,
};

/// `http.Get("http://...")` and friends with a literal plain-HTTP URL.
struct InsecureHttp;

impl Rule for InsecureHttp {
    fn meta(&self) -> &'static RuleMeta {
        &INSECURE_HTTP
    }

    fn matches(&self, node: Node, ctx: &RuleContext) -> bool {
        if node.kind() != "call_expression" {
            return false;
        }
        let CallTarget::Selector {
            operand: "http",
            field,
        } = ctx.call_target(node)
        else {
            return false;
        };
        let url_index = match field {
            "Get" | "Post" | "Head" | "PostForm" => 0,
            "NewRequest" => 1,
            "NewRequestWithContext" => 2,
            _ => return false,
        };
        ctx.call_args(node)
            .get(url_index)
            .and_then(|arg| go::string_literal(ctx.parsed, *arg))
            .is_some_and(|url| url.starts_with("http://"))
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Security scan payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub file: String,
    pub total: usize,
    pub issues: Vec<Issue>,
    pub summary: String,
    pub statistics: IssueStatistics,
}

/// Rule-engine backed security scanner.
pub struct SecurityScanner {
    engine: RuleEngine,
}

impl SecurityScanner {
    pub fn new() -> Self {
        Self {
            engine: RuleEngine::new(
                "sec",
                vec![
                    Box::new(HardcodedSecret),
                    Box::new(SqlInjection),
                    Box::new(WeakRandom),
                    Box::new(InfoDisclosure),
                    Box::new(WeakCrypto),
                    Box::new(InsecureFilePermissions),
                    Box::new(InsecureHttp),
                ],
            ),
        }
    }

    /// The underlying rule set.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Parse and scan one source file.
    pub fn analyze(
        &self,
        ctx: &ToolContext,
        code: &str,
        file: &str,
    ) -> Result<SecurityReport, ToolError> {
        let parsed = go::parse(file, code)?;
        let issues = self.engine.scan(&parsed, ctx)?;
        let statistics = IssueStatistics::from_issues(&issues, true);
        debug!(file, issues = issues.len(), "security scan finished");

        Ok(SecurityReport {
            file: file.to_string(),
            total: issues.len(),
            summary: summarize(&statistics),
            issues,
            statistics,
        })
    }
}

impl Default for SecurityScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(stats: &IssueStatistics) -> String {
    if stats.total_issues == 0 {
        return "No security issues detected".to_string();
    }
    format!(
        "Detected {} security issue{} ({})",
        stats.total_issues,
        if stats.total_issues == 1 { "" } else { "s" },
        stats.breakdown()
    )
}

impl Tool for SecurityScanner {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Detects security risks in Go code (hard-coded secrets, SQL injection, weak randomness and crypto)"
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
