//! The tool contract and the machinery that runs tools.
//!
//! A [`Tool`] is a named, stateless analyzer. Tools never call each other;
//! every invocation goes through the [`ToolManager`], which owns per-tool
//! configuration and applies validation, timeout and retry uniformly.
//!
//! Tool payloads are self-describing JSON strings, so the manager and the
//! command layer never need analyzer-specific knowledge to move results
//! around.

mod builtin;
mod context;
mod error;
mod manager;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub use builtin::{register_builtin, BUG_DETECTOR, COMPLEXITY_ANALYZER, SECURITY_SCANNER};
pub use context::ToolContext;
pub use error::ToolError;
pub use manager::{ToolConfig, ToolManager, ToolStatus};

/// Input handed to a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolInput {
    /// One in-memory Go source; `file` is only used for display.
    Source {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
    /// A list of files analysed one by one.
    Files { paths: Vec<PathBuf> },
    /// A directory walked recursively.
    Directory { path: PathBuf },
}

impl ToolInput {
    /// Source input without a file name.
    pub fn source(code: impl Into<String>) -> Self {
        ToolInput::Source {
            code: code.into(),
            file: None,
        }
    }

    /// Source input labelled with the file it came from.
    pub fn source_file(code: impl Into<String>, file: impl Into<String>) -> Self {
        ToolInput::Source {
            code: code.into(),
            file: Some(file.into()),
        }
    }

    /// Short variant name used in validation messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ToolInput::Source { .. } => "source",
            ToolInput::Files { .. } => "files",
            ToolInput::Directory { .. } => "directory",
        }
    }
}

/// Input shapes a tool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Only [`ToolInput::Source`].
    Source,
    /// Source, file lists and directories.
    SourceOrPaths,
}

impl InputKind {
    /// Whether an input variant is acceptable for this kind.
    pub fn accepts(&self, input: &ToolInput) -> bool {
        match self {
            InputKind::Source => matches!(input, ToolInput::Source { .. }),
            InputKind::SourceOrPaths => true,
        }
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Source => write!(f, "source"),
            InputKind::SourceOrPaths => write!(f, "source, files or directory"),
        }
    }
}

/// Structural pre-check shared by every tool.
///
/// Rejects a variant the kind does not accept and empty required fields.
pub fn validate_input(kind: InputKind, input: &ToolInput) -> Result<(), ToolError> {
    if !kind.accepts(input) {
        return Err(ToolError::InvalidInput(format!(
            "expected {} input, got {}",
            kind,
            input.kind_name()
        )));
    }

    match input {
        ToolInput::Source { code, .. } => {
            if code.trim().is_empty() {
                return Err(ToolError::InvalidInput("source code is empty".into()));
            }
        }
        ToolInput::Files { paths } => {
            if paths.is_empty() {
                return Err(ToolError::InvalidInput("file list is empty".into()));
            }
            if paths.iter().any(|p| p.as_os_str().is_empty()) {
                return Err(ToolError::InvalidInput("file list contains an empty path".into()));
            }
        }
        ToolInput::Directory { path } => {
            if path.as_os_str().is_empty() {
                return Err(ToolError::InvalidInput("directory path is empty".into()));
            }
        }
    }
    Ok(())
}

/// A named analysis unit.
///
/// Implementations hold no per-invocation state: the same instance serves
/// concurrent runs on different threads.
pub trait Tool: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// One-line capability hint.
    fn description(&self) -> &str;

    /// Accepted input shapes.
    fn input_kind(&self) -> InputKind;

    /// Reject malformed input before any work is done.
    fn validate(&self, input: &ToolInput) -> Result<(), ToolError> {
        validate_input(self.input_kind(), input)
    }

    /// Run on validated input and return a JSON payload.
    fn run(&self, ctx: &ToolContext, input: &ToolInput) -> Result<String, ToolError>;
}

/// Outcome of one managed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Tool payload, empty on failure.
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time across every attempt.
    #[serde(
        rename = "execution_time_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub execution_time: Duration,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ToolResult {
    /// A successful result carrying `payload`.
    pub fn success(payload: String, execution_time: Duration) -> Self {
        Self {
            success: true,
            result: payload,
            error: None,
            execution_time,
            metadata: BTreeMap::new(),
        }
    }

    /// An unsuccessful result with a human-readable cause.
    pub fn failure(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            result: String::new(),
            error: Some(error.into()),
            execution_time,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Parse the payload as JSON.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.result)
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn deserialize_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_rejects_paths() {
        let input = ToolInput::Directory {
            path: PathBuf::from("."),
        };
        let err = validate_input(InputKind::Source, &input).unwrap_err();
        assert!(err.to_string().contains("expected source input, got directory"));
        assert!(validate_input(InputKind::SourceOrPaths, &input).is_ok());
    }

    #[test]
    fn test_empty_source_rejected() {
        let err = validate_input(InputKind::Source, &ToolInput::source("  \n\t")).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_file_list_rejected() {
        let input = ToolInput::Files { paths: vec![] };
        assert!(validate_input(InputKind::SourceOrPaths, &input).is_err());

        let input = ToolInput::Files {
            paths: vec![PathBuf::from("a.go"), PathBuf::new()],
        };
        assert!(validate_input(InputKind::SourceOrPaths, &input).is_err());
    }

    #[test]
    fn test_input_wire_format() {
        let input = ToolInput::source_file("package main", "main.go");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["kind"], "source");
        assert_eq!(json["file"], "main.go");

        let back: ToolInput =
            serde_json::from_str(r#"{"kind":"files","paths":["a.go","b.go"]}"#).unwrap();
        assert_eq!(
            back,
            ToolInput::Files {
                paths: vec![PathBuf::from("a.go"), PathBuf::from("b.go")]
            }
        );
    }

    #[test]
    fn test_result_serializes_millis() {
        let result = ToolResult::success("{}".into(), Duration::from_millis(1500))
            .with_metadata("tool", "complexity_analyzer");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["execution_time_ms"], 1500);
        assert_eq!(json["metadata"]["tool"], "complexity_analyzer");
        assert!(json.get("error").is_none());
    }
}
