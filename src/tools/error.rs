//! Error taxonomy shared by the tool contract and the manager.

use thiserror::Error;

use crate::analysis::AnalysisError;

/// Errors produced while dispatching or executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("tool is disabled: {0}")]
    Disabled(String),

    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The manager stopped waiting because the tool's timeout elapsed.
    #[error("tool execution timed out")]
    Timeout,

    /// Raised by a tool that observed its context deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context cancelled")]
    Cancelled,

    #[error("parse error: {0}")]
    Parse(#[from] AnalysisError),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ToolError {
    /// Registry errors are returned from dispatch instead of inside a result.
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            ToolError::NotFound(_) | ToolError::Disabled(_) | ToolError::AlreadyRegistered(_)
        )
    }

    /// Errors that end an attempt sequence without further retries.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolError::Timeout | ToolError::DeadlineExceeded | ToolError::Cancelled
        )
    }

    /// Whether this error is the timeout sentinel.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout | ToolError::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ToolError::NotFound("x".into()).is_registry_error());
        assert!(ToolError::Disabled("x".into()).is_registry_error());
        assert!(!ToolError::Timeout.is_registry_error());

        assert!(ToolError::Timeout.is_terminal());
        assert!(ToolError::DeadlineExceeded.is_terminal());
        assert!(ToolError::Cancelled.is_terminal());
        assert!(!ToolError::Execution("boom".into()).is_terminal());

        assert!(ToolError::Timeout.is_timeout());
        assert!(ToolError::DeadlineExceeded.is_timeout());
        assert!(!ToolError::Cancelled.is_timeout());
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(ToolError::Timeout.to_string(), "tool execution timed out");
    }
}
