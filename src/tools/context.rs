//! Execution context handed to every tool run.
//!
//! A context carries an optional deadline, a chain of cancellation flags
//! (its own plus every ancestor's) and the tool's custom configuration.
//! Tools are synchronous, so cancellation is cooperative: long passes call
//! [`ToolContext::check`] periodically and stop with the returned error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::ToolError;

/// Deadline, cancellation and configuration for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    deadline: Option<Instant>,
    flags: Vec<Arc<AtomicBool>>,
    custom: Arc<HashMap<String, Value>>,
}

impl ToolContext {
    /// A context with no deadline that is never cancelled by anyone else.
    pub fn background() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
            ..Default::default()
        }
    }

    /// Derive a child bounded by `timeout` from now.
    ///
    /// The child keeps the earlier of its own and the parent's deadline and
    /// observes the parent's cancellation. A zero timeout adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        if !timeout.is_zero() {
            let own = Instant::now() + timeout;
            child.deadline = Some(match self.deadline {
                Some(parent) => parent.min(own),
                None => own,
            });
        }
        child
    }

    /// Derive a child with its own cancellation flag.
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self {
            deadline: self.deadline,
            flags,
            custom: Arc::clone(&self.custom),
        }
    }

    /// Replace the custom configuration bag.
    pub fn with_custom(mut self, custom: HashMap<String, Value>) -> Self {
        self.custom = Arc::new(custom);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    /// Whether this context or any ancestor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// Fail fast once the deadline passed or the context was cancelled.
    pub fn check(&self) -> Result<(), ToolError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ToolError::DeadlineExceeded);
            }
        }
        if self.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        Ok(())
    }

    /// A list of strings from the custom bag; missing or malformed keys yield nothing.
    pub fn custom_strings(&self, key: &str) -> Vec<String> {
        match self.custom.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_background_never_expires() {
        let ctx = ToolContext::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_zero_timeout_means_no_deadline() {
        let ctx = ToolContext::background().with_timeout(Duration::ZERO);
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = ToolContext::background().with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(ctx.check(), Err(ToolError::DeadlineExceeded)));
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = ToolContext::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_parent_cancel_reaches_child() {
        let parent = ToolContext::background();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(matches!(child.check(), Err(ToolError::Cancelled)));
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let parent = ToolContext::background();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_custom_strings() {
        let mut custom = HashMap::new();
        custom.insert("disabled_rules".to_string(), json!(["B104", "B102"]));
        custom.insert("csv".to_string(), json!("G101, G201"));
        custom.insert("bad".to_string(), json!(3));
        let ctx = ToolContext::background().with_custom(custom);

        assert_eq!(ctx.custom_strings("disabled_rules"), vec!["B104", "B102"]);
        assert_eq!(ctx.custom_strings("csv"), vec!["G101", "G201"]);
        assert!(ctx.custom_strings("bad").is_empty());
        assert!(ctx.custom_strings("missing").is_empty());
    }
}
