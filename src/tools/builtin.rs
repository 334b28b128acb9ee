//! Registration of the bundled Go analyzers.

use std::sync::Arc;

use tracing::debug;

use crate::config::Settings;
use crate::detect::{BugDetector, ComplexityAnalyzer, SecurityScanner};

use super::{ToolError, ToolManager};

pub use crate::detect::names::{BUG_DETECTOR, COMPLEXITY_ANALYZER, SECURITY_SCANNER};

/// Register the complexity analyzer, security scanner and bug detector with
/// configs taken from `settings`.
pub fn register_builtin(manager: &ToolManager, settings: &Settings) -> Result<(), ToolError> {
    let bugs = BugDetector::new()
        .excluded_paths(&settings.excluded_paths)
        .map_err(|e| ToolError::InvalidInput(format!("invalid excluded path pattern: {}", e)))?;

    manager.register(
        Arc::new(ComplexityAnalyzer::new()),
        settings.tool_config(COMPLEXITY_ANALYZER),
    )?;
    manager.register(
        Arc::new(SecurityScanner::new()),
        settings.tool_config(SECURITY_SCANNER),
    )?;
    manager.register(Arc::new(bugs), settings.tool_config(BUG_DETECTOR))?;
    debug!(tools = manager.len(), "builtin tools registered");
    Ok(())
}
