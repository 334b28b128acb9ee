//! Settings file for goinsight.
//!
//! Settings are read from YAML, then overridden from `GOINSIGHT_*`
//! environment variables, then validated. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolConfig;

/// Settings file names searched in the working directory, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["goinsight.yaml", ".goinsight.yaml"];

/// Default settings written by `goinsight init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/goinsight.yaml");

const ENV_FORMAT: &str = "GOINSIGHT_FORMAT";
const ENV_VERBOSE: &str = "GOINSIGHT_VERBOSE";
const ENV_LOG_LEVEL: &str = "GOINSIGHT_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "GOINSIGHT_LOG_FORMAT";
const ENV_LOG_OUTPUT: &str = "GOINSIGHT_LOG_OUTPUT";
const ENV_LOG_FILE: &str = "GOINSIGHT_LOG_FILE";

const VALID_FORMATS: &[&str] = &["pretty", "json"];
const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_LOG_OUTPUTS: &[&str] = &["stdout", "stderr", "file"];

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Glob patterns skipped by directory scans, e.g. `**/vendor/**`.
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Per-tool overrides keyed by tool name.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSettings>,
}

/// How results are printed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputSettings {
    /// "pretty" (default) or "json"
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

/// Where and how log events are written.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
    /// "text" (default) or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// "stdout", "stderr" (default) or "file"
    #[serde(default = "default_log_output")]
    pub output: String,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_log_format(),
            output: default_log_output(),
            file_path: None,
        }
    }
}

/// Overrides for one registered tool. Unset fields keep the manager defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolSettings {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Forwarded to the tool as its custom config.
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

fn default_format() -> String {
    "pretty".to_string()
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_output() -> String {
    "stderr".to_string()
}

impl Settings {
    /// Parse settings from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse settings from YAML text. Blank text yields the defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load, apply environment overrides and validate.
    ///
    /// An explicit path must exist. Without one, the working directory and
    /// then the user config directory are searched; no file means defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover(),
        };
        let mut settings = match &source {
            Some(path) => Self::parse_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok((settings, source))
    }

    /// Override fields from environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_FORMAT) {
            self.output.format = v.to_lowercase();
        }
        if let Some(v) = lookup(ENV_VERBOSE) {
            self.output.verbose = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = v.to_lowercase();
        }
        if let Some(v) = lookup(ENV_LOG_OUTPUT) {
            self.logging.output = v.to_lowercase();
        }
        if let Some(v) = lookup(ENV_LOG_FILE) {
            self.logging.file_path = Some(PathBuf::from(v));
        }
    }

    /// Reject unknown enum values and incomplete file logging.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_one_of("output.format", &self.output.format, VALID_FORMATS)?;
        check_one_of("logging.level", &self.logging.level, VALID_LEVELS)?;
        check_one_of("logging.format", &self.logging.format, VALID_LOG_FORMATS)?;
        check_one_of("logging.output", &self.logging.output, VALID_LOG_OUTPUTS)?;
        if self.logging.output == "file" && self.logging.file_path.is_none() {
            bail!("logging.file_path is required when logging.output is \"file\"");
        }
        for pattern in &self.excluded_paths {
            globset::Glob::new(pattern)
                .with_context(|| format!("invalid excluded_paths pattern {:?}", pattern))?;
        }
        Ok(())
    }

    /// Manager config for a tool, defaults overridden by the settings file.
    pub fn tool_config(&self, name: &str) -> ToolConfig {
        let mut config = ToolConfig::new(name);
        if let Some(overrides) = self.tools.get(name) {
            if let Some(enabled) = overrides.enabled {
                config = config.enabled(enabled);
            }
            if let Some(ms) = overrides.timeout_ms {
                config = config.timeout(Duration::from_millis(ms));
            }
            if let Some(retries) = overrides.max_retries {
                config = config.max_retries(retries);
            }
            config.custom = overrides.options.clone();
        }
        config
    }
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> anyhow::Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    bail!(
        "invalid {} {:?}, must be one of: {}",
        field,
        value,
        allowed.join(", ")
    )
}

/// First settings file found in the working directory or user config dir.
pub fn discover() -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .or_else(|| user_config_path().filter(|p| p.is_file()))
}

/// `<config dir>/goinsight/config.yaml` for the current user.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "goinsight")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_str("").unwrap();
        assert_eq!(settings.output.format, "pretty");
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.logging.output, "stderr");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_template_is_valid() {
        let settings = Settings::parse_str(DEFAULT_TEMPLATE).unwrap();
        settings.validate().unwrap();
        assert!(settings.tools.contains_key("bug_detector"));
    }

    #[test]
    fn test_parse_file_and_tool_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
output:
  format: json
excluded_paths: ["**/vendor/**"]
tools:
  bug_detector:
    timeout_ms: 1500
    max_retries: 0
    options:
      disabled_rules: [B104]
  security_scanner:
    enabled: false
"#
        )
        .unwrap();

        let settings = Settings::parse_file(file.path()).unwrap();
        assert_eq!(settings.output.format, "json");
        assert_eq!(settings.excluded_paths, vec!["**/vendor/**"]);

        let bug = settings.tool_config("bug_detector");
        assert_eq!(bug.timeout, Duration::from_millis(1500));
        assert_eq!(bug.max_retries, 0);
        assert!(bug.enabled);
        assert_eq!(bug.custom["disabled_rules"], serde_json::json!(["B104"]));

        assert!(!settings.tool_config("security_scanner").enabled);

        let untouched = settings.tool_config("complexity_analyzer");
        assert_eq!(untouched, ToolConfig::new("complexity_analyzer"));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            "GOINSIGHT_FORMAT" => Some("JSON".into()),
            "GOINSIGHT_VERBOSE" => Some("true".into()),
            "GOINSIGHT_LOG_OUTPUT" => Some("file".into()),
            "GOINSIGHT_LOG_FILE" => Some("/tmp/goinsight.log".into()),
            _ => None,
        });
        assert_eq!(settings.output.format, "json");
        assert!(settings.output.verbose);
        assert_eq!(settings.logging.output, "file");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut settings = Settings::default();
        settings.output.format = "sarif".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.logging.level = "loud".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.logging.output = "file".into();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("file_path"));

        let mut settings = Settings::default();
        settings.excluded_paths = vec!["[".into()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        assert!(Settings::load(Some(Path::new("/no/such/goinsight.yaml"))).is_err());
    }
}
