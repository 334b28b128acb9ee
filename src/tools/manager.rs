//! Tool registry with validation, timeout and retry.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Tool, ToolContext, ToolError, ToolInput, ToolResult};

/// Default per-tool timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of extra attempts after a failure.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Per-tool settings owned by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub name: String,
    pub enabled: bool,
    /// Zero means no timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Opaque options forwarded to the tool through its context.
    pub custom: HashMap<String, Value>,
}

impl ToolConfig {
    /// Enabled, 30 second timeout, one retry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            custom: HashMap::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set one custom option.
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.custom.insert(key.to_string(), value.into());
        self
    }
}

/// Snapshot row returned by [`ToolManager::list_with_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[serde(rename = "timeout_ms", serialize_with = "serialize_millis")]
    pub timeout: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Default)]
struct Registry {
    tools: HashMap<String, Arc<dyn Tool>>,
    configs: HashMap<String, ToolConfig>,
}

/// Concurrency-safe registry of tools and their configuration.
///
/// Both maps sit behind one reader/writer lock. The lock is only held for
/// lookups and copies, never across a tool run, so a slow analyzer cannot
/// block registration or status changes.
#[derive(Default)]
pub struct ToolManager {
    registry: RwLock<Registry>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tool under its own name.
    ///
    /// The config's `name` is overwritten with the tool's name.
    pub fn register(&self, tool: Arc<dyn Tool>, mut config: ToolConfig) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidInput("tool name is empty".into()));
        }

        let mut registry = self.write();
        if registry.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }

        config.name = name.clone();
        let enabled = config.enabled;
        registry.tools.insert(name.clone(), tool);
        registry.configs.insert(name.clone(), config);
        drop(registry);

        info!(tool = %name, enabled, "registered tool");
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<(Arc<dyn Tool>, ToolConfig), ToolError> {
        let registry = self.read();
        let tool = registry
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let config = registry
            .configs
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolConfig::new(name));
        if !config.enabled {
            return Err(ToolError::Disabled(name.to_string()));
        }
        Ok((Arc::clone(tool), config))
    }

    /// Look up an invocable tool.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.resolve(name).map(|(tool, _)| tool)
    }

    /// Current configuration of a registered tool, enabled or not.
    pub fn config(&self, name: &str) -> Result<ToolConfig, ToolError> {
        self.read()
            .configs
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enable(&self, name: &str) -> Result<(), ToolError> {
        self.set_enabled(name, true)
    }

    pub fn disable(&self, name: &str) -> Result<(), ToolError> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), ToolError> {
        let mut registry = self.write();
        let config = registry
            .configs
            .get_mut(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        config.enabled = enabled;
        drop(registry);

        info!(tool = %name, enabled, "tool status changed");
        Ok(())
    }

    /// Replace a tool's configuration. In-flight runs keep the copy they started with.
    pub fn update_config(&self, name: &str, mut config: ToolConfig) -> Result<(), ToolError> {
        let mut registry = self.write();
        if !registry.tools.contains_key(name) {
            return Err(ToolError::NotFound(name.to_string()));
        }
        config.name = name.to_string();
        debug!(
            tool = %name,
            enabled = config.enabled,
            timeout_ms = config.timeout.as_millis() as u64,
            max_retries = config.max_retries,
            "updated tool config"
        );
        registry.configs.insert(name.to_string(), config);
        Ok(())
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Name, description, enabled flag and timeout of every tool, sorted by name.
    pub fn list_with_status(&self) -> Vec<ToolStatus> {
        let registry = self.read();
        let mut rows: Vec<ToolStatus> = registry
            .tools
            .iter()
            .map(|(name, tool)| {
                let config = registry.configs.get(name);
                ToolStatus {
                    name: name.clone(),
                    description: tool.description().to_string(),
                    enabled: config.map(|c| c.enabled).unwrap_or(false),
                    timeout: config.map(|c| c.timeout).unwrap_or_default(),
                }
            })
            .collect();
        drop(registry);

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Run a tool.
    ///
    /// Not-found and disabled tools are returned as errors. Everything that
    /// happens after dispatch (validation failures, parse errors, timeouts,
    /// panics) is reported inside an unsuccessful [`ToolResult`].
    ///
    /// The timeout covers the whole attempt sequence. When it elapses the
    /// manager stops waiting and cancels the context; the blocking worker is
    /// detached and its result dropped once it notices the cancellation.
    pub async fn run(
        &self,
        ctx: &ToolContext,
        name: &str,
        input: &ToolInput,
    ) -> Result<ToolResult, ToolError> {
        let (tool, config) = self.resolve(name)?;
        let started = Instant::now();

        if let Err(err) = tool.validate(input) {
            let reason = match err {
                ToolError::InvalidInput(msg) => msg,
                other => other.to_string(),
            };
            debug!(tool = %name, %reason, "input validation failed");
            return Ok(
                ToolResult::failure(format!("input validation failed: {}", reason), started.elapsed())
                    .with_metadata("tool", name),
            );
        }

        let run_ctx = ctx
            .with_timeout(config.timeout)
            .with_custom(config.custom.clone());
        let input = Arc::new(input.clone());

        let mut attempts = 0u32;
        let mut outcome = Err(ToolError::Execution("tool was not run".into()));
        for attempt in 0..=config.max_retries {
            attempts = attempt + 1;
            outcome = execute(&tool, &run_ctx, &input).await;
            match &outcome {
                Ok(_) => break,
                Err(err) if err.is_timeout() => {
                    warn!(
                        tool = %name,
                        attempt = attempts,
                        timeout_ms = config.timeout.as_millis() as u64,
                        "tool timed out"
                    );
                    break;
                }
                Err(err) if err.is_terminal() => {
                    warn!(tool = %name, attempt = attempts, error = %err, "tool attempt aborted");
                    break;
                }
                Err(err) if attempt < config.max_retries => {
                    warn!(tool = %name, attempt = attempts, error = %err, "tool attempt failed, retrying");
                }
                Err(err) => {
                    warn!(tool = %name, attempt = attempts, error = %err, "tool failed");
                }
            }
        }

        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(payload) => {
                info!(
                    tool = %name,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "tool completed"
                );
                ToolResult::success(payload, elapsed)
            }
            Err(err) => ToolResult::failure(err.to_string(), elapsed),
        };

        Ok(result
            .with_metadata("tool", name)
            .with_metadata("attempts", attempts)
            .with_metadata("timeout_ms", config.timeout.as_millis() as u64))
    }

    /// Run several tools concurrently over the same input.
    ///
    /// Always yields one entry per requested name, in request order.
    pub async fn run_batch(
        &self,
        ctx: &ToolContext,
        names: &[&str],
        input: &ToolInput,
    ) -> Vec<(String, Result<ToolResult, ToolError>)> {
        let runs = names.iter().map(|name| async move {
            let outcome = self.run(ctx, name, input).await;
            (name.to_string(), outcome)
        });
        futures::future::join_all(runs).await
    }
}

/// One attempt: run the tool on the blocking pool and wait until the deadline.
async fn execute(
    tool: &Arc<dyn Tool>,
    ctx: &ToolContext,
    input: &Arc<ToolInput>,
) -> Result<String, ToolError> {
    ctx.check().map_err(as_timeout)?;

    let worker = Arc::clone(tool);
    let worker_ctx = ctx.clone();
    let worker_input = Arc::clone(input);
    let handle = tokio::task::spawn_blocking(move || worker.run(&worker_ctx, &worker_input));

    let joined = match ctx.deadline() {
        Some(deadline) => {
            let deadline = tokio::time::Instant::from_std(deadline);
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    ctx.cancel();
                    return Err(ToolError::Timeout);
                }
            }
        }
        None => handle.await,
    };

    match joined {
        Ok(outcome) => outcome.map_err(as_timeout),
        Err(err) if err.is_panic() => Err(ToolError::Execution(format!(
            "tool panicked: {}",
            panic_message(err.into_panic())
        ))),
        Err(err) => Err(ToolError::Execution(err.to_string())),
    }
}

fn as_timeout(err: ToolError) -> ToolError {
    match err {
        ToolError::DeadlineExceeded => ToolError::Timeout,
        other => other,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
