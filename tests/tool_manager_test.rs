//! Integration tests for the tool manager: dispatch, timeout, retry and
//! concurrency, using both the built-in analyzers and small test tools.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use goinsight::tools::{
    InputKind, Tool, ToolConfig, ToolContext, ToolError, ToolInput, ToolManager, BUG_DETECTOR,
    COMPLEXITY_ANALYZER, SECURITY_SCANNER,
};
use goinsight::{register_builtin, Settings};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn fixture(name: &str) -> ToolInput {
    let path = testdata_path().join(name);
    let code = std::fs::read_to_string(&path).expect("fixture should exist");
    ToolInput::source_file(code, name)
}

fn builtin_manager() -> ToolManager {
    let manager = ToolManager::new();
    register_builtin(&manager, &Settings::default()).expect("builtin registration");
    manager
}

/// Polls its context until cancelled, or gives up after two seconds.
struct Sleepy;

impl Tool for Sleepy {
    fn name(&self) -> &str {
        "sleepy"
    }
    fn description(&self) -> &str {
        "waits for cancellation"
    }
    fn input_kind(&self) -> InputKind {
        InputKind::Source
    }
    fn run(&self, ctx: &ToolContext, _input: &ToolInput) -> Result<String, ToolError> {
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(2) {
            ctx.check()?;
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok("{}".into())
    }
}

/// Fails the first `failures` calls, then succeeds.
struct Flaky {
    calls: AtomicUsize,
    failures: usize,
}

impl Flaky {
    fn new(failures: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
        }
    }
}

impl Tool for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }
    fn description(&self) -> &str {
        "fails a few times"
    }
    fn input_kind(&self) -> InputKind {
        InputKind::Source
    }
    fn run(&self, _ctx: &ToolContext, _input: &ToolInput) -> Result<String, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ToolError::Execution(format!("transient failure {}", call)));
        }
        Ok(r#"{"ok":true}"#.into())
    }
}

struct Panicky;

impl Tool for Panicky {
    fn name(&self) -> &str {
        "panicky"
    }
    fn description(&self) -> &str {
        "always panics"
    }
    fn input_kind(&self) -> InputKind {
        InputKind::Source
    }
    fn run(&self, _ctx: &ToolContext, _input: &ToolInput) -> Result<String, ToolError> {
        panic!("boom")
    }
}

#[tokio::test]
async fn test_security_scan_through_manager() {
    let manager = builtin_manager();
    let result = manager
        .run(&ToolContext::background(), SECURITY_SCANNER, &fixture("insecure.go"))
        .await
        .unwrap();

    assert!(result.success, "error: {:?}", result.error);
    let payload = result.payload().unwrap();
    assert_eq!(payload["total"], 8);
    assert_eq!(payload["statistics"]["critical"], 3);
    assert_eq!(result.metadata["tool"], SECURITY_SCANNER);
    assert_eq!(result.metadata["attempts"], 1);
    assert_eq!(result.metadata["timeout_ms"], 30_000);
}

#[tokio::test]
async fn test_timeout_terminates_without_retry() {
    let manager = ToolManager::new();
    let timeout = Duration::from_millis(100);
    manager
        .register(
            Arc::new(Sleepy),
            ToolConfig::new("sleepy").timeout(timeout).max_retries(3),
        )
        .unwrap();

    let started = Instant::now();
    let result = manager
        .run(&ToolContext::background(), "sleepy", &ToolInput::source("x"))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("tool execution timed out"));
    assert!(result.execution_time >= timeout);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.metadata["attempts"], 1);
}

#[tokio::test]
async fn test_retry_then_success() {
    let manager = ToolManager::new();
    manager
        .register(Arc::new(Flaky::new(1)), ToolConfig::new("flaky").max_retries(1))
        .unwrap();

    let result = manager
        .run(&ToolContext::background(), "flaky", &ToolInput::source("x"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.metadata["attempts"], 2);
}

#[tokio::test]
async fn test_no_retry_fails() {
    let manager = ToolManager::new();
    manager
        .register(Arc::new(Flaky::new(1)), ToolConfig::new("flaky").max_retries(0))
        .unwrap();

    let result = manager
        .run(&ToolContext::background(), "flaky", &ToolInput::source("x"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("transient failure 0"));
    assert_eq!(result.metadata["attempts"], 1);
}

#[tokio::test]
async fn test_panic_becomes_failed_result() {
    let manager = ToolManager::new();
    manager
        .register(Arc::new(Panicky), ToolConfig::new("panicky").max_retries(0))
        .unwrap();

    let result = manager
        .run(&ToolContext::background(), "panicky", &ToolInput::source("x"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("tool panicked: boom"));
}

#[tokio::test]
async fn test_disabled_tool_not_invoked() {
    let manager = ToolManager::new();
    let flaky = Arc::new(Flaky::new(0));
    manager
        .register(flaky.clone(), ToolConfig::new("flaky"))
        .unwrap();
    manager.disable("flaky").unwrap();

    let err = manager
        .run(&ToolContext::background(), "flaky", &ToolInput::source("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Disabled(_)));
    assert!(matches!(manager.get("flaky"), Err(ToolError::Disabled(_))));
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 0);

    manager.enable("flaky").unwrap();
    let result = manager
        .run(&ToolContext::background(), "flaky", &ToolInput::source("x"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_tool() {
    let manager = builtin_manager();
    let err = manager
        .run(&ToolContext::background(), "linter", &ToolInput::source("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));
    assert!(matches!(manager.enable("linter"), Err(ToolError::NotFound(_))));
}

#[tokio::test]
async fn test_validation_failure_is_result() {
    let manager = builtin_manager();
    let input = ToolInput::Directory {
        path: testdata_path(),
    };
    let result = manager
        .run(&ToolContext::background(), SECURITY_SCANNER, &input)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result
        .error
        .unwrap()
        .starts_with("input validation failed"));

    let empty = manager
        .run(&ToolContext::background(), COMPLEXITY_ANALYZER, &ToolInput::source("  "))
        .await
        .unwrap();
    assert!(!empty.success);
}

#[tokio::test]
async fn test_parse_error_is_failed_result() {
    let manager = builtin_manager();
    let result = manager
        .run(&ToolContext::background(), COMPLEXITY_ANALYZER, &fixture("broken.go"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("parse error"));
}

#[tokio::test]
async fn test_custom_options_reach_tool() {
    let manager = builtin_manager();
    let config = manager
        .config(BUG_DETECTOR)
        .unwrap()
        .option("disabled_rules", serde_json::json!(["B104"]));
    manager.update_config(BUG_DETECTOR, config).unwrap();

    let result = manager
        .run(&ToolContext::background(), BUG_DETECTOR, &fixture("buggy.go"))
        .await
        .unwrap();
    let payload = result.payload().unwrap();
    let rules: Vec<&str> = payload["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["rule_id"].as_str().unwrap())
        .collect();
    assert_eq!(rules, vec!["B101", "B102", "B103"]);
}

#[tokio::test]
async fn test_run_batch_keeps_request_order() {
    let manager = builtin_manager();
    manager.disable(SECURITY_SCANNER).unwrap();

    let names = [BUG_DETECTOR, "missing", SECURITY_SCANNER, COMPLEXITY_ANALYZER];
    let results = manager
        .run_batch(&ToolContext::background(), &names, &fixture("complex.go"))
        .await;

    let returned: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(returned, names);
    assert!(results[0].1.as_ref().unwrap().success);
    assert!(matches!(results[1].1, Err(ToolError::NotFound(_))));
    assert!(matches!(results[2].1, Err(ToolError::Disabled(_))));
    assert!(results[3].1.as_ref().unwrap().success);
}

#[tokio::test]
async fn test_list_with_status() {
    let manager = builtin_manager();
    manager.disable(BUG_DETECTOR).unwrap();

    let rows = manager.list_with_status();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![BUG_DETECTOR, COMPLEXITY_ANALYZER, SECURITY_SCANNER]);
    assert!(!rows[0].enabled);
    assert!(rows[1].enabled);
    assert!(!rows[2].description.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_are_independent() {
    let manager = Arc::new(builtin_manager());
    let input = Arc::new(fixture("insecure.go"));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let input = Arc::clone(&input);
        handles.push(tokio::spawn(async move {
            manager
                .run(&ToolContext::background(), SECURITY_SCANNER, &input)
                .await
                .unwrap()
                .result
        }));
    }

    let mut payloads = Vec::new();
    for handle in handles {
        payloads.push(handle.await.unwrap());
    }
    assert!(payloads.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_cancelled_parent_context() {
    let manager = builtin_manager();
    let ctx = ToolContext::background();
    ctx.cancel();
    let result = manager
        .run(&ctx, COMPLEXITY_ANALYZER, &fixture("complex.go"))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("context cancelled"));
}
