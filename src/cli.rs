//! Command-line interface for goinsight.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use crate::config::{self, Settings};
use crate::logging;
use crate::report::{self, OutputFormat};
use crate::tools::{
    register_builtin, ToolContext, ToolError, ToolInput, ToolManager, ToolResult, BUG_DETECTOR,
    COMPLEXITY_ANALYZER, SECURITY_SCANNER,
};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Go code quality toolkit.
///
/// Measures cyclomatic complexity, scans for common security mistakes and
/// detects frequent bug patterns in Go source code.
#[derive(Parser)]
#[command(name = "goinsight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Path to settings YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Show every function, skipped files and fix suggestions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level: trace, debug, info, warn, error or off
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure cyclomatic complexity of every function in a Go file
    Complexity(FileArgs),
    /// Scan a Go file for security issues
    Security(FileArgs),
    /// Detect common bugs in Go files or directories
    Bug(BugArgs),
    /// Run every analyzer over a Go file
    Analyze(FileArgs),
    /// List registered tools and their status
    List,
    /// Write a default settings file
    Init(InitArgs),
}

/// A single Go source file.
#[derive(Args)]
pub struct FileArgs {
    /// Go source file
    pub file: PathBuf,
}

/// Arguments for the bug command.
#[derive(Args)]
pub struct BugArgs {
    /// One file, several files, or a directory
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "goinsight.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Resolve settings from the file, the environment and command-line flags.
pub fn resolve_settings(global: &GlobalArgs) -> anyhow::Result<(Settings, Option<PathBuf>)> {
    let (mut settings, source) = Settings::load(global.config.as_deref())?;
    if let Some(format) = &global.format {
        settings.output.format = format.to_lowercase();
    }
    if global.verbose {
        settings.output.verbose = true;
    }
    if let Some(level) = &global.log_level {
        settings.logging.level = level.to_lowercase();
    }
    settings.validate()?;
    Ok((settings, source))
}

/// Run the parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    if let Commands::Init(args) = &cli.command {
        return run_init(args);
    }

    let (settings, source) = resolve_settings(&cli.global)?;
    logging::init(&settings.logging, settings.output.verbose)?;
    match &source {
        Some(path) => debug!(config = %path.display(), "settings loaded"),
        None => debug!("no settings file found, using defaults"),
    }

    let format: OutputFormat = settings
        .output
        .format
        .parse()
        .map_err(anyhow::Error::msg)?;
    let verbose = settings.output.verbose;

    let manager = ToolManager::new();
    register_builtin(&manager, &settings)?;
    let ctx = ToolContext::background();

    let (target, results) = match &cli.command {
        Commands::Complexity(args) => single(&manager, &ctx, COMPLEXITY_ANALYZER, &args.file).await?,
        Commands::Security(args) => single(&manager, &ctx, SECURITY_SCANNER, &args.file).await?,
        Commands::Bug(args) => {
            let input = bug_input(&args.paths)?;
            let result = manager.run(&ctx, BUG_DETECTOR, &input).await?;
            (describe_paths(&args.paths), vec![(BUG_DETECTOR.to_string(), result)])
        }
        Commands::Analyze(args) => {
            let input = read_source(&args.file)?;
            let names = [COMPLEXITY_ANALYZER, SECURITY_SCANNER, BUG_DETECTOR];
            let outcomes = manager.run_batch(&ctx, &names, &input).await;
            (args.file.display().to_string(), available_results(outcomes)?)
        }
        Commands::List => {
            report::write_tool_list(&manager.list_with_status(), format)?;
            return Ok(EXIT_SUCCESS);
        }
        Commands::Init(args) => return run_init(args),
    };

    match format {
        OutputFormat::Json => report::write_json(&results)?,
        OutputFormat::Pretty => report::write_pretty(&target, &results, verbose),
    }

    Ok(exit_code(&results))
}

/// 1 when any tool failed or reported findings, else 0.
pub fn exit_code(results: &[(String, ToolResult)]) -> i32 {
    let failed = results.iter().any(|(_, r)| !r.success);
    let findings: usize = results
        .iter()
        .map(|(name, r)| report::finding_count(name, r))
        .sum();
    if failed || findings > 0 {
        EXIT_FAILED
    } else {
        EXIT_SUCCESS
    }
}

/// Keep the results of tools that ran. Disabled or unknown tools are skipped
/// with a warning; any other dispatch error aborts.
pub fn available_results(
    outcomes: Vec<(String, Result<ToolResult, ToolError>)>,
) -> anyhow::Result<Vec<(String, ToolResult)>> {
    let mut results = Vec::with_capacity(outcomes.len());
    for (name, outcome) in outcomes {
        match outcome {
            Ok(result) => results.push((name, result)),
            Err(err) if err.is_registry_error() => {
                warn!(tool = %name, error = %err, "tool unavailable, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(results)
}

async fn single(
    manager: &ToolManager,
    ctx: &ToolContext,
    name: &str,
    file: &Path,
) -> anyhow::Result<(String, Vec<(String, ToolResult)>)> {
    let input = read_source(file)?;
    let result = manager.run(ctx, name, &input).await?;
    Ok((file.display().to_string(), vec![(name.to_string(), result)]))
}

fn read_source(file: &Path) -> anyhow::Result<ToolInput> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    Ok(ToolInput::source_file(code, file.display().to_string()))
}

/// One file ⇒ source, one directory ⇒ directory walk, several paths ⇒ file list.
pub fn bug_input(paths: &[PathBuf]) -> anyhow::Result<ToolInput> {
    match paths {
        [] => anyhow::bail!("no paths given"),
        [path] if path.is_dir() => Ok(ToolInput::Directory { path: path.clone() }),
        [path] => read_source(path),
        many => Ok(ToolInput::Files {
            paths: many.to_vec(),
        }),
    }
}

fn describe_paths(paths: &[PathBuf]) -> String {
    match paths {
        [one] => one.display().to_string(),
        many => format!("{} paths", many.len()),
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or pass --force to overwrite");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    std::fs::write(&args.output, config::DEFAULT_TEMPLATE)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to tune timeouts and disabled rules", args.output.display());
    println!("  2. Run: goinsight analyze main.go --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["goinsight", "security", "main.go", "--format", "json", "-v"])
            .unwrap();
        assert_eq!(cli.global.format.as_deref(), Some("json"));
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Commands::Security(_)));
    }

    #[test]
    fn test_bug_requires_paths() {
        assert!(Cli::try_parse_from(["goinsight", "bug"]).is_err());
    }

    #[test]
    fn test_bug_input_shapes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.go");
        std::fs::write(&file, "package main\n").unwrap();

        assert!(matches!(
            bug_input(&[temp.path().to_path_buf()]).unwrap(),
            ToolInput::Directory { .. }
        ));
        match bug_input(&[file.clone()]).unwrap() {
            ToolInput::Source { code, file: name } => {
                assert_eq!(code, "package main\n");
                assert!(name.unwrap().ends_with("main.go"));
            }
            other => panic!("unexpected input {:?}", other),
        }
        assert!(matches!(
            bug_input(&[file.clone(), file]).unwrap(),
            ToolInput::Files { paths } if paths.len() == 2
        ));
    }

    #[test]
    fn test_exit_code() {
        let clean = ToolResult::success(r#"{"total":0}"#.into(), Duration::ZERO);
        let dirty = ToolResult::success(r#"{"total":2}"#.into(), Duration::ZERO);
        let failed = ToolResult::failure("boom", Duration::ZERO);

        assert_eq!(exit_code(&[(SECURITY_SCANNER.into(), clean.clone())]), EXIT_SUCCESS);
        assert_eq!(exit_code(&[(SECURITY_SCANNER.into(), dirty)]), EXIT_FAILED);
        assert_eq!(
            exit_code(&[(SECURITY_SCANNER.into(), clean), (BUG_DETECTOR.into(), failed)]),
            EXIT_FAILED
        );
    }

    #[test]
    fn test_available_results_skips_unavailable_tools() {
        let ok = ToolResult::success(r#"{"total":0}"#.into(), Duration::ZERO);
        let outcomes = vec![
            (COMPLEXITY_ANALYZER.to_string(), Ok(ok)),
            (
                SECURITY_SCANNER.to_string(),
                Err(ToolError::Disabled(SECURITY_SCANNER.into())),
            ),
            ("linter".to_string(), Err(ToolError::NotFound("linter".into()))),
        ];
        let results = available_results(outcomes).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, COMPLEXITY_ANALYZER);

        let broken = vec![(BUG_DETECTOR.to_string(), Err(ToolError::Timeout))];
        assert!(available_results(broken).is_err());
    }

    #[test]
    fn test_init_writes_template_once() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("conf").join("goinsight.yaml");
        let args = InitArgs {
            output: output.clone(),
            force: false,
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        assert!(Settings::parse_file(&output).is_ok());
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
    }
}
