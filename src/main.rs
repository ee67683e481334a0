use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use stepwise_config::WorkflowDef;
use stepwise_engine::{ExecutionRegistry, ExecutionState};
use stepwise_resolver::{Resolver, StandardResolver};
use stepwise_runtime::{Runtime, RuntimeConfig};
use stepwise_tool::ToolRegistry;
use stepwise_workflow::Workflow;

/// Stepwise - a step-based workflow orchestration engine
#[derive(Debug, Parser)]
#[command(name = "stepwise")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(long, global = true)]
  debug: bool,

  /// Timeout for steps that do not set `timeout_ms`
  #[arg(long, global = true, env = "STEPWISE_DEFAULT_TIMEOUT_MS")]
  default_timeout_ms: Option<u64>,

  /// Override the workflow's `max_workers`
  #[arg(long, global = true, env = "STEPWISE_MAX_WORKERS")]
  max_workers: Option<usize>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
  /// Run a workflow or a single step
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// Print the dependency batches of a workflow
  Plan {
    /// Path to the workflow file (JSON or YAML)
    workflow_file: PathBuf,
  },
}

#[derive(Debug, Subcommand)]
enum RunTarget {
  /// Run an entire workflow
  Workflow {
    /// Path to the workflow file (JSON or YAML)
    workflow_file: PathBuf,
  },

  /// Run a single step from a workflow
  Step {
    /// Path to the workflow file (JSON or YAML)
    workflow_file: PathBuf,

    /// The step ID to execute
    #[arg(long)]
    step: String,
  },
}

fn init_tracing(debug: bool) {
  let filter = if debug {
    EnvFilter::new("stepwise=debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stepwise=info"))
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false).with_writer(io::stderr))
    .with(filter)
    .init();
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.debug);

  tracing::debug!(?cli, "stepwise starting");

  let mut config = RuntimeConfig::default();
  if let Some(ms) = cli.default_timeout_ms {
    config.default_step_timeout = Duration::from_millis(ms);
  }

  let Some(command) = cli.command else {
    println!("stepwise - use --help to see available commands");
    return Ok(ExitCode::SUCCESS);
  };

  let rt = tokio::runtime::Runtime::new()?;
  match command {
    Commands::Run { target } => match target {
      RunTarget::Workflow { workflow_file } => {
        rt.block_on(run_workflow(workflow_file, config, cli.max_workers))
      }
      RunTarget::Step {
        workflow_file,
        step,
      } => rt.block_on(run_step(workflow_file, step, config, cli.max_workers)),
    },
    Commands::Plan { workflow_file } => plan(workflow_file, cli.max_workers),
  }
}

async fn run_workflow(
  workflow_file: PathBuf,
  config: RuntimeConfig,
  max_workers: Option<usize>,
) -> Result<ExitCode> {
  let tools = ToolRegistry::with_builtins();
  let workflow = load_workflow(&workflow_file, &tools, max_workers)?;
  eprintln!(
    "Loaded workflow: {} ({} steps)",
    workflow.name,
    workflow.steps.len()
  );

  let payload = read_payload_from_stdin()?;

  let runtime = Runtime::new(Arc::new(tools), config);
  let registry = ExecutionRegistry::new(Arc::new(runtime));
  let execution_id = registry
    .execute_async(Arc::new(workflow), payload)
    .context("failed to start workflow")?;
  eprintln!("Execution started: {}", execution_id);

  let record = tokio::select! {
    record = registry.wait(&execution_id) => record?,
    _ = tokio::signal::ctrl_c() => {
      eprintln!("Interrupted, cancelling execution");
      registry.cancel(&execution_id)?;
      registry.wait(&execution_id).await?
    }
  };

  println!("{}", serde_json::to_string_pretty(&record)?);

  if record.state == ExecutionState::Completed {
    Ok(ExitCode::SUCCESS)
  } else {
    Ok(ExitCode::FAILURE)
  }
}

async fn run_step(
  workflow_file: PathBuf,
  step_id: String,
  config: RuntimeConfig,
  max_workers: Option<usize>,
) -> Result<ExitCode> {
  let tools = ToolRegistry::with_builtins();
  let workflow = load_workflow(&workflow_file, &tools, max_workers)?;
  eprintln!("Running step: {}", step_id);

  let payload = read_payload_from_stdin()?;

  let runtime = Runtime::new(Arc::new(tools), config);
  let outcome = runtime
    .execute_step(&workflow, &step_id, payload, CancellationToken::new())
    .await
    .context("step execution failed")?;

  let output = serde_json::json!({
    "execution_id": outcome.execution_id,
    "status": outcome.status,
    "result": outcome.results.get(&step_id),
    "error": outcome.error.as_ref().map(|e| e.to_string()),
    "duration_ms": outcome.duration_ms,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  if outcome.success() {
    Ok(ExitCode::SUCCESS)
  } else {
    Ok(ExitCode::FAILURE)
  }
}

fn plan(workflow_file: PathBuf, max_workers: Option<usize>) -> Result<ExitCode> {
  let tools = ToolRegistry::with_builtins();
  let workflow = load_workflow(&workflow_file, &tools, max_workers)?;
  let plan = workflow.plan().context("failed to plan workflow")?;

  let output = serde_json::json!({
    "workflow_id": workflow.workflow_id,
    "max_workers": workflow.max_workers(),
    "batches": plan.batches(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(ExitCode::SUCCESS)
}

/// Read, parse and resolve a workflow file against the available tools.
fn load_workflow(
  workflow_file: &Path,
  tools: &ToolRegistry,
  max_workers: Option<usize>,
) -> Result<Workflow> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let is_yaml = workflow_file
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

  let mut def: WorkflowDef = if is_yaml {
    serde_yaml::from_str(&content)
      .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?
  } else {
    serde_json::from_str(&content)
      .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?
  };

  if max_workers.is_some() {
    def.max_workers = max_workers;
  }

  StandardResolver::new()
    .with_known_tools(tools.names())
    .resolve(def)
    .context("failed to resolve workflow")
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
  }
}
