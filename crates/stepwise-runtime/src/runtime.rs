//! Workflow runtime.
//!
//! The [`Runtime`] is the main entry point for executing workflows. It owns
//! a [`StepExecutor`] and a notifier, and drives the executor across the
//! batches of a workflow's [`Plan`](stepwise_workflow::Plan).

use std::sync::Arc;
use std::time::Instant;

use stepwise_tool::ToolInvoker;
use stepwise_workflow::{Branch, ExecutionContext, Plan, Step, StepError, Workflow};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::config::RuntimeConfig;
use crate::control::RunControl;
use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::executor::{StepExecutor, StepOutcome};
use crate::result::{RunError, RunOutcome, RunStatus};

type StepResult = Result<StepOutcome, StepError>;

/// The workflow runtime.
///
/// Handles batch scheduling, bounded parallelism, cancellation and pause
/// gates, and aggregates the [`RunOutcome`].
pub struct Runtime<N = NoopNotifier> {
  executor: StepExecutor,
  notifier: N,
}

impl Runtime {
  /// Create a runtime invoking tools through `invoker`.
  pub fn new(invoker: Arc<dyn ToolInvoker>, config: RuntimeConfig) -> Self {
    Self {
      executor: StepExecutor::new(invoker, config),
      notifier: NoopNotifier,
    }
  }
}

impl<N: ExecutionNotifier> Runtime<N> {
  /// Replace the notifier that receives every run's events.
  pub fn with_notifier<M: ExecutionNotifier>(self, notifier: M) -> Runtime<M> {
    Runtime {
      executor: self.executor,
      notifier,
    }
  }

  pub fn config(&self) -> &RuntimeConfig {
    self.executor.config()
  }

  /// Execute the workflow with the given run input.
  pub async fn execute(
    &self,
    workflow: &Workflow,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, RuntimeError> {
    self
      .execute_with_context(workflow, ExecutionContext::new(input), cancel)
      .await
  }

  /// Execute the workflow starting from a prepared context (e.g. with
  /// metadata attached).
  pub async fn execute_with_context(
    &self,
    workflow: &Workflow,
    ctx: ExecutionContext,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, RuntimeError> {
    self
      .execute_with_control(workflow, ctx, RunControl::new(cancel), &NoopNotifier)
      .await
  }

  /// Execute the workflow under explicit run control.
  ///
  /// Events go to the runtime's notifier and to `observer`. Configuration
  /// errors are returned before any event is emitted or step started.
  #[instrument(
    name = "runtime_execute",
    skip(self, workflow, ctx, control, observer),
    fields(
      workflow_id = %workflow.workflow_id,
      execution_id = %control.execution_id(),
    )
  )]
  pub async fn execute_with_control(
    &self,
    workflow: &Workflow,
    ctx: ExecutionContext,
    control: RunControl,
    observer: &dyn ExecutionNotifier,
  ) -> Result<RunOutcome, RuntimeError> {
    let plan = workflow.plan()?;
    let mut run = self.start(workflow, &plan, ctx, control, observer);

    let started = Instant::now();
    let max_workers = workflow.max_workers();

    for (index, batch) in plan.batches().iter().enumerate() {
      if !run.control.proceed().await {
        run.fail(RunError::Cancelled);
        break;
      }

      debug!(
        execution_id = %run.execution_id,
        batch = index,
        steps = ?batch,
        "batch_started"
      );

      let steps = batch
        .iter()
        .filter_map(|id| workflow.get_step(id))
        .collect::<Vec<_>>();
      self.run_batch(&mut run, &steps, max_workers).await;

      if run.failure.is_some() {
        break;
      }
    }

    Ok(run.finish(elapsed_ms(started)))
  }

  /// Evaluate the branch condition once and run the selected arm as a
  /// single-step workflow. No selected arm is a successful empty run.
  pub async fn execute_branch(
    &self,
    branch: &Branch,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, RuntimeError> {
    self
      .execute_branch_with_context(branch, ExecutionContext::new(input), cancel)
      .await
  }

  /// Like [`execute_branch`](Self::execute_branch), with the condition
  /// evaluated against a prepared context.
  pub async fn execute_branch_with_context(
    &self,
    branch: &Branch,
    ctx: ExecutionContext,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, RuntimeError> {
    let arm = match branch.select(&ctx) {
      Ok(arm) => arm,
      Err(e) => {
        let error = StepError::Condition {
          step_id: branch.if_true.id.clone(),
          message: e.message,
        };
        warn!(error = %error, "branch_condition_failed");

        let started = Instant::now();
        let workflow = isolated(&branch.if_true);
        let plan = workflow.plan()?;
        let mut run = self.start(&workflow, &plan, ctx, RunControl::new(cancel), &NoopNotifier);
        run.record(branch.if_true.id.clone(), Err(error));
        return Ok(run.finish(elapsed_ms(started)));
      }
    };

    let workflow = match arm {
      Some(step) => isolated(step),
      None => Workflow::new("branch", "branch"),
    };
    self.execute_with_context(&workflow, ctx, cancel).await
  }

  /// Execute a single step in isolation, outside graph traversal.
  ///
  /// The payload is the run input. Dependencies are not consulted.
  #[instrument(
    name = "runtime_execute_step",
    skip(self, workflow, input, cancel),
    fields(workflow_id = %workflow.workflow_id)
  )]
  pub async fn execute_step(
    &self,
    workflow: &Workflow,
    step_id: &str,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, RuntimeError> {
    let step = workflow
      .get_step(step_id)
      .ok_or_else(|| RuntimeError::StepNotFound {
        step_id: step_id.to_string(),
      })?;

    self.execute(&isolated(step), input, cancel).await
  }

  fn start<'a>(
    &'a self,
    workflow: &Workflow,
    plan: &Plan,
    ctx: ExecutionContext,
    control: RunControl,
    observer: &'a dyn ExecutionNotifier,
  ) -> Run<'a> {
    let run = Run {
      execution_id: control.execution_id().to_string(),
      control,
      ctx,
      steps_completed: Vec::new(),
      failure: None,
      notifier: &self.notifier,
      observer,
    };

    info!(
      execution_id = %run.execution_id,
      workflow_id = %workflow.workflow_id,
      batches = plan.len(),
      steps = plan.step_count(),
      "workflow_started"
    );
    run.emit(ExecutionEvent::RunStarted {
      execution_id: run.execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
    });
    run
  }

  /// Run one batch, at most `max_workers` steps at a time.
  ///
  /// A fatal failure or cancellation stops dispatching and cancels the
  /// batch's in-flight steps. Steps that still complete are recorded.
  async fn run_batch(&self, run: &mut Run<'_>, steps: &[&Step], max_workers: usize) {
    let batch_cancel = run.control.cancel_token().child_token();
    let mut in_flight = FuturesUnordered::new();
    let mut pending = steps.iter();
    let mut halted = false;

    loop {
      while !halted && in_flight.len() < max_workers {
        // While paused, collect in-flight steps before blocking on the gate.
        if run.control.is_paused() && !in_flight.is_empty() {
          break;
        }
        let Some(step) = pending.next() else { break };

        if !run.control.proceed().await {
          run.fail(RunError::Cancelled);
          batch_cancel.cancel();
          halted = true;
          break;
        }

        let step = (*step).clone();
        let mut ctx = run.ctx.clone();
        ctx.set_current_step(Some(step.id.clone()));
        let executor = self.executor.clone();
        let cancel = batch_cancel.clone();

        info!(execution_id = %run.execution_id, step_id = %step.id, "step_started");
        run.emit(ExecutionEvent::StepStarted {
          execution_id: run.execution_id.clone(),
          step_id: step.id.clone(),
        });

        let step_id = step.id.clone();
        let handle = tokio::spawn(
          async move { executor.run_step(&step, &ctx, &cancel).await }.in_current_span(),
        );
        in_flight.push(async move { (step_id, handle.await) });
      }

      let Some((step_id, joined)) = in_flight.next().await else {
        break;
      };

      let result: StepResult = joined.unwrap_or_else(|e| {
        Err(StepError::failed(
          step_id.clone(),
          format!("step task failed: {}", e),
        ))
      });

      if !run.record(step_id, result) && !halted {
        batch_cancel.cancel();
        halted = true;
      }
    }
  }
}

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// A copy of `step` as the only step of a workflow.
fn isolated(step: &Step) -> Workflow {
  let mut step = step.clone();
  step.depends_on.clear();
  Workflow::new(step.id.clone(), step.name.clone()).step(step)
}

/// Mutable state of one run.
struct Run<'a> {
  execution_id: String,
  control: RunControl,
  ctx: ExecutionContext,
  steps_completed: Vec<String>,
  failure: Option<RunError>,
  notifier: &'a dyn ExecutionNotifier,
  observer: &'a dyn ExecutionNotifier,
}

impl Run<'_> {
  fn emit(&self, event: ExecutionEvent) {
    self.notifier.notify(event.clone());
    self.observer.notify(event);
  }

  /// Keep the first failure only.
  fn fail(&mut self, error: RunError) {
    if self.failure.is_none() {
      self.failure = Some(error);
    }
  }

  /// Merge a finished step into the run. Returns `false` if the run must stop.
  fn record(&mut self, step_id: String, result: StepResult) -> bool {
    let execution_id = self.execution_id.clone();

    match result {
      Ok(StepOutcome::Completed(output)) => {
        info!(
          execution_id = %execution_id,
          step_id = %step_id,
          output = %output,
          "step_completed"
        );
        self.ctx.record_result(step_id.clone(), output.clone());
        self.steps_completed.push(step_id.clone());
        self.emit(ExecutionEvent::StepCompleted {
          execution_id,
          step_id,
          output,
        });
        true
      }
      Ok(StepOutcome::Skipped) => {
        info!(execution_id = %execution_id, step_id = %step_id, "step_skipped");
        self.emit(ExecutionEvent::StepSkipped {
          execution_id,
          step_id,
        });
        true
      }
      Ok(StepOutcome::Recovered { error }) => {
        self.emit(ExecutionEvent::StepRecovered {
          execution_id,
          step_id,
          error: error.to_string(),
        });
        true
      }
      Err(e) if e.is_cancelled() => {
        warn!(execution_id = %execution_id, step_id = %step_id, "step_cancelled");
        // A step cancelled because a sibling failed does not mask that failure.
        self.fail(RunError::Cancelled);
        false
      }
      Err(e) => {
        error!(execution_id = %execution_id, step_id = %step_id, error = %e, "step_failed");
        self.emit(ExecutionEvent::StepFailed {
          execution_id,
          step_id,
          error: e.to_string(),
        });
        self.fail(RunError::Step(e));
        false
      }
    }
  }

  fn finish(self, duration_ms: u64) -> RunOutcome {
    let execution_id = self.execution_id.clone();
    let status = match &self.failure {
      None => RunStatus::Succeeded,
      Some(RunError::Cancelled) => RunStatus::Cancelled,
      Some(RunError::Step(_)) => RunStatus::Failed,
    };

    match &self.failure {
      None => {
        info!(execution_id = %execution_id, duration_ms, "workflow_completed");
        self.emit(ExecutionEvent::RunCompleted {
          execution_id: execution_id.clone(),
        });
      }
      Some(RunError::Cancelled) => {
        warn!(execution_id = %execution_id, duration_ms, "workflow_cancelled");
        self.emit(ExecutionEvent::RunCancelled {
          execution_id: execution_id.clone(),
        });
      }
      Some(e) => {
        error!(execution_id = %execution_id, error = %e, duration_ms, "workflow_failed");
        self.emit(ExecutionEvent::RunFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    RunOutcome {
      execution_id,
      status,
      results: self.ctx.into_results(),
      steps_completed: self.steps_completed,
      error: self.failure,
      duration_ms,
    }
  }
}
