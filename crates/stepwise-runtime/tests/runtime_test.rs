//! Integration tests for Runtime using in-process mock tools.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use stepwise_runtime::{
  ChannelNotifier, ExecutionEvent, RunControl, RunError, RunStatus, Runtime, RuntimeConfig,
  RuntimeError,
};
use stepwise_tool::{ToolError, ToolInvoker, ToolRegistry};
use stepwise_workflow::{
  Branch, Condition, ExecutionContext, MapperError, Step, StepError, Workflow, WorkflowError,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Records every invocation and reports the peak number of concurrent calls.
///
/// Tool references:
/// - `ok`: returns `{ "step": <input.step> }`
/// - `fail`: fails
/// - `slow`: sleeps `input.ms` (default 50), honouring cancellation
#[derive(Default)]
struct MockInvoker {
  calls: Mutex<Vec<String>>,
  active: AtomicUsize,
  peak: AtomicUsize,
}

impl MockInvoker {
  fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl ToolInvoker for MockInvoker {
  async fn invoke(
    &self,
    tool: &str,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    let label = input["step"].as_str().unwrap_or(tool).to_string();
    self.calls.lock().unwrap().push(label.clone());

    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    let result = match tool {
      "ok" => Ok(json!({ "step": label })),
      "fail" => Err(ToolError::failed(format!("{} exploded", label))),
      "slow" => {
        let ms = input["ms"].as_u64().unwrap_or(50);
        tokio::select! {
          _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(json!({ "step": label })),
          _ = cancel.cancelled() => Err(ToolError::Cancelled),
        }
      }
      other => Err(ToolError::NotFound {
        tool: other.to_string(),
      }),
    };

    self.active.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

fn config() -> RuntimeConfig {
  RuntimeConfig {
    default_step_timeout: Duration::from_secs(5),
    retry_delay: Duration::from_millis(1),
  }
}

fn runtime() -> (Runtime, Arc<MockInvoker>) {
  let invoker = Arc::new(MockInvoker::default());
  (Runtime::new(invoker.clone(), config()), invoker)
}

/// A step whose tool input names the step, so the mock can record it.
fn step(id: &str, tool: &str) -> Step {
  let label = id.to_string();
  Step::new(id, tool).map_input(move |_| json!({ "step": label }))
}

fn slow_step(id: &str, ms: u64) -> Step {
  let label = id.to_string();
  Step::new(id, "slow").map_input(move |_| json!({ "step": label, "ms": ms }))
}

#[tokio::test]
async fn test_sequential_follows_declaration_order() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Sequential")
    .step(slow_step("a", 30))
    .step(slow_step("b", 1))
    .step(slow_step("c", 10));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert!(outcome.error.is_none());
  assert_eq!(outcome.steps_completed, vec!["a", "b", "c"]);
  assert_eq!(invoker.calls(), vec!["a", "b", "c"]);
  assert_eq!(invoker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_scenario_dependency_chain() {
  let (runtime, _) = runtime();
  let workflow = Workflow::new("wf", "Chain")
    .step(step("B", "ok").depends_on(["A"]))
    .step(step("A", "ok"));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.steps_completed, vec!["A", "B"]);
  assert_eq!(outcome.results["B"], json!({ "step": "B" }));
}

#[tokio::test]
async fn test_scenario_optional_failure_continues() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Optional")
    .step(step("step1", "ok"))
    .step(step("step2", "fail").optional())
    .step(step("step3", "ok"));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.steps_completed, vec!["step1", "step3"]);
  assert!(!outcome.results.contains_key("step2"));
  assert_eq!(invoker.calls(), vec!["step1", "step2", "step3"]);
}

#[tokio::test]
async fn test_scenario_fatal_failure_aborts() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Fatal")
    .step(step("step1", "ok"))
    .step(step("step2", "fail"))
    .step(step("step3", "ok"));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(outcome.status, RunStatus::Failed);
  assert_eq!(outcome.steps_completed, vec!["step1"]);
  assert_eq!(outcome.results.len(), 1);
  let error = outcome.error.unwrap();
  assert_eq!(error.step_id(), Some("step2"));
  assert!(matches!(error, RunError::Step(StepError::Tool { .. })));
  assert_eq!(invoker.calls(), vec!["step1", "step2"]);
}

#[tokio::test]
async fn test_scenario_branch_without_selected_arm() {
  let (runtime, invoker) = runtime();
  let branch = Branch::new(|_| false, step("notify", "ok"));

  let outcome = runtime
    .execute_branch(&branch, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert!(outcome.steps_completed.is_empty());
  assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn test_branch_runs_selected_arm_once() {
  let (runtime, invoker) = runtime();
  let evaluations = Arc::new(AtomicUsize::new(0));
  let counter = evaluations.clone();
  let branch = Branch::new(
    move |ctx| {
      counter.fetch_add(1, Ordering::SeqCst);
      ctx.input()["vip"] == true
    },
    step("vip", "ok").depends_on(["elsewhere"]),
  )
  .otherwise(step("regular", "ok"));

  let outcome = runtime
    .execute_branch(&branch, json!({ "vip": true }), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.steps_completed, vec!["vip"]);
  assert_eq!(invoker.calls(), vec!["vip"]);
  assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

struct BrokenCondition;

impl Condition for BrokenCondition {
  fn evaluate(&self, _ctx: &ExecutionContext) -> Result<bool, MapperError> {
    Err(MapperError::new("tier is undefined"))
  }
}

#[tokio::test]
async fn test_branch_condition_error_reported_as_failed_run() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let invoker = Arc::new(MockInvoker::default());
  let runtime = Runtime::new(invoker.clone(), config()).with_notifier(ChannelNotifier::new(tx));
  let branch = Branch::with_condition(BrokenCondition, step("vip", "ok"));

  let outcome = runtime
    .execute_branch(&branch, json!({}), CancellationToken::new())
    .await
    .unwrap();
  drop(runtime);

  assert_eq!(outcome.status, RunStatus::Failed);
  assert_eq!(outcome.error.as_ref().and_then(|e| e.step_id()), Some("vip"));
  assert!(invoker.calls().is_empty());

  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }
  assert!(events.iter().all(|e| e.execution_id() == outcome.execution_id));
  assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { .. })));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::StepFailed { step_id, .. } if step_id == "vip"
  )));
  assert!(matches!(events.last(), Some(ExecutionEvent::RunFailed { .. })));
}

#[tokio::test]
async fn test_branch_condition_sees_context_metadata() {
  let (runtime, invoker) = runtime();
  let branch = Branch::new(
    |ctx| ctx.metadata().get("tier") == Some(&json!("gold")),
    step("vip", "ok"),
  )
  .otherwise(step("regular", "ok"));
  let ctx = ExecutionContext::new(json!({})).with_metadata("tier", json!("gold"));

  let outcome = runtime
    .execute_branch_with_context(&branch, ctx, CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(invoker.calls(), vec!["vip"]);
}

#[tokio::test]
async fn test_cycle_rejected_before_any_invocation() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Cycle")
    .step(step("a", "ok").depends_on(["b"]))
    .step(step("b", "ok").depends_on(["a"]))
    .step(step("c", "ok"));

  let err = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    RuntimeError::Workflow(WorkflowError::CycleDetected { .. })
  ));
  assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn test_skipped_step_satisfies_dependents() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Skip")
    .step(step("gate", "ok").when(|ctx| ctx.input()["enabled"] == true))
    .step(step("after", "ok").depends_on(["gate"]));

  let outcome = runtime
    .execute(&workflow, json!({ "enabled": false }), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.steps_completed, vec!["after"]);
  assert_eq!(invoker.calls(), vec!["after"]);
}

#[tokio::test]
async fn test_dependents_see_upstream_results() {
  let (runtime, _) = runtime();
  let workflow = Workflow::new("wf", "Context")
    .step(step("fetch", "ok"))
    .step(
      Step::new("use", "ok")
        .depends_on(["fetch"])
        .map_input(|ctx| json!({ "step": ctx.result("fetch").map(|r| r["step"].clone()) })),
    );

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(outcome.results["use"], json!({ "step": "fetch" }));
}

#[tokio::test]
async fn test_parallel_respects_max_workers() {
  let (runtime, invoker) = runtime();
  let mut workflow = Workflow::new("wf", "Parallel").with_max_workers(2);
  for id in ["a", "b", "c", "d", "e"] {
    workflow = workflow.step(slow_step(id, 30));
  }

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.steps_completed.len(), 5);
  assert_eq!(invoker.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fatal_failure_cancels_batch_siblings() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Abort")
    .with_max_workers(3)
    .step(slow_step("long", 5_000))
    .step(step("boom", "fail"))
    .step(step("later", "ok").depends_on(["long"]));

  let started = std::time::Instant::now();
  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(outcome.status, RunStatus::Failed);
  assert_eq!(outcome.error.unwrap().step_id(), Some("boom"));
  assert!(outcome.steps_completed.is_empty());
  assert!(started.elapsed() < Duration::from_secs(2));
  assert!(!invoker.calls().contains(&"later".to_string()));
}

#[tokio::test]
async fn test_timeout_fails_step() {
  let (runtime, _) = runtime();
  let workflow =
    Workflow::new("wf", "Timeout").step(slow_step("slow", 1_000).timeout(Duration::from_millis(20)));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(outcome.status, RunStatus::Failed);
  assert_eq!(
    outcome.error,
    Some(RunError::Step(StepError::Timeout {
      step_id: "slow".to_string(),
      timeout_ms: 20,
    }))
  );
}

#[tokio::test]
async fn test_error_handler_recovers_or_rewrites() {
  let (runtime, _) = runtime();
  let workflow = Workflow::new("wf", "Handlers")
    .step(step("tolerated", "fail").on_error(|_, _| Ok(())))
    .step(step("next", "ok"));

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();
  assert!(outcome.success());
  assert_eq!(outcome.steps_completed, vec!["next"]);

  let workflow = Workflow::new("wf", "Handlers").step(
    step("strict", "fail").on_error(|ctx, _| {
      Err(StepError::failed(
        ctx.current_step_id().unwrap_or_default(),
        "escalated",
      ))
    }),
  );

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(
    outcome.error,
    Some(RunError::Step(StepError::failed("strict", "escalated")))
  );
}

#[tokio::test]
async fn test_retries_tool_failures() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let mut registry = ToolRegistry::new();
  registry.register_fn("flaky", move |input, _| {
    let counter = counter.clone();
    async move {
      if counter.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(ToolError::failed("first call fails"))
      } else {
        Ok(input)
      }
    }
  });
  let runtime = Runtime::new(Arc::new(registry), config());

  let workflow = Workflow::new("wf", "Retry").step(Step::new("a", "flaky").retries(1));
  let outcome = runtime
    .execute(&workflow, json!({ "x": 1 }), CancellationToken::new())
    .await
    .unwrap();

  assert!(outcome.success());
  assert_eq!(outcome.results["a"], json!({ "x": 1 }));
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancellation_is_distinct_from_failure() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Cancel")
    .step(step("first", "ok"))
    .step(slow_step("second", 5_000))
    .step(step("third", "ok"));

  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();
  });

  let outcome = runtime.execute(&workflow, json!({}), cancel).await.unwrap();

  assert_eq!(outcome.status, RunStatus::Cancelled);
  assert_eq!(outcome.error, Some(RunError::Cancelled));
  assert_eq!(outcome.steps_completed, vec!["first"]);
  assert_eq!(invoker.calls(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_pre_cancelled_run_starts_nothing() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Cancelled").step(step("a", "ok"));
  let cancel = CancellationToken::new();
  cancel.cancel();

  let outcome = runtime.execute(&workflow, json!({}), cancel).await.unwrap();

  assert_eq!(outcome.status, RunStatus::Cancelled);
  assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn test_pause_gate_holds_dispatch() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Pause")
    .step(step("a", "ok"))
    .step(step("b", "ok"));

  let (gate, rx) = watch::channel(true);
  let control = RunControl::new(CancellationToken::new())
    .with_execution_id("exec-1")
    .with_pause_gate(rx);

  let run = tokio::spawn(async move {
    runtime
      .execute_with_control(
        &workflow,
        stepwise_workflow::ExecutionContext::new(json!({})),
        control,
        &stepwise_runtime::NoopNotifier,
      )
      .await
  });

  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(invoker.calls().is_empty());

  gate.send_replace(false);
  let outcome = run.await.unwrap().unwrap();

  assert_eq!(outcome.execution_id, "exec-1");
  assert_eq!(outcome.steps_completed, vec!["a", "b"]);
}

#[tokio::test]
async fn test_execute_step_in_isolation() {
  let (runtime, invoker) = runtime();
  let workflow = Workflow::new("wf", "Single")
    .step(step("a", "ok"))
    .step(step("b", "ok").depends_on(["a"]));

  let outcome = runtime
    .execute_step(&workflow, "b", json!({}), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(outcome.steps_completed, vec!["b"]);
  assert_eq!(invoker.calls(), vec!["b"]);

  let err = runtime
    .execute_step(&workflow, "missing", json!({}), CancellationToken::new())
    .await
    .unwrap_err();
  assert_eq!(
    err,
    RuntimeError::StepNotFound {
      step_id: "missing".to_string()
    }
  );
}

#[tokio::test]
async fn test_channel_notifier_receives_events() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let invoker = Arc::new(MockInvoker::default());
  let runtime = Runtime::new(invoker, config()).with_notifier(ChannelNotifier::new(tx));

  let workflow = Workflow::new("wf", "Events")
    .step(step("a", "ok"))
    .step(step("skip", "ok").when(|_| false))
    .step(step("opt", "fail").optional());

  let outcome = runtime
    .execute(&workflow, json!({}), CancellationToken::new())
    .await
    .unwrap();
  drop(runtime);

  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }

  assert!(events.iter().all(|e| e.execution_id() == outcome.execution_id));
  assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { .. })));
  assert!(matches!(events.last(), Some(ExecutionEvent::RunCompleted { .. })));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::StepCompleted { step_id, .. } if step_id == "a"
  )));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::StepSkipped { step_id, .. } if step_id == "skip"
  )));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::StepRecovered { step_id, .. } if step_id == "opt"
  )));
}
