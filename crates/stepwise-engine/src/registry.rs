//! Execution registry.
//!
//! The registry owns one worker task per asynchronous run and the only state
//! shared across runs: the id → entry map. Each entry guards its record with
//! its own mutex, so worker finalization and control requests on the same run
//! are serialized without touching other runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use stepwise_runtime::{
  ExecutionEvent, ExecutionNotifier, NoopNotifier, RunControl, RunError, RunOutcome, Runtime,
  RuntimeError,
};
use stepwise_workflow::{ExecutionContext, Workflow};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::RegistryError;
use crate::record::{ExecutionRecord, ExecutionState};

/// Control handles and record of one run.
struct ExecutionEntry {
  record: Mutex<ExecutionRecord>,
  cancel: CancellationToken,
  /// `true` while paused.
  pause: watch::Sender<bool>,
  /// Mirrors `record.state` for `wait`.
  state: watch::Sender<ExecutionState>,
}

impl ExecutionEntry {
  fn lock(&self) -> MutexGuard<'_, ExecutionRecord> {
    self.record.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn snapshot(&self) -> ExecutionRecord {
    self.lock().clone()
  }

  fn set_state(&self, record: &mut ExecutionRecord, state: ExecutionState) {
    record.state = state;
    self.state.send_replace(state);
  }

  /// Move `Pending → Running` when the worker picks the run up.
  fn start(&self) {
    let mut record = self.lock();
    if record.state == ExecutionState::Pending {
      self.set_state(&mut record, ExecutionState::Running);
    }
  }

  fn finish(&self, result: Result<RunOutcome, RuntimeError>) {
    let mut record = self.lock();
    record.current_step = None;
    record.completed_at = Some(Utc::now());

    let mut state = match result {
      Ok(outcome) => {
        record.results = outcome.results;
        record.completed_steps = outcome.steps_completed;
        record.error = outcome.error.map(|e| e.to_string());
        ExecutionState::from(outcome.status)
      }
      Err(e) => {
        record.error = Some(e.to_string());
        ExecutionState::Failed
      }
    };

    // A cancel accepted while the run was live wins over a late outcome.
    if self.cancel.is_cancelled() && state != ExecutionState::Cancelled {
      record.error = Some(RunError::Cancelled.to_string());
      state = ExecutionState::Cancelled;
    }

    info!(
      execution_id = %record.execution_id,
      state = %state,
      completed_steps = record.completed_steps.len(),
      "execution_finished"
    );
    self.set_state(&mut record, state);
  }
}

/// Keeps an entry's record current while its run progresses.
struct RecordTracker {
  entry: Arc<ExecutionEntry>,
}

impl ExecutionNotifier for RecordTracker {
  fn notify(&self, event: ExecutionEvent) {
    match event {
      ExecutionEvent::StepStarted { step_id, .. } => {
        self.entry.lock().current_step = Some(step_id);
      }
      ExecutionEvent::StepCompleted {
        step_id, output, ..
      } => {
        let mut record = self.entry.lock();
        record.results.insert(step_id.clone(), output);
        record.completed_steps.push(step_id);
      }
      _ => {}
    }
  }
}

/// Tracks asynchronous runs by execution id.
///
/// Every run's cancellation token is a child of the registry's root token,
/// so [`shutdown`](Self::shutdown) stops all of them at once. Records stay
/// queryable after the run ends until they are evicted.
pub struct ExecutionRegistry<N = NoopNotifier> {
  runtime: Arc<Runtime<N>>,
  executions: RwLock<HashMap<String, Arc<ExecutionEntry>>>,
  root: CancellationToken,
}

impl<N: ExecutionNotifier + 'static> ExecutionRegistry<N> {
  pub fn new(runtime: Arc<Runtime<N>>) -> Self {
    Self {
      runtime,
      executions: RwLock::new(HashMap::new()),
      root: CancellationToken::new(),
    }
  }

  /// Start a run in the background and return its execution id.
  ///
  /// The workflow is validated first; a configuration error is returned
  /// without creating a record.
  #[instrument(
    name = "registry_execute_async",
    skip(self, workflow, input),
    fields(workflow_id = %workflow.workflow_id)
  )]
  pub fn execute_async(
    &self,
    workflow: Arc<Workflow>,
    input: serde_json::Value,
  ) -> Result<String, RegistryError> {
    workflow.plan()?;

    let execution_id = uuid::Uuid::new_v4().to_string();
    let record = ExecutionRecord::new(execution_id.clone(), workflow.workflow_id.clone());
    let (pause, pause_rx) = watch::channel(false);
    let (state, _) = watch::channel(ExecutionState::Pending);
    let entry = Arc::new(ExecutionEntry {
      record: Mutex::new(record),
      cancel: self.root.child_token(),
      pause,
      state,
    });

    self
      .executions
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(execution_id.clone(), entry.clone());

    info!(execution_id = %execution_id, "execution_submitted");

    let runtime = self.runtime.clone();
    let control = RunControl::new(entry.cancel.clone())
      .with_execution_id(execution_id.clone())
      .with_pause_gate(pause_rx);

    tokio::spawn(async move {
      entry.start();
      let tracker = RecordTracker {
        entry: entry.clone(),
      };
      let result = runtime
        .execute_with_control(&workflow, ExecutionContext::new(input), control, &tracker)
        .await;
      if let Err(e) = &result {
        error!(error = %e, "execution_rejected");
      }
      entry.finish(result);
    });

    Ok(execution_id)
  }

  /// Snapshot of a run's record.
  pub fn status(&self, execution_id: &str) -> Result<ExecutionRecord, RegistryError> {
    Ok(self.entry(execution_id)?.snapshot())
  }

  /// Snapshots of every tracked run, oldest first.
  pub fn list(&self) -> Vec<ExecutionRecord> {
    let mut records: Vec<ExecutionRecord> = self
      .executions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .map(|entry| entry.snapshot())
      .collect();
    records.sort_by_key(|r| r.started_at);
    records
  }

  /// Request cancellation. A no-op on runs that already finished.
  ///
  /// Once accepted, the record ends `Cancelled` even if the last step
  /// returns before the worker observes the signal.
  pub fn cancel(&self, execution_id: &str) -> Result<(), RegistryError> {
    let entry = self.entry(execution_id)?;
    let record = entry.lock();
    if record.state.is_terminal() {
      return Ok(());
    }

    info!(execution_id = %execution_id, state = %record.state, "execution_cancel_requested");
    entry.cancel.cancel();
    Ok(())
  }

  /// Stop dispatching new steps. Valid only while `Running`.
  pub fn pause(&self, execution_id: &str) -> Result<(), RegistryError> {
    let entry = self.entry(execution_id)?;
    let mut record = entry.lock();
    if record.state != ExecutionState::Running || entry.cancel.is_cancelled() {
      return Err(RegistryError::InvalidTransition {
        execution_id: execution_id.to_string(),
        action: "pause",
        state: record.state,
      });
    }

    entry.pause.send_replace(true);
    entry.set_state(&mut record, ExecutionState::Paused);
    info!(execution_id = %execution_id, "execution_paused");
    Ok(())
  }

  /// Reopen the gate of a paused run. Valid only while `Paused`.
  pub fn resume(&self, execution_id: &str) -> Result<(), RegistryError> {
    let entry = self.entry(execution_id)?;
    let mut record = entry.lock();
    if record.state != ExecutionState::Paused {
      return Err(RegistryError::InvalidTransition {
        execution_id: execution_id.to_string(),
        action: "resume",
        state: record.state,
      });
    }

    entry.set_state(&mut record, ExecutionState::Running);
    entry.pause.send_replace(false);
    info!(execution_id = %execution_id, "execution_resumed");
    Ok(())
  }

  /// Wait for a run to reach a terminal state and return its final record.
  pub async fn wait(&self, execution_id: &str) -> Result<ExecutionRecord, RegistryError> {
    let entry = self.entry(execution_id)?;
    let mut state = entry.state.subscribe();
    if state.wait_for(|s| s.is_terminal()).await.is_err() {
      warn!(execution_id = %execution_id, "execution state channel closed");
    }
    Ok(entry.snapshot())
  }

  /// Remove a finished run's record.
  pub fn evict(&self, execution_id: &str) -> Result<ExecutionRecord, RegistryError> {
    let mut executions = self
      .executions
      .write()
      .unwrap_or_else(PoisonError::into_inner);

    let entry = executions
      .get(execution_id)
      .ok_or_else(|| RegistryError::NotFound {
        execution_id: execution_id.to_string(),
      })?;

    let record = entry.snapshot();
    if !record.state.is_terminal() {
      return Err(RegistryError::NotTerminal {
        execution_id: execution_id.to_string(),
        state: record.state,
      });
    }

    executions.remove(execution_id);
    Ok(record)
  }

  /// Cancel every run and wait until all of them have finished.
  pub async fn shutdown(&self) {
    info!("registry_shutdown");
    self.root.cancel();

    let ids: Vec<String> = self
      .executions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();

    futures::future::join_all(ids.iter().map(|id| self.wait(id))).await;
  }

  fn entry(&self, execution_id: &str) -> Result<Arc<ExecutionEntry>, RegistryError> {
    self
      .executions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(execution_id)
      .cloned()
      .ok_or_else(|| RegistryError::NotFound {
        execution_id: execution_id.to_string(),
      })
  }
}
