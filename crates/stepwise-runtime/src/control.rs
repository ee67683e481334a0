use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Run-scoped control signals: the execution id, the cancellation token and
/// an optional pause gate.
///
/// The gate carries `true` while the run is paused. The runtime consults it
/// before dispatching each step; cancellation wakes a paused run.
#[derive(Debug, Clone)]
pub struct RunControl {
  execution_id: String,
  cancel: CancellationToken,
  pause: Option<watch::Receiver<bool>>,
}

impl RunControl {
  /// Control for a fresh run with a generated execution id.
  pub fn new(cancel: CancellationToken) -> Self {
    Self {
      execution_id: uuid::Uuid::new_v4().to_string(),
      cancel,
      pause: None,
    }
  }

  pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
    self.execution_id = execution_id.into();
    self
  }

  pub fn with_pause_gate(mut self, gate: watch::Receiver<bool>) -> Self {
    self.pause = Some(gate);
    self
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  pub fn is_paused(&self) -> bool {
    self.pause.as_ref().is_some_and(|gate| *gate.borrow())
  }

  /// Wait until the run may dispatch more work.
  ///
  /// Returns `false` if the run was cancelled, either before or while
  /// waiting on the pause gate.
  pub async fn proceed(&mut self) -> bool {
    if self.cancel.is_cancelled() {
      return false;
    }

    if let Some(gate) = self.pause.as_mut() {
      let cancel = self.cancel.clone();
      tokio::select! {
        // A dropped sender can never pause again; treat the gate as open.
        _ = async { gate.wait_for(|paused| !*paused).await.map(|_| ()) } => {}
        _ = cancel.cancelled() => return false,
      }
    }

    !self.cancel.is_cancelled()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_proceed_without_gate() {
    let mut control = RunControl::new(CancellationToken::new());
    assert!(control.proceed().await);
    assert!(!control.is_paused());
  }

  #[tokio::test]
  async fn test_proceed_waits_for_resume() {
    let (tx, rx) = watch::channel(true);
    let mut control = RunControl::new(CancellationToken::new()).with_pause_gate(rx);
    assert!(control.is_paused());

    let resume = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      tx.send_replace(false);
      tx
    });

    assert!(control.proceed().await);
    assert!(!control.is_paused());
    drop(resume.await.unwrap());
  }

  #[tokio::test]
  async fn test_cancel_wakes_paused_run() {
    let (_tx, rx) = watch::channel(true);
    let cancel = CancellationToken::new();
    let mut control = RunControl::new(cancel.clone()).with_pause_gate(rx);

    let canceller = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      cancel.cancel();
    });

    assert!(!control.proceed().await);
    canceller.await.unwrap();
  }
}
