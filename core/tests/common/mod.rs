// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sagaflow::{ContextData, Control, FlowError, Journal, JournalId, JournalState};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub compensations_run: Vec<String>,
  pub should_stop_at: Option<String>,
  pub charge_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(#[from] FlowError),

  #[error("test handler failed: {0}")]
  Handler(String),
}

impl TestError {
  pub fn partial_commit(&self) -> Option<(&str, &[String], bool)> {
    match self {
      TestError::Flow(FlowError::PartialCommit {
        step,
        committed,
        compensated,
        ..
      }) => Some((step.as_str(), committed.as_slice(), *compensated)),
      _ => None,
    }
  }
}

pub fn create_simple_handler(
  step_name: &'static str,
  message_to_append: &'static str,
) -> sagaflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name.to_string());
      tracing::debug!(target: "test_handlers", step = step_name, counter = guard.counter, "executed");
      if guard.should_stop_at.as_deref() == Some(step_name) {
        return Ok(Control::Stop);
      }
      Ok(Control::Continue)
    })
  })
}

pub fn create_failing_handler(
  step_name: &'static str,
  error_message: &'static str,
) -> sagaflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      tracing::warn!(target: "test_handlers", step = step_name, "failing with: '{}'", error_message);
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

/// Records a step name into `compensations_run`; fails when `fail` is set.
pub fn create_compensation(
  step_name: &'static str,
  fail: bool,
) -> impl Fn(ContextData<TestContext>) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>
     + Send
     + Sync
     + 'static {
  move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().compensations_run.push(step_name.to_string());
      if fail {
        anyhow::bail!("compensation for {} failed", step_name);
      }
      Ok(())
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
  Begin { flow: String, subject: String },
  Committed { step: String, subject: String },
  Finish { state: JournalState, note: Option<String> },
}

#[derive(Default)]
pub struct RecordingJournal {
  pub events: Mutex<Vec<JournalEvent>>,
  pub refuse_begin: bool,
  next_id: AtomicI64,
}

impl RecordingJournal {
  pub fn refusing() -> Self {
    Self {
      refuse_begin: true,
      ..Default::default()
    }
  }

  pub fn events(&self) -> Vec<JournalEvent> {
    self.events.lock().clone()
  }

  pub fn final_state(&self) -> Option<JournalState> {
    self.events().iter().rev().find_map(|e| match e {
      JournalEvent::Finish { state, .. } => Some(*state),
      _ => None,
    })
  }
}

#[async_trait]
impl Journal for RecordingJournal {
  async fn begin(&self, flow: &str, subject: &str) -> anyhow::Result<JournalId> {
    if self.refuse_begin {
      anyhow::bail!("journal store offline");
    }
    self.events.lock().push(JournalEvent::Begin {
      flow: flow.to_string(),
      subject: subject.to_string(),
    });
    Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
  }

  async fn step_committed(&self, _id: JournalId, step: &str, subject: &str) -> anyhow::Result<()> {
    self.events.lock().push(JournalEvent::Committed {
      step: step.to_string(),
      subject: subject.to_string(),
    });
    Ok(())
  }

  async fn finish(&self, _id: JournalId, state: JournalState, note: Option<String>) -> anyhow::Result<()> {
    self.events.lock().push(JournalEvent::Finish { state, note });
    Ok(())
  }
}

use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
