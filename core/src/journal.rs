// sagaflow/src/journal.rs

//! Write-ahead journal hook for flows with external side effects.
//!
//! The engine writes an intent entry before the first remote step, records
//! each committed remote step, and closes the entry with a [`JournalState`].
//! A later sweep can find entries that never reached a terminal state.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

pub type JournalId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalState {
  /// Intent recorded, outcome not yet known.
  Open,
  Completed,
  /// Failed before anything settled.
  Failed,
  /// Failed after a settlement; every compensation succeeded.
  Compensated,
  /// Failed after a settlement with no (or failed) compensation.
  NeedsReconciliation,
}

impl JournalState {
  pub fn as_str(self) -> &'static str {
    match self {
      JournalState::Open => "open",
      JournalState::Completed => "completed",
      JournalState::Failed => "failed",
      JournalState::Compensated => "compensated",
      JournalState::NeedsReconciliation => "needs_reconciliation",
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      JournalState::Completed | JournalState::Failed | JournalState::Compensated
    )
  }
}

impl fmt::Display for JournalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for JournalState {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(JournalState::Open),
      "completed" => Ok(JournalState::Completed),
      "failed" => Ok(JournalState::Failed),
      "compensated" => Ok(JournalState::Compensated),
      "needs_reconciliation" => Ok(JournalState::NeedsReconciliation),
      other => Err(format!("unknown journal state '{}'", other)),
    }
  }
}

#[async_trait]
pub trait Journal: Send + Sync {
  /// Records the intent to run `flow` for `subject`. Called before the first
  /// external step; an error aborts the flow.
  async fn begin(&self, flow: &str, subject: &str) -> anyhow::Result<JournalId>;

  /// Records that an external step committed. `subject` is re-described so
  /// it can carry identifiers returned by that step.
  async fn step_committed(&self, id: JournalId, step: &str, subject: &str) -> anyhow::Result<()>;

  async fn finish(&self, id: JournalId, state: JournalState, note: Option<String>) -> anyhow::Result<()>;
}
