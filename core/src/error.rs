// sagaflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for step '{step_name}' in flow '{flow}'")]
  HandlerMissing { flow: String, step_name: String },

  #[error("No flow registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Type mismatch during context downcast (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  /// The journal refused the intent entry, so no external call was made.
  #[error("Journal unavailable for flow '{flow}': {source}")]
  Journal {
    flow: String,
    #[source]
    source: AnyhowError,
  },

  /// A step failed after a settlement step had already committed.
  #[error("Flow '{flow}' failed at step '{step}' after committing {committed:?}: {notice}. Source: {source}")]
  PartialCommit {
    flow: String,
    step: String,
    committed: Vec<String>,
    compensated: bool,
    notice: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Internal flow error: {0}")]
  Internal(String),
}

impl FlowError {
  /// True when money moved at an external service without matching local state.
  pub fn needs_reconciliation(&self) -> bool {
    matches!(self, FlowError::PartialCommit { .. })
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
