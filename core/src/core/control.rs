// sagaflow/src/core/control.rs

//! Signals returned by handlers and the outcome of a flow run.

/// Returned by a step handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  Continue,
  /// Halt the flow. Remaining steps do not run and no compensation happens.
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// Every non-skipped step ran.
  Completed,
  /// A handler returned [`Control::Stop`].
  Stopped,
}
