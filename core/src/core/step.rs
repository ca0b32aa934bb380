// sagaflow/src/core/step.rs

//! Step definitions and the side-effect classes the engine reasons about.

use super::ContextData;
use std::sync::Arc;

/// Evaluated before a step runs; `true` skips it.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// What a step does to the world outside the flow context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
  /// Validation, lookups, reads from remote services.
  None,
  /// Writes to our own store or local disk.
  Local,
  /// Changes state at an external service without moving money.
  Remote,
  /// Moves or stops money at an external service. A failure after this
  /// step has committed is a partial commit.
  Settlement,
}

impl Effect {
  pub fn is_external(self) -> bool {
    matches!(self, Effect::Remote | Effect::Settlement)
  }
}

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub effect: Effect,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("effect", &self.effect)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
