// sagaflow/src/flow/definition.rs

//! The `Flow<TData, Err>` struct and its construction-time configuration.

use crate::core::context_data::ContextData;
use crate::core::handler::{Compensation, Handler};
use crate::core::step::{Effect, SkipCondition, StepDef};
use crate::error::FlowError;
use crate::journal::Journal;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type Describe<TData> = Arc<dyn Fn(&TData) -> String + Send + Sync + 'static>;

/// An ordered sequence of named steps over a shared `ContextData<TData>`.
///
/// `Err` is the error type handlers return. It must absorb [`FlowError`] so
/// the engine can report setup problems and partial commits in the caller's
/// own error type.
pub struct Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) compensations: HashMap<String, Compensation<TData>>,
  pub(crate) journal: Option<Arc<dyn Journal>>,
  pub(crate) describe: Option<Describe<TData>>,
  pub(crate) notice: String,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new(name: &str, step_defs: &[(&str, Effect, Option<SkipCondition<TData>>)]) -> Self {
    let mut steps: Vec<StepDef<TData>> = Vec::with_capacity(step_defs.len());
    for (step_name, effect, skip_if) in step_defs {
      if steps.iter().any(|s| s.name == *step_name) {
        panic!("sagaflow setup error: step '{}' declared twice in flow '{}'.", step_name, name);
      }
      steps.push(StepDef {
        name: (*step_name).to_string(),
        effect: *effect,
        skip_if: skip_if.clone(),
      });
    }

    Self {
      name: name.to_string(),
      steps,
      on: HashMap::new(),
      compensations: HashMap::new(),
      journal: None,
      describe: None,
      notice: format!(
        "flow '{}' failed after an external settlement; local state needs reconciliation",
        name
      ),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Panics on an unknown step; a typo in a step name is a programming error.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "sagaflow setup error: step '{}' not found in flow '{}'.",
        step_name, self.name
      );
    }
  }

  pub(crate) fn effect_of(&self, step_name: &str) -> Option<Effect> {
    self.steps.iter().find(|s| s.name == step_name).map(|s| s.effect)
  }

  /// Message carried by [`FlowError::PartialCommit`] when this flow fails
  /// after a settlement step.
  pub fn reconciliation_notice(&mut self, notice: impl Into<String>) -> &mut Self {
    self.notice = notice.into();
    self
  }

  /// Produces the journal subject from the current context.
  pub fn describe_with(&mut self, describe: impl Fn(&TData) -> String + Send + Sync + 'static) -> &mut Self {
    self.describe = Some(Arc::new(describe));
    self
  }

  pub fn with_journal(&mut self, journal: Arc<dyn Journal>) -> &mut Self {
    self.journal = Some(journal);
    self
  }

  pub(crate) fn subject(&self, ctx: &ContextData<TData>) -> String {
    match &self.describe {
      Some(describe) => ctx.with_read(|data| describe(data)),
      None => String::new(),
    }
  }
}
