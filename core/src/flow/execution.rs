// sagaflow/src/flow/execution.rs

//! `Flow::run()`: step execution, journaling, and compensation on failure.

use crate::core::context_data::ContextData;
use crate::core::control::{Control, Outcome};
use crate::core::step::{Effect, StepDef};
use crate::error::FlowError;
use crate::flow::definition::Flow;
use crate::journal::{JournalId, JournalState};
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes the flow against `ctx_data`.
  ///
  /// On a handler error, compensations for already completed steps run in
  /// reverse order. When a `Settlement` step had committed before the
  /// failure, the error is wrapped in [`FlowError::PartialCommit`] and
  /// converted into `Err`; otherwise the handler's error is returned as is.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(
      flow = %self.name,
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<Outcome, Err> {
    event!(Level::DEBUG, "Flow execution starting.");

    let mut completed: Vec<&StepDef<TData>> = Vec::with_capacity(self.steps.len());
    let mut journal_id: Option<JournalId> = None;

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          event!(Level::INFO, step_name, "Step skipped due to 'skip_if' condition.");
          continue;
        }
      }

      let handlers = match self.on.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ => {
          event!(Level::ERROR, step_name, "Step has no handlers.");
          let missing = Err::from(FlowError::HandlerMissing {
            flow: self.name.clone(),
            step_name: step_name.to_string(),
          });
          return Err(self.fail(missing, step_name, &completed, &ctx_data, journal_id).await);
        }
      };

      if step_def.effect.is_external() && journal_id.is_none() {
        if let Some(journal) = &self.journal {
          let subject = self.subject(&ctx_data);
          match journal.begin(&self.name, &subject).await {
            Ok(id) => {
              event!(Level::DEBUG, journal_id = id, "Journal entry opened.");
              journal_id = Some(id);
            }
            Err(source) => {
              event!(Level::ERROR, error = %source, "Journal refused the intent entry; aborting before external call.");
              let refused = Err::from(FlowError::Journal {
                flow: self.name.clone(),
                source,
              });
              return Err(self.fail(refused, step_name, &completed, &ctx_data, None).await);
            }
          }
        }
      }

      let step_span = span!(
        Level::INFO,
        "flow_step",
        step_name,
        step_index = step_idx,
        effect = ?step_def.effect
      );

      let mut stopped = false;
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        match handler_fn(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(Control::Continue) => {}
          Ok(Control::Stop) => {
            event!(Level::INFO, step_name, handler_index = handler_idx, "Flow stopped by handler.");
            stopped = true;
            break;
          }
          Err(e) => {
            return Err(self.fail(e, step_name, &completed, &ctx_data, journal_id).await);
          }
        }
      }

      completed.push(step_def);

      if step_def.effect.is_external() {
        self.record_commit(journal_id, step_name, &ctx_data).await;
      }

      if stopped {
        self
          .close_journal(journal_id, JournalState::Completed, Some(format!("stopped at '{}'", step_name)))
          .await;
        return Ok(Outcome::Stopped);
      }
    }

    self.close_journal(journal_id, JournalState::Completed, None).await;
    event!(Level::DEBUG, "Flow execution completed.");
    Ok(Outcome::Completed)
  }

  async fn fail(
    &self,
    error: Err,
    failed_step: &str,
    completed: &[&StepDef<TData>],
    ctx_data: &ContextData<TData>,
    journal_id: Option<JournalId>,
  ) -> Err {
    event!(Level::ERROR, step_name = failed_step, error = %error, "Step failed.");

    let compensated = self.compensate(completed, ctx_data).await;
    let settled = completed.iter().any(|s| s.effect == Effect::Settlement);
    let note = Some(format!("failed at '{}': {}", failed_step, error));

    if !settled {
      self.close_journal(journal_id, JournalState::Failed, note).await;
      return error;
    }

    let state = if compensated {
      JournalState::Compensated
    } else {
      JournalState::NeedsReconciliation
    };
    self.close_journal(journal_id, state, note).await;

    let committed: Vec<String> = completed
      .iter()
      .filter(|s| s.effect.is_external())
      .map(|s| s.name.clone())
      .collect();

    event!(
      Level::ERROR,
      step_name = failed_step,
      committed = ?committed,
      compensated,
      "Flow failed after a settlement step committed."
    );

    Err::from(FlowError::PartialCommit {
      flow: self.name.clone(),
      step: failed_step.to_string(),
      committed,
      compensated,
      notice: self.notice.clone(),
      source: anyhow::Error::new(error),
    })
  }

  /// Runs registered compensations for `completed` in reverse order.
  ///
  /// Returns true only if every committed settlement step had a compensation
  /// and every compensation that ran succeeded.
  async fn compensate(&self, completed: &[&StepDef<TData>], ctx_data: &ContextData<TData>) -> bool {
    let mut all_neutralized = true;

    for step_def in completed.iter().rev() {
      let Some(compensation) = self.compensations.get(&step_def.name) else {
        if step_def.effect == Effect::Settlement {
          all_neutralized = false;
        }
        continue;
      };

      let comp_span = span!(Level::INFO, "flow_compensation", step_name = %step_def.name);
      match compensation(ctx_data.clone()).instrument(comp_span).await {
        Ok(()) => {
          event!(Level::INFO, step_name = %step_def.name, "Compensation succeeded.");
        }
        Err(e) => {
          event!(Level::ERROR, step_name = %step_def.name, error = %e, "Compensation failed.");
          all_neutralized = false;
        }
      }
    }

    all_neutralized
  }

  async fn record_commit(&self, journal_id: Option<JournalId>, step_name: &str, ctx_data: &ContextData<TData>) {
    let (Some(journal), Some(id)) = (&self.journal, journal_id) else {
      return;
    };
    let subject = self.subject(ctx_data);
    if let Err(e) = journal.step_committed(id, step_name, &subject).await {
      event!(Level::WARN, journal_id = id, step_name, error = %e, "Could not record committed step.");
    }
  }

  async fn close_journal(&self, journal_id: Option<JournalId>, state: JournalState, note: Option<String>) {
    let (Some(journal), Some(id)) = (&self.journal, journal_id) else {
      return;
    };
    if let Err(e) = journal.finish(id, state, note).await {
      event!(Level::WARN, journal_id = id, state = %state, error = %e, "Could not close journal entry.");
    }
  }
}
