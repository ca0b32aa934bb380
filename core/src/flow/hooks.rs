// sagaflow/src/flow/hooks.rs

//! Handler and compensation registration.

use crate::core::context_data::ContextData;
use crate::core::control::Control;
use crate::core::handler::{Compensation, Handler};
use crate::core::step::Effect;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use std::future::Future;
use tracing::{event, Level};

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Registers a handler for `step_name`. Several handlers on one step run
  /// in registration order.
  pub fn on_step<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.on.entry(step_name.to_string()).or_default().push(handler);
    self
  }

  /// Registers the compensation that neutralizes `step_name` once it has
  /// committed. Only one compensation per step; a second call replaces it.
  pub fn compensate_step<F, CompErr>(
    &mut self,
    step_name: &str,
    compensation_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = Result<(), CompErr>> + Send + 'static,
    CompErr: Into<anyhow::Error> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    if self.effect_of(step_name) == Some(Effect::None) {
      event!(
        Level::WARN,
        flow = %self.name,
        step_name,
        "Compensation registered for a step without side effects."
      );
    }
    let compensation: Compensation<TData> = Box::new(move |ctx_data| {
      let user_fut = compensation_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.compensations.insert(step_name.to_string(), compensation);
    self
  }
}
