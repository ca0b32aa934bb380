// sagaflow/src/registry.rs

//! `Flows<E>`: a registry of flows keyed by their context data type.

use crate::core::context_data::ContextData;
use crate::core::control::Outcome;
use crate::error::FlowError;
use crate::flow::definition::Flow;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait AnyFlowRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<Outcome, AppErr>;

  fn flow_name(&self) -> &str;
}

struct FlowRunner<TData, FlowErr, AppErr>
where
  TData: 'static + Send + Sync,
  FlowErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: Arc<Flow<TData, FlowErr>>,
  _phantom: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, FlowErr, AppErr> AnyFlowRunner<AppErr> for FlowRunner<TData, FlowErr, AppErr>
where
  TData: 'static + Send + Sync,
  FlowErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<FlowErr> + From<FlowError> + Send + Sync + 'static,
{
  #[instrument(
    name = "FlowRunner::run_erased",
    skip_all,
    fields(flow = %self.flow.name(), context_type = %std::any::type_name::<TData>()),
  )]
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<Outcome, AppErr> {
    let ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<TData>>();
        event!(Level::ERROR, expected_type, "Context object type mismatch.");
        return Err(AppErr::from(FlowError::TypeMismatch {
          expected_type: expected_type.to_string(),
        }));
      }
    };
    self.flow.run(ctx_data).await.map_err(AppErr::from)
  }

  fn flow_name(&self) -> &str {
    self.flow.name()
  }
}

/// Type-keyed flow registry. One flow per context type.
pub struct Flows<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  registry: Mutex<HashMap<TypeId, Arc<dyn AnyFlowRunner<AppErr>>>>,
}

impl<AppErr> Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: Mutex::new(HashMap::new()),
    }
  }

  /// Registers `flow` for its context type, replacing any earlier flow for
  /// the same type.
  pub fn register<TData, FlowErr>(&self, flow: Flow<TData, FlowErr>)
  where
    TData: 'static + Send + Sync,
    FlowErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<FlowErr>,
  {
    event!(
      Level::DEBUG,
      flow = %flow.name(),
      context_type = %std::any::type_name::<TData>(),
      "Registering flow."
    );
    let runner = FlowRunner::<TData, FlowErr, AppErr> {
      flow: Arc::new(flow),
      _phantom: PhantomData,
    };
    if let Some(previous) = self.registry.lock().insert(TypeId::of::<TData>(), Arc::new(runner)) {
      event!(Level::WARN, replaced = %previous.flow_name(), "Flow replaced in registry.");
    }
  }

  pub fn contains<TData: 'static>(&self) -> bool {
    self.registry.lock().contains_key(&TypeId::of::<TData>())
  }

  /// Names of all registered flows, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.registry.lock().values().map(|r| r.flow_name().to_string()).collect();
    names.sort();
    names
  }

  /// Runs the flow registered for `TData`.
  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<Outcome, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = {
      let guard = self.registry.lock();
      guard.get(&TypeId::of::<TData>()).cloned()
    };
    let Some(runner) = runner else {
      let type_name = std::any::type_name::<TData>();
      event!(Level::ERROR, type_name, "No flow registered for context type.");
      return Err(AppErr::from(FlowError::NotRegistered {
        type_name: type_name.to_string(),
      }));
    };

    runner.run_erased(Box::new(ctx_data)).await
  }
}

impl<AppErr> Default for Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
