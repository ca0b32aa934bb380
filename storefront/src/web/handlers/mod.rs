// storefront/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod auth_handlers;
pub mod invoice_handlers;
pub mod payment_handlers;
pub mod widget_handlers;

use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;
use sagaflow::{ContextData, Outcome};
use tracing::warn;

/// Runs the flow for `ctx` and requires it to finish every step.
pub(crate) async fn run_to_completion<T>(app: &AppState, ctx: ContextData<T>) -> AppResult<()>
where
  T: Send + Sync + 'static,
{
  match app.flows.run(ctx).await? {
    Outcome::Completed => Ok(()),
    Outcome::Stopped => {
      warn!(context_type = %std::any::type_name::<T>(), "Flow stopped before completing.");
      Err(AppError::Internal("request was halted before completing".to_string()))
    }
  }
}
