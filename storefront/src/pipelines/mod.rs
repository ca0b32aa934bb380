// storefront/src/pipelines/mod.rs

//! The storefront's business flows, built on `sagaflow`.

use crate::errors::AppError;
use crate::state::AppState;
use sagaflow::Flows;

pub mod common_steps;
pub mod contexts;
pub mod journal;
pub mod reconciliation;

pub mod cancellation_pipeline;
pub mod charge_pipeline;
pub mod confirmation_pipeline;
pub mod invoice_pipeline;
pub mod password_reset_pipeline;
pub mod refund_pipeline;
pub mod signin_pipeline;
pub mod subscription_pipeline;

/// Registers every flow with `flows`. Called once at startup, after
/// [`AppState::new`]; flows that journal take the store from `app`.
pub fn register_all_pipelines(flows: &Flows<AppError>, app: &AppState) {
  tracing::info!("Registering flows...");

  charge_pipeline::register_charge_pipeline(flows);
  subscription_pipeline::register_subscription_pipeline(flows, app);
  confirmation_pipeline::register_confirmation_pipeline(flows);
  refund_pipeline::register_refund_pipeline(flows, app);
  cancellation_pipeline::register_cancellation_pipeline(flows, app);
  invoice_pipeline::register_invoice_pipeline(flows);
  signin_pipeline::register_signin_pipeline(flows);
  password_reset_pipeline::register_password_reset_pipelines(flows);

  tracing::info!(flows = ?flows.names(), "All flows registered.");
}
