// storefront/src/pipelines/cancellation_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::OrderStatus;
use crate::pipelines::contexts::CancellationCtxData;
use crate::pipelines::journal::{self, StoreJournal};
use crate::state::AppState;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use tracing::{event, instrument, Level};

pub const FLOW_NAME: &str = "subscription_cancellation";
pub const SETTLEMENT_STEP: &str = "cancel_remote_subscription";
pub const CANCELLATION_NOTICE: &str = "the subscription was cancelled, but the database could not be updated";

pub fn register_cancellation_pipeline(flows: &Flows<AppError>, app: &AppState) {
  let mut flow = Flow::<CancellationCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("load_order", Effect::None, None),
      (SETTLEMENT_STEP, Effect::Settlement, None),
      ("mark_order_cancelled", Effect::Local, None),
    ],
  );
  flow
    .with_journal(StoreJournal::new(app.store.clone()))
    .describe_with(CancellationCtxData::journal_subject)
    .reconciliation_notice(CANCELLATION_NOTICE);

  flow.on_step("load_order", |ctx_data| Box::pin(load_order(ctx_data)));

  flow.on_step(SETTLEMENT_STEP, |ctx_data: ContextData<CancellationCtxData>| async move {
    let (gateway, subscription_id) = ctx_data.with_read(|d| (d.app.gateway.clone(), d.subscription_id.clone()));
    let subscription = gateway.cancel_subscription(&subscription_id).await?;
    event!(
      Level::INFO,
      %subscription_id,
      cancel_at_period_end = subscription.cancel_at_period_end,
      "Subscription cancelled at gateway."
    );
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("mark_order_cancelled", |ctx_data: ContextData<CancellationCtxData>| async move {
    let (store, order_id) = ctx_data.with_read(|d| (d.app.store.clone(), d.order_id));
    store.update_order_status(order_id, OrderStatus::Cancelled).await?;
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Subscription cancellation pipeline registered.");
}

#[instrument(name = "cancellation::load_order", skip_all, err(Display))]
async fn load_order(ctx_data: ContextData<CancellationCtxData>) -> AppResult<Control> {
  let (store, order_id, subscription_id) =
    ctx_data.with_read(|d| (d.app.store.clone(), d.order_id, d.subscription_id.clone()));

  journal::ensure_no_unfinished_run(store.as_ref(), FLOW_NAME, order_id).await?;

  let order = store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

  if order.order.status != OrderStatus::Purchased {
    return Err(AppError::Conflict(format!("order {} is already {}", order_id, order.order.status)));
  }
  if !order.widget.is_recurring {
    return Err(AppError::BadRequest(format!("order {} is not a subscription", order_id)));
  }
  if order.transaction.payment_intent != subscription_id {
    return Err(AppError::BadRequest(format!(
      "subscription does not belong to order {}",
      order_id
    )));
  }

  ctx_data.write().order = Some(order);
  Ok(Control::Continue)
}
