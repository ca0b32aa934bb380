// storefront/src/pipelines/refund_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderStatus, TransactionStatus};
use crate::pipelines::contexts::RefundCtxData;
use crate::pipelines::journal::{self, StoreJournal};
use crate::state::AppState;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use tracing::{event, instrument, Level};

pub const FLOW_NAME: &str = "refund";
pub const SETTLEMENT_STEP: &str = "issue_refund";
pub const REFUND_NOTICE: &str = "the charge was refunded, but the database could not be updated";

/// Refund of a purchased order. The gateway refund has no compensation;
/// a failed status update after it leaves the journal entry for the sweep.
pub fn register_refund_pipeline(flows: &Flows<AppError>, app: &AppState) {
  let mut flow = Flow::<RefundCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("load_order", Effect::None, None),
      (SETTLEMENT_STEP, Effect::Settlement, None),
      ("mark_order_refunded", Effect::Local, None),
      ("mark_transaction_refunded", Effect::Local, None),
    ],
  );
  flow
    .with_journal(StoreJournal::new(app.store.clone()))
    .describe_with(RefundCtxData::journal_subject)
    .reconciliation_notice(REFUND_NOTICE);

  flow.on_step("load_order", |ctx_data| Box::pin(load_order(ctx_data)));

  flow.on_step(SETTLEMENT_STEP, |ctx_data: ContextData<RefundCtxData>| async move {
    let (gateway, payment_intent, amount) =
      ctx_data.with_read(|d| (d.app.gateway.clone(), d.payment_intent.clone(), d.amount));

    let refund = gateway.refund(&payment_intent, amount).await?;
    event!(Level::INFO, refund_id = %refund.id, %payment_intent, amount, "Charge refunded at gateway.");
    ctx_data.write().refund_id = Some(refund.id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("mark_order_refunded", |ctx_data: ContextData<RefundCtxData>| async move {
    let (store, order_id) = ctx_data.with_read(|d| (d.app.store.clone(), d.order_id));
    store.update_order_status(order_id, OrderStatus::Refunded).await?;
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("mark_transaction_refunded", |ctx_data: ContextData<RefundCtxData>| async move {
    let (store, transaction_id) =
      ctx_data.with_read(|d| (d.app.store.clone(), d.order.as_ref().map(|o| o.order.transaction_id)));
    let transaction_id =
      transaction_id.ok_or_else(|| AppError::Internal("refund lost track of its transaction".to_string()))?;
    store.update_transaction_status(transaction_id, TransactionStatus::Refunded).await?;
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Refund pipeline registered.");
}

#[instrument(name = "refund::load_order", skip_all, fields(order_id), err(Display))]
async fn load_order(ctx_data: ContextData<RefundCtxData>) -> AppResult<Control> {
  let (store, order_id, payment_intent, amount) =
    ctx_data.with_read(|d| (d.app.store.clone(), d.order_id, d.payment_intent.clone(), d.amount));
  tracing::Span::current().record("order_id", order_id);

  if amount <= 0 {
    return Err(AppError::BadRequest("refund amount must be positive".to_string()));
  }

  journal::ensure_no_unfinished_run(store.as_ref(), FLOW_NAME, order_id).await?;

  let order = store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

  if order.order.status != OrderStatus::Purchased {
    return Err(AppError::Conflict(format!("order {} is already {}", order_id, order.order.status)));
  }
  if order.transaction.payment_intent != payment_intent {
    return Err(AppError::BadRequest(format!(
      "payment intent does not belong to order {}",
      order_id
    )));
  }
  if amount > order.transaction.amount {
    return Err(AppError::BadRequest(format!(
      "refund amount {} exceeds the charged amount {}",
      amount, order.transaction.amount
    )));
  }

  ctx_data.write().order = Some(order);
  Ok(Control::Continue)
}
