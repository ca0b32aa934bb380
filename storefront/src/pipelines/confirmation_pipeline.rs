// storefront/src/pipelines/confirmation_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{NewTransaction, TransactionStatus};
use crate::pipelines::common_steps::{record_customer, record_order, record_transaction};
use crate::pipelines::contexts::{ConfirmationCtxData, ConfirmationMode};
use sagaflow::{ContextData, Control, Effect, Flow, Flows, SkipCondition};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Finalizes bookkeeping for a charge the client already confirmed.
///
/// Checkout records customer, transaction and order. The virtual terminal
/// records only the transaction. Nothing is rolled back on failure: rows
/// written before the failing step stay.
pub fn register_confirmation_pipeline(flows: &Flows<AppError>) {
  let terminal_only: SkipCondition<ConfirmationCtxData> =
    Arc::new(|ctx_data: ContextData<ConfirmationCtxData>| ctx_data.read().mode == ConfirmationMode::Terminal);

  let mut flow = Flow::<ConfirmationCtxData, AppError>::new(
    "payment_confirmation",
    &[
      ("retrieve_payment_intent", Effect::None, None),
      ("retrieve_payment_method", Effect::None, None),
      ("persist_customer", Effect::Local, Some(terminal_only.clone())),
      ("persist_transaction", Effect::Local, None),
      ("persist_order", Effect::Local, Some(terminal_only)),
    ],
  );

  flow.on_step("retrieve_payment_intent", |ctx_data| Box::pin(retrieve_payment_intent(ctx_data)));
  flow.on_step("retrieve_payment_method", |ctx_data| Box::pin(retrieve_payment_method(ctx_data)));

  flow.on_step("persist_customer", |ctx_data: ContextData<ConfirmationCtxData>| async move {
    let (app, buyer) = ctx_data.with_read(|d| (d.app.clone(), d.buyer.clone()));
    let customer_id = record_customer(&app, &buyer).await?;
    ctx_data.write().recorded.customer_id = Some(customer_id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("persist_transaction", |ctx_data| Box::pin(persist_transaction(ctx_data)));

  flow.on_step("persist_order", |ctx_data: ContextData<ConfirmationCtxData>| async move {
    let (app, widget_id, recorded, amount) = ctx_data.with_read(|d| {
      (
        d.app.clone(),
        d.widget_id,
        d.recorded.clone(),
        d.intent.as_ref().map(|i| i.amount).unwrap_or_default(),
      )
    });
    let widget_id = widget_id.ok_or_else(|| AppError::BadRequest("product_id is required".to_string()))?;
    let (Some(transaction_id), Some(customer_id)) = (recorded.transaction_id, recorded.customer_id) else {
      return Err(AppError::Internal("order is missing its transaction or customer".to_string()));
    };

    let order_id = record_order(&app, widget_id, transaction_id, customer_id, amount).await?;
    ctx_data.write().recorded.order_id = Some(order_id);
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Payment confirmation pipeline registered.");
}

#[instrument(name = "confirmation::retrieve_payment_intent", skip_all, err(Display))]
async fn retrieve_payment_intent(ctx_data: ContextData<ConfirmationCtxData>) -> AppResult<Control> {
  let (gateway, id) = ctx_data.with_read(|d| (d.app.gateway.clone(), d.payment_intent.clone()));
  if id.trim().is_empty() {
    return Err(AppError::BadRequest("payment_intent is required".to_string()));
  }

  let intent = gateway.retrieve_payment_intent(&id).await?;
  if intent.latest_charge.is_none() {
    event!(Level::WARN, intent_id = %intent.id, status = %intent.status, "Payment intent has no charge.");
    return Err(AppError::BadRequest(format!("payment intent {} has no charge", intent.id)));
  }

  ctx_data.write().intent = Some(intent);
  Ok(Control::Continue)
}

#[instrument(name = "confirmation::retrieve_payment_method", skip_all, err(Display))]
async fn retrieve_payment_method(ctx_data: ContextData<ConfirmationCtxData>) -> AppResult<Control> {
  let (gateway, id) = ctx_data.with_read(|d| (d.app.gateway.clone(), d.payment_method.clone()));
  if id.trim().is_empty() {
    return Err(AppError::BadRequest("payment_method is required".to_string()));
  }

  let method = gateway.retrieve_payment_method(&id).await?;
  let card = method
    .card
    .ok_or_else(|| AppError::BadRequest(format!("payment method {} is not a card", method.id)))?;

  ctx_data.write().card = Some(card);
  Ok(Control::Continue)
}

/// Amount and currency come from the retrieved intent, not from the request.
#[instrument(name = "confirmation::persist_transaction", skip_all, err(Display))]
async fn persist_transaction(ctx_data: ContextData<ConfirmationCtxData>) -> AppResult<Control> {
  let (app, intent, card, payment_method) =
    ctx_data.with_read(|d| (d.app.clone(), d.intent.clone(), d.card.clone(), d.payment_method.clone()));
  let (Some(intent), Some(card)) = (intent, card) else {
    return Err(AppError::Internal("confirmation reached persistence without intent and card".to_string()));
  };

  let txn = NewTransaction {
    amount: intent.amount,
    currency: intent.currency.clone(),
    last_four: card.last4,
    expiry_month: card.exp_month,
    expiry_year: card.exp_year,
    payment_intent: intent.id,
    payment_method,
    bank_return_code: intent.latest_charge.unwrap_or_default(),
    status: TransactionStatus::Cleared,
  };
  let transaction_id = record_transaction(&app, &txn).await?;
  ctx_data.write().recorded.transaction_id = Some(transaction_id);
  Ok(Control::Continue)
}
