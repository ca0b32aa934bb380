// storefront/src/pipelines/charge_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::ChargeCtxData;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use tracing::{event, Level};

/// One-off charge: validate, then ask the gateway for a payment intent.
/// Nothing is persisted; the client completes the charge with the intent.
pub fn register_charge_pipeline(flows: &Flows<AppError>) {
  let mut flow = Flow::<ChargeCtxData, AppError>::new(
    "charge",
    &[
      ("validate_charge", Effect::None, None),
      ("create_payment_intent", Effect::Remote, None),
    ],
  );

  flow.on_step("validate_charge", |ctx_data: ContextData<ChargeCtxData>| async move {
    let (currency, amount, default_currency) = ctx_data.with_read(|d| {
      (
        d.currency.trim().to_lowercase(),
        d.amount,
        d.app.config.default_currency.clone(),
      )
    });

    let currency = if currency.is_empty() { default_currency } else { currency };
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(AppError::BadRequest(format!("'{}' is not a currency code", currency)));
    }
    if amount <= 0 {
      return Err(AppError::BadRequest("amount must be a positive number of minor units".to_string()));
    }

    event!(Level::DEBUG, %currency, amount, "Charge request validated.");
    ctx_data.write().currency = currency;
    Ok(Control::Continue)
  });

  flow.on_step("create_payment_intent", |ctx_data: ContextData<ChargeCtxData>| async move {
    let (gateway, currency, amount) = ctx_data.with_read(|d| (d.app.gateway.clone(), d.currency.clone(), d.amount));

    let intent = gateway.create_payment_intent(&currency, amount).await.map_err(|e| {
      event!(Level::WARN, error = %e, "Gateway refused the payment intent.");
      AppError::from(e)
    })?;

    event!(Level::INFO, intent_id = %intent.id, "Payment intent created.");
    ctx_data.write().intent = Some(intent);
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Charge pipeline registered.");
}
