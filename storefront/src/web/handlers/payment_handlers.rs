// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::run_to_completion;
use crate::errors::AppError;
use crate::pipelines::contexts::{
  Buyer, ChargeCtxData, ConfirmationCtxData, ConfirmationMode, RecordedSale, SubscriptionCtxData,
};
use crate::state::AppState;
use crate::web::extract::{int_from_str_or_number, AuthenticatedUser, JsonPayload};
use crate::web::response::ok_content;
use sagaflow::ContextData;

pub const SUBSCRIPTION_SUCCESS: &str = "Transaction successful";
pub const TERMINAL_SUCCESS: &str = "Virtual terminal payment succeeded";

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct ChargePayload {
  #[serde(default)]
  pub currency: String,
  #[serde(deserialize_with = "int_from_str_or_number")]
  pub amount: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribePayload {
  #[validate(length(min = 1, message = "payment method is required"))]
  pub payment_method: String,
  #[validate(email(message = "must be a valid email address"))]
  pub email: String,
  #[validate(length(min = 1, message = "first name is required"))]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub card_brand: String,
  #[serde(default)]
  pub exp_month: i32,
  #[serde(default)]
  pub exp_year: i32,
  #[validate(length(equal = 4, message = "must be the last four card digits"))]
  pub last_four: String,
  #[serde(default)]
  pub plan: String,
  #[serde(deserialize_with = "int_from_str_or_number")]
  pub product_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentSucceededPayload {
  #[validate(length(min = 1, message = "first name is required"))]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[validate(email(message = "must be a valid email address"))]
  pub email: String,
  pub payment_intent: String,
  pub payment_method: String,
  #[serde(deserialize_with = "int_from_str_or_number")]
  pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TerminalPayload {
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  pub payment_intent: String,
  pub payment_method: String,
}

// --- Handlers ---

#[instrument(name = "handler::payment_intent", skip(app_state, payload), fields(amount = payload.amount))]
pub async fn payment_intent_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<ChargePayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx = ContextData::new(ChargeCtxData {
    app: app_state.get_ref().clone(),
    currency: payload.currency,
    amount: payload.amount,
    intent: None,
  });

  run_to_completion(&app_state, ctx.clone()).await?;

  let intent = ctx
    .read()
    .intent
    .clone()
    .ok_or_else(|| AppError::Internal("charge completed without a payment intent".to_string()))?;
  info!(intent_id = %intent.id, "Payment intent handed to client.");
  Ok(ok_content("payment intent created", intent))
}

#[instrument(
  name = "handler::subscribe",
  skip(app_state, payload),
  fields(product_id = payload.product_id, plan = %payload.plan)
)]
pub async fn subscribe_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<SubscribePayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let payload = payload.into_inner();

  let ctx = ContextData::new(SubscriptionCtxData {
    app: app_state.get_ref().clone(),
    buyer: Buyer {
      first_name: payload.first_name,
      last_name: payload.last_name,
      email: payload.email,
    },
    widget_id: payload.product_id,
    plan: payload.plan,
    payment_method: payload.payment_method,
    last_four: payload.last_four,
    card_brand: payload.card_brand,
    expiry_month: payload.exp_month,
    expiry_year: payload.exp_year,
    widget: None,
    remote_customer_id: None,
    subscription_id: None,
    recorded: RecordedSale::default(),
  });

  if let Err(e) = run_to_completion(&app_state, ctx.clone()).await {
    let subscription_id = ctx.read().subscription_id.clone();
    warn!(error = %e, ?subscription_id, "Subscription signup failed.");
    return Err(e);
  }

  let (subscription_id, order_id) = ctx.with_read(|d| (d.subscription_id.clone(), d.recorded.order_id));
  info!(?subscription_id, ?order_id, "Subscription signup completed.");
  Ok(ok_content(
    SUBSCRIPTION_SUCCESS,
    json!({ "subscription_id": subscription_id, "order_id": order_id }),
  ))
}

#[instrument(
  name = "handler::payment_succeeded",
  skip(app_state, payload),
  fields(payment_intent = %payload.payment_intent)
)]
pub async fn payment_succeeded_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<PaymentSucceededPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let payload = payload.into_inner();

  let ctx = ContextData::new(ConfirmationCtxData {
    app: app_state.get_ref().clone(),
    mode: ConfirmationMode::Checkout,
    buyer: Buyer {
      first_name: payload.first_name,
      last_name: payload.last_name,
      email: payload.email,
    },
    widget_id: Some(payload.product_id),
    payment_intent: payload.payment_intent,
    payment_method: payload.payment_method,
    intent: None,
    card: None,
    recorded: RecordedSale::default(),
  });
  run_to_completion(&app_state, ctx.clone()).await?;

  let recorded = ctx.read().recorded.clone();
  Ok(ok_content(
    "Payment succeeded",
    json!({
      "customer_id": recorded.customer_id,
      "transaction_id": recorded.transaction_id,
      "order_id": recorded.order_id,
    }),
  ))
}

#[instrument(
  name = "handler::virtual_terminal_succeeded",
  skip(app_state, payload, user),
  fields(user_id = user.0.id, payment_intent = %payload.payment_intent)
)]
pub async fn virtual_terminal_succeeded_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<TerminalPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  let ctx = ContextData::new(ConfirmationCtxData {
    app: app_state.get_ref().clone(),
    mode: ConfirmationMode::Terminal,
    buyer: Buyer {
      first_name: payload.first_name,
      last_name: payload.last_name,
      email: payload.email,
    },
    widget_id: None,
    payment_intent: payload.payment_intent,
    payment_method: payload.payment_method,
    intent: None,
    card: None,
    recorded: RecordedSale::default(),
  });
  run_to_completion(&app_state, ctx.clone()).await?;

  let content = ctx.with_read(|d| {
    let intent = d.intent.as_ref();
    let card = d.card.as_ref();
    json!({
      "id": d.recorded.transaction_id,
      "amount": intent.map(|i| i.amount),
      "currency": intent.map(|i| i.currency.clone()),
      "last_four": card.map(|c| c.last4.clone()),
      "expiry_month": card.map(|c| c.exp_month),
      "expiry_year": card.map(|c| c.exp_year),
      "payment_intent": d.payment_intent,
      "payment_method": d.payment_method,
      "bank_return_code": intent.and_then(|i| i.latest_charge.clone()),
    })
  });
  Ok(ok_content(TERMINAL_SUCCESS, content))
}
