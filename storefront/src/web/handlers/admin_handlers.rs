// storefront/src/web/handlers/admin_handlers.rs

//! Back-office endpoints. Every handler here takes an [`AuthenticatedUser`].

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use super::run_to_completion;
use crate::errors::AppError;
use crate::models::{OrderKind, PageRequest, Paginated};
use crate::pipelines::contexts::{CancellationCtxData, RefundCtxData};
use crate::pipelines::reconciliation::{self, UNRESOLVED_STATES};
use crate::state::AppState;
use crate::web::extract::{AuthenticatedUser, JsonPayload};
use crate::web::response::{ok_content, ok_message};
use sagaflow::ContextData;

#[derive(Debug, Deserialize)]
pub struct RefundPayload {
  pub id: i64,
  #[serde(rename = "pi")]
  pub payment_intent: String,
  /// Minor units, in the charge's currency.
  pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelPayload {
  pub id: i64,
  #[serde(rename = "pi")]
  pub subscription_id: String,
}

async fn paginated_orders(
  app_state: &AppState,
  kind: OrderKind,
  page: PageRequest,
) -> Result<HttpResponse, AppError> {
  page.validate()?;
  let (orders, total) = app_state.store.get_orders_paginated(kind, page).await?;
  info!(?kind, page = page.page, total, "Orders page fetched.");
  Ok(ok_content("", Paginated::new(page, total, orders)))
}

#[instrument(name = "handler::all_sales", skip_all, fields(user_id = user.0.id))]
pub async fn all_sales_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<PageRequest>,
) -> Result<HttpResponse, AppError> {
  paginated_orders(&app_state, OrderKind::Sale, payload.into_inner()).await
}

#[instrument(name = "handler::all_subscriptions", skip_all, fields(user_id = user.0.id))]
pub async fn all_subscriptions_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<PageRequest>,
) -> Result<HttpResponse, AppError> {
  paginated_orders(&app_state, OrderKind::Subscription, payload.into_inner()).await
}

#[instrument(name = "handler::get_sale", skip_all, fields(user_id = user.0.id, order_id = %path.as_ref()))]
pub async fn get_sale_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
  Ok(ok_content("", order))
}

#[instrument(
  name = "handler::refund",
  skip_all,
  fields(user_id = user.0.id, order_id = payload.id, amount = payload.amount)
)]
pub async fn refund_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<RefundPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx = ContextData::new(RefundCtxData {
    app: app_state.get_ref().clone(),
    order_id: payload.id,
    payment_intent: payload.payment_intent,
    amount: payload.amount,
    order: None,
    refund_id: None,
  });
  run_to_completion(&app_state, ctx).await?;
  Ok(ok_message("Charge refunded"))
}

#[instrument(name = "handler::cancel_subscription", skip_all, fields(user_id = user.0.id, order_id = payload.id))]
pub async fn cancel_subscription_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<CancelPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx = ContextData::new(CancellationCtxData {
    app: app_state.get_ref().clone(),
    order_id: payload.id,
    subscription_id: payload.subscription_id,
    order: None,
  });
  run_to_completion(&app_state, ctx).await?;
  Ok(ok_message("Subscription cancelled"))
}

#[instrument(name = "handler::list_reconciliation", skip_all, fields(user_id = user.0.id))]
pub async fn list_reconciliation_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let entries = app_state.store.list_journal(&UNRESOLVED_STATES).await?;
  Ok(ok_content(format!("{} unresolved journal entries", entries.len()), entries))
}

#[instrument(name = "handler::run_reconciliation", skip_all, fields(user_id = user.0.id))]
pub async fn run_reconciliation_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let stale = chrono::Duration::seconds(app_state.config.reconciliation_stale_secs);
  let report = reconciliation::sweep(app_state.store.as_ref(), stale, chrono::Utc::now()).await?;
  Ok(ok_content("reconciliation sweep finished", report))
}
