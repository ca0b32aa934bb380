// storefront/src/web/handlers/invoice_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use super::run_to_completion;
use crate::errors::AppError;
use crate::pipelines::contexts::InvoiceCtxData;
use crate::services::invoice_pdf::InvoiceData;
use crate::state::AppState;
use crate::web::extract::{AuthenticatedUser, JsonPayload};
use crate::web::response::ok_message;
use sagaflow::ContextData;

/// The order's display fields, as the back office shows them.
#[derive(Debug, Deserialize, Validate)]
pub struct InvoicePayload {
  #[validate(range(min = 1, message = "must be a valid order id"))]
  pub id: i64,
  #[validate(range(min = 1, message = "must be at least 1"))]
  pub quantity: i32,
  pub amount: i64,
  #[validate(length(min = 1, message = "product is required"))]
  pub product: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[validate(email(message = "must be a valid email address"))]
  pub email: String,
  pub created_at: DateTime<Utc>,
}

#[instrument(name = "handler::invoice", skip_all, fields(user_id = user.0.id, order_id = payload.id))]
pub async fn create_and_send_invoice_handler(
  app_state: web::Data<AppState>,
  user: AuthenticatedUser,
  payload: JsonPayload<InvoicePayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let payload = payload.into_inner();
  let (order_id, email) = (payload.id, payload.email.clone());

  let ctx = ContextData::new(InvoiceCtxData {
    app: app_state.get_ref().clone(),
    invoice: InvoiceData {
      order_id: payload.id,
      product: payload.product,
      quantity: payload.quantity,
      amount: payload.amount,
      first_name: payload.first_name,
      last_name: payload.last_name,
      email: payload.email,
      created_at: payload.created_at,
    },
    pdf_path: None,
  });
  run_to_completion(&app_state, ctx).await?;

  info!(order_id, "Invoice issued.");
  Ok(ok_message(format!("invoice {}.pdf created and sent to {}", order_id, email)))
}
