// storefront/src/pipelines/common_steps.rs

//! Persistence steps shared by the flows that record a sale.

use crate::errors::Result as AppResult;
use crate::models::{NewCustomer, NewOrder, NewTransaction, OrderStatus};
use crate::pipelines::contexts::Buyer;
use crate::state::AppState;
use tracing::{info, instrument};

#[instrument(name = "common_step::record_customer", skip_all, err(Display))]
pub async fn record_customer(app: &AppState, buyer: &Buyer) -> AppResult<i64> {
  let id = app
    .store
    .insert_customer(&NewCustomer {
      first_name: buyer.first_name.clone(),
      last_name: buyer.last_name.clone(),
      email: buyer.email.clone(),
    })
    .await?;
  info!(customer_id = id, "Customer recorded.");
  Ok(id)
}

#[instrument(
  name = "common_step::record_transaction",
  skip_all,
  fields(amount = txn.amount, currency = %txn.currency, status = ?txn.status),
  err(Display)
)]
pub async fn record_transaction(app: &AppState, txn: &NewTransaction) -> AppResult<i64> {
  let id = app.store.insert_transaction(txn).await?;
  info!(transaction_id = id, "Transaction recorded.");
  Ok(id)
}

/// A purchased order of one unit.
#[instrument(name = "common_step::record_order", skip(app), err(Display))]
pub async fn record_order(
  app: &AppState,
  widget_id: i64,
  transaction_id: i64,
  customer_id: i64,
  amount: i64,
) -> AppResult<i64> {
  let id = app
    .store
    .insert_order(&NewOrder {
      widget_id,
      transaction_id,
      customer_id,
      status: OrderStatus::Purchased,
      quantity: 1,
      amount,
    })
    .await?;
  info!(order_id = id, "Order recorded.");
  Ok(id)
}
