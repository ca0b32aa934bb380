// storefront/src/services/pg_store.rs

//! Postgres-backed [`Store`] using sqlx runtime queries.

use crate::errors::{AppError, Result as AppResult};
use crate::models::order::{CustomerSummary, TransactionSummary, WidgetSummary};
use crate::models::{
  JournalEntry, NewCustomer, NewOrder, NewTransaction, Order, OrderDetail, OrderKind, OrderStatus, PageRequest,
  TransactionStatus, User, Widget,
};
use crate::services::auth_service::token_hash;
use crate::services::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sagaflow::JournalState;
use sqlx::{FromRow, PgPool};
use tracing::{error, instrument};

const ORDER_DETAIL_SELECT: &str = r#"
  SELECT
    o.id, o.widget_id, o.transaction_id, o.customer_id, o.status, o.quantity, o.amount,
    o.created_at, o.updated_at,
    w.name AS widget_name, w.is_recurring AS widget_is_recurring,
    t.amount AS txn_amount, t.currency AS txn_currency, t.last_four AS txn_last_four,
    t.payment_intent AS txn_payment_intent, t.status AS txn_status,
    c.first_name AS customer_first_name, c.last_name AS customer_last_name, c.email AS customer_email
  FROM orders o
  JOIN widgets w ON w.id = o.widget_id
  JOIN transactions t ON t.id = o.transaction_id
  JOIN customers c ON c.id = o.customer_id
"#;

#[derive(FromRow)]
struct OrderDetailRow {
  id: i64,
  widget_id: i64,
  transaction_id: i64,
  customer_id: i64,
  status: OrderStatus,
  quantity: i32,
  amount: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
  widget_name: String,
  widget_is_recurring: bool,
  txn_amount: i64,
  txn_currency: String,
  txn_last_four: String,
  txn_payment_intent: String,
  txn_status: TransactionStatus,
  customer_first_name: String,
  customer_last_name: String,
  customer_email: String,
}

impl From<OrderDetailRow> for OrderDetail {
  fn from(row: OrderDetailRow) -> Self {
    OrderDetail {
      order: Order {
        id: row.id,
        widget_id: row.widget_id,
        transaction_id: row.transaction_id,
        customer_id: row.customer_id,
        status: row.status,
        quantity: row.quantity,
        amount: row.amount,
        created_at: row.created_at,
        updated_at: row.updated_at,
      },
      widget: WidgetSummary {
        id: row.widget_id,
        name: row.widget_name,
        is_recurring: row.widget_is_recurring,
      },
      transaction: TransactionSummary {
        id: row.transaction_id,
        amount: row.txn_amount,
        currency: row.txn_currency,
        last_four: row.txn_last_four,
        payment_intent: row.txn_payment_intent,
        status: row.txn_status,
      },
      customer: CustomerSummary {
        id: row.customer_id,
        first_name: row.customer_first_name,
        last_name: row.customer_last_name,
        email: row.customer_email,
      },
    }
  }
}

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn db_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
  move |e| {
    error!(operation = op, error = %e, "Database operation failed.");
    AppError::Sqlx(e)
  }
}

#[async_trait]
impl Store for PgStore {
  #[instrument(name = "pg_store::insert_customer", skip_all, err(Display))]
  async fn insert_customer(&self, customer: &NewCustomer) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
      "INSERT INTO customers (first_name, last_name, email, created_at, updated_at)
       VALUES ($1, $2, $3, NOW(), NOW()) RETURNING id",
    )
    .bind(&customer.first_name)
    .bind(&customer.last_name)
    .bind(&customer.email)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("insert_customer"))
  }

  #[instrument(name = "pg_store::insert_transaction", skip_all, err(Display))]
  async fn insert_transaction(&self, txn: &NewTransaction) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
      "INSERT INTO transactions
         (amount, currency, last_four, expiry_month, expiry_year, payment_intent, payment_method,
          bank_return_code, status, created_at, updated_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING id",
    )
    .bind(txn.amount)
    .bind(&txn.currency)
    .bind(&txn.last_four)
    .bind(txn.expiry_month)
    .bind(txn.expiry_year)
    .bind(&txn.payment_intent)
    .bind(&txn.payment_method)
    .bind(&txn.bank_return_code)
    .bind(txn.status)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("insert_transaction"))
  }

  #[instrument(name = "pg_store::insert_order", skip_all, err(Display))]
  async fn insert_order(&self, order: &NewOrder) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
      "INSERT INTO orders
         (widget_id, transaction_id, customer_id, status, quantity, amount, created_at, updated_at)
       VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING id",
    )
    .bind(order.widget_id)
    .bind(order.transaction_id)
    .bind(order.customer_id)
    .bind(order.status)
    .bind(order.quantity)
    .bind(order.amount)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("insert_order"))
  }

  #[instrument(name = "pg_store::update_order_status", skip(self), err(Display))]
  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> AppResult<()> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
      .bind(status)
      .bind(order_id)
      .execute(&self.pool)
      .await
      .map_err(db_error("update_order_status"))?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("order {} not found", order_id)));
    }
    Ok(())
  }

  #[instrument(name = "pg_store::update_transaction_status", skip(self), err(Display))]
  async fn update_transaction_status(&self, transaction_id: i64, status: TransactionStatus) -> AppResult<()> {
    let current: Option<TransactionStatus> = sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1")
      .bind(transaction_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error("update_transaction_status"))?;
    let current = current.ok_or_else(|| AppError::NotFound(format!("transaction {} not found", transaction_id)))?;

    if !current.can_advance_to(status) {
      return Err(AppError::Conflict(format!(
        "transaction {} cannot move from {:?} to {:?}",
        transaction_id, current, status
      )));
    }

    // Guarded on the status we read so a concurrent change is not overwritten.
    let result = sqlx::query("UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3")
      .bind(status)
      .bind(transaction_id)
      .bind(current)
      .execute(&self.pool)
      .await
      .map_err(db_error("update_transaction_status"))?;
    if result.rows_affected() == 0 {
      return Err(AppError::Conflict(format!(
        "transaction {} changed while updating its status",
        transaction_id
      )));
    }
    Ok(())
  }

  #[instrument(name = "pg_store::get_widget", skip(self), err(Display))]
  async fn get_widget(&self, id: i64) -> AppResult<Option<Widget>> {
    sqlx::query_as::<_, Widget>(
      "SELECT id, name, description, price, is_recurring, plan_id FROM widgets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("get_widget"))
  }

  #[instrument(name = "pg_store::get_order", skip(self), err(Display))]
  async fn get_order(&self, id: i64) -> AppResult<Option<OrderDetail>> {
    let sql = format!("{} WHERE o.id = $1", ORDER_DETAIL_SELECT);
    let row = sqlx::query_as::<_, OrderDetailRow>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error("get_order"))?;
    Ok(row.map(OrderDetail::from))
  }

  #[instrument(name = "pg_store::get_orders_paginated", skip(self), err(Display))]
  async fn get_orders_paginated(&self, kind: OrderKind, page: PageRequest) -> AppResult<(Vec<OrderDetail>, i64)> {
    let recurring = kind.is_recurring();

    let total: i64 = sqlx::query_scalar(
      "SELECT COUNT(o.id) FROM orders o JOIN widgets w ON w.id = o.widget_id WHERE w.is_recurring = $1",
    )
    .bind(recurring)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("get_orders_paginated"))?;

    let sql = format!(
      "{} WHERE w.is_recurring = $1 ORDER BY o.created_at DESC, o.id DESC LIMIT $2 OFFSET $3",
      ORDER_DETAIL_SELECT
    );
    let rows = sqlx::query_as::<_, OrderDetailRow>(&sql)
      .bind(recurring)
      .bind(page.page_size)
      .bind(page.offset())
      .fetch_all(&self.pool)
      .await
      .map_err(db_error("get_orders_paginated"))?;

    Ok((rows.into_iter().map(OrderDetail::from).collect(), total))
  }

  #[instrument(name = "pg_store::get_user_by_email", skip_all, err(Display))]
  async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>(
      "SELECT id, first_name, last_name, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("get_user_by_email"))
  }

  #[instrument(name = "pg_store::insert_user", skip_all, err(Display))]
  async fn insert_user(&self, first_name: &str, last_name: &str, email: &str, password_hash: &str) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
      "INSERT INTO users (first_name, last_name, email, password_hash, created_at, updated_at)
       VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING id",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("insert_user"))
  }

  #[instrument(name = "pg_store::insert_token", skip(self, token_hash), err(Display))]
  async fn insert_token(&self, user_id: i64, token_hash: &str, expiry: DateTime<Utc>, scope: &str) -> AppResult<()> {
    let mut tx = self.pool.begin().await.map_err(db_error("insert_token"))?;

    sqlx::query("DELETE FROM tokens WHERE user_id = $1")
      .bind(user_id)
      .execute(&mut *tx)
      .await
      .map_err(db_error("insert_token"))?;

    sqlx::query(
      "INSERT INTO tokens (user_id, token_hash, expiry, scope, created_at, updated_at)
       VALUES ($1, $2, $3, $4, NOW(), NOW())",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expiry)
    .bind(scope)
    .execute(&mut *tx)
    .await
    .map_err(db_error("insert_token"))?;

    tx.commit().await.map_err(db_error("insert_token"))
  }

  #[instrument(name = "pg_store::get_user_for_token", skip_all, err(Display))]
  async fn get_user_for_token(&self, token: &str) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>(
      "SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash, u.created_at, u.updated_at
       FROM users u
       JOIN tokens t ON t.user_id = u.id
       WHERE t.token_hash = $1 AND t.expiry > $2",
    )
    .bind(token_hash(token))
    .bind(Utc::now())
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("get_user_for_token"))
  }

  #[instrument(name = "pg_store::update_password_for_user", skip(self, password_hash), err(Display))]
  async fn update_password_for_user(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
      .bind(password_hash)
      .bind(user_id)
      .execute(&self.pool)
      .await
      .map_err(db_error("update_password_for_user"))?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("user {} not found", user_id)));
    }
    Ok(())
  }

  #[instrument(name = "pg_store::open_journal", skip(self, subject), err(Display))]
  async fn open_journal(&self, flow: &str, subject: &serde_json::Value) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
      "INSERT INTO saga_journal (flow, subject, state, created_at, updated_at)
       VALUES ($1, $2, $3, NOW(), NOW()) RETURNING id",
    )
    .bind(flow)
    .bind(subject)
    .bind(JournalState::Open.as_str())
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("open_journal"))
  }

  #[instrument(name = "pg_store::mark_journal_step", skip(self, subject), err(Display))]
  async fn mark_journal_step(&self, id: i64, step: &str, subject: &serde_json::Value) -> AppResult<()> {
    sqlx::query("UPDATE saga_journal SET last_step = $1, subject = $2, updated_at = NOW() WHERE id = $3")
      .bind(step)
      .bind(subject)
      .bind(id)
      .execute(&self.pool)
      .await
      .map_err(db_error("mark_journal_step"))?;
    Ok(())
  }

  #[instrument(name = "pg_store::close_journal", skip(self), err(Display))]
  async fn close_journal(&self, id: i64, state: JournalState, note: Option<&str>) -> AppResult<()> {
    sqlx::query(
      "UPDATE saga_journal SET state = $1, note = COALESCE($2, note), updated_at = NOW() WHERE id = $3",
    )
    .bind(state.as_str())
    .bind(note)
    .bind(id)
    .execute(&self.pool)
    .await
    .map_err(db_error("close_journal"))?;
    Ok(())
  }

  #[instrument(name = "pg_store::list_journal", skip(self), err(Display))]
  async fn list_journal(&self, states: &[JournalState]) -> AppResult<Vec<JournalEntry>> {
    let states: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
    sqlx::query_as::<_, JournalEntry>(
      "SELECT id, flow, subject, state, last_step, note, created_at, updated_at
       FROM saga_journal WHERE state = ANY($1) ORDER BY created_at ASC, id ASC",
    )
    .bind(states)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error("list_journal"))
  }
}
