// storefront/src/services/store.rs

//! The persistence boundary. Each call is its own atomic unit; nothing here
//! spans more than one statement of business meaning.

use crate::errors::Result as AppResult;
use crate::models::{
  JournalEntry, NewCustomer, NewOrder, NewTransaction, OrderDetail, OrderKind, OrderStatus, PageRequest,
  TransactionStatus, User, Widget,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sagaflow::JournalState;

#[async_trait]
pub trait Store: Send + Sync {
  async fn insert_customer(&self, customer: &NewCustomer) -> AppResult<i64>;

  async fn insert_transaction(&self, txn: &NewTransaction) -> AppResult<i64>;

  async fn insert_order(&self, order: &NewOrder) -> AppResult<i64>;

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> AppResult<()>;

  /// Refuses a backwards move with `Conflict`.
  async fn update_transaction_status(&self, transaction_id: i64, status: TransactionStatus) -> AppResult<()>;

  async fn get_widget(&self, id: i64) -> AppResult<Option<Widget>>;

  async fn get_order(&self, id: i64) -> AppResult<Option<OrderDetail>>;

  /// Newest first. Returns the page and the total count for `kind`.
  async fn get_orders_paginated(&self, kind: OrderKind, page: PageRequest) -> AppResult<(Vec<OrderDetail>, i64)>;

  async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

  async fn insert_user(&self, first_name: &str, last_name: &str, email: &str, password_hash: &str) -> AppResult<i64>;

  /// Replaces every existing token of the user with this one. Only the hash is stored.
  async fn insert_token(&self, user_id: i64, token_hash: &str, expiry: DateTime<Utc>, scope: &str) -> AppResult<()>;

  /// Looks up the owner of an unexpired token given its plaintext.
  async fn get_user_for_token(&self, token: &str) -> AppResult<Option<User>>;

  async fn update_password_for_user(&self, user_id: i64, password_hash: &str) -> AppResult<()>;

  async fn open_journal(&self, flow: &str, subject: &serde_json::Value) -> AppResult<i64>;

  async fn mark_journal_step(&self, id: i64, step: &str, subject: &serde_json::Value) -> AppResult<()>;

  async fn close_journal(&self, id: i64, state: JournalState, note: Option<&str>) -> AppResult<()>;

  /// Oldest first.
  async fn list_journal(&self, states: &[JournalState]) -> AppResult<Vec<JournalEntry>>;
}
