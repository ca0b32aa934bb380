// storefront/src/services/memory_store.rs

//! In-memory [`Store`] used by tests and local demos, with failure injection.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{
  Customer, JournalEntry, NewCustomer, NewOrder, NewTransaction, Order, OrderDetail, OrderKind, OrderStatus,
  PageRequest, Transaction, TransactionStatus, User, Widget,
};
use crate::services::auth_service::token_hash;
use crate::services::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sagaflow::JournalState;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
  InsertCustomer,
  InsertTransaction,
  InsertOrder,
  UpdateOrderStatus,
  UpdateTransactionStatus,
  GetWidget,
  GetOrder,
  GetOrders,
  GetUserByEmail,
  InsertUser,
  InsertToken,
  GetUserForToken,
  UpdatePassword,
  OpenJournal,
  MarkJournalStep,
  CloseJournal,
  ListJournal,
}

#[derive(Debug, Clone)]
struct StoredToken {
  user_id: i64,
  hash: String,
  expiry: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
  next_id: i64,
  widgets: BTreeMap<i64, Widget>,
  customers: BTreeMap<i64, Customer>,
  transactions: BTreeMap<i64, Transaction>,
  orders: BTreeMap<i64, Order>,
  users: BTreeMap<i64, User>,
  tokens: Vec<StoredToken>,
  journal: BTreeMap<i64, JournalEntry>,
  failing: HashSet<StoreOp>,
}

impl Tables {
  fn next_id(&mut self) -> i64 {
    self.next_id += 1;
    self.next_id
  }

  fn check(&self, op: StoreOp) -> AppResult<()> {
    if self.failing.contains(&op) {
      return Err(AppError::Sqlx(sqlx::Error::PoolTimedOut));
    }
    Ok(())
  }

  fn detail(&self, order: &Order) -> AppResult<OrderDetail> {
    let widget = self
      .widgets
      .get(&order.widget_id)
      .ok_or_else(|| AppError::Internal(format!("order {} references missing widget", order.id)))?;
    let txn = self
      .transactions
      .get(&order.transaction_id)
      .ok_or_else(|| AppError::Internal(format!("order {} references missing transaction", order.id)))?;
    let customer = self
      .customers
      .get(&order.customer_id)
      .ok_or_else(|| AppError::Internal(format!("order {} references missing customer", order.id)))?;
    Ok(OrderDetail::assemble(order.clone(), widget, txn, customer))
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every later call of `op` fails with a database error until cleared.
  pub fn fail_on(&self, op: StoreOp) {
    self.tables.lock().failing.insert(op);
  }

  pub fn clear_failures(&self) {
    self.tables.lock().failing.clear();
  }

  pub fn add_widget(&self, name: &str, price: i64, is_recurring: bool, plan_id: &str) -> Widget {
    let mut tables = self.tables.lock();
    let widget = Widget {
      id: tables.next_id(),
      name: name.to_string(),
      description: format!("A very nice {}", name.to_lowercase()),
      price,
      is_recurring,
      plan_id: plan_id.to_string(),
    };
    tables.widgets.insert(widget.id, widget.clone());
    widget
  }

  pub fn add_user(&self, email: &str, password_hash: &str) -> User {
    let mut tables = self.tables.lock();
    let now = Utc::now();
    let user = User {
      id: tables.next_id(),
      first_name: "Admin".to_string(),
      last_name: "User".to_string(),
      email: email.to_string(),
      password_hash: password_hash.to_string(),
      created_at: now,
      updated_at: now,
    };
    tables.users.insert(user.id, user.clone());
    user
  }

  pub fn customers(&self) -> Vec<Customer> {
    self.tables.lock().customers.values().cloned().collect()
  }

  pub fn transactions(&self) -> Vec<Transaction> {
    self.tables.lock().transactions.values().cloned().collect()
  }

  pub fn orders(&self) -> Vec<Order> {
    self.tables.lock().orders.values().cloned().collect()
  }

  pub fn order(&self, id: i64) -> Option<Order> {
    self.tables.lock().orders.get(&id).cloned()
  }

  pub fn transaction(&self, id: i64) -> Option<Transaction> {
    self.tables.lock().transactions.get(&id).cloned()
  }

  pub fn user(&self, id: i64) -> Option<User> {
    self.tables.lock().users.get(&id).cloned()
  }

  pub fn journal(&self) -> Vec<JournalEntry> {
    self.tables.lock().journal.values().cloned().collect()
  }

  /// Moves a journal entry's timestamps into the past.
  pub fn age_journal_entry(&self, id: i64, by: chrono::Duration) {
    if let Some(entry) = self.tables.lock().journal.get_mut(&id) {
      entry.created_at -= by;
      entry.updated_at -= by;
    }
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn insert_customer(&self, customer: &NewCustomer) -> AppResult<i64> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::InsertCustomer)?;
    let now = Utc::now();
    let id = tables.next_id();
    tables.customers.insert(
      id,
      Customer {
        id,
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn insert_transaction(&self, txn: &NewTransaction) -> AppResult<i64> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::InsertTransaction)?;
    let now = Utc::now();
    let id = tables.next_id();
    tables.transactions.insert(
      id,
      Transaction {
        id,
        amount: txn.amount,
        currency: txn.currency.clone(),
        last_four: txn.last_four.clone(),
        expiry_month: txn.expiry_month,
        expiry_year: txn.expiry_year,
        payment_intent: txn.payment_intent.clone(),
        payment_method: txn.payment_method.clone(),
        bank_return_code: txn.bank_return_code.clone(),
        status: txn.status,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn insert_order(&self, order: &NewOrder) -> AppResult<i64> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::InsertOrder)?;
    if !tables.widgets.contains_key(&order.widget_id)
      || !tables.transactions.contains_key(&order.transaction_id)
      || !tables.customers.contains_key(&order.customer_id)
    {
      return Err(AppError::Internal("order references a missing row".to_string()));
    }
    let now = Utc::now();
    let id = tables.next_id();
    tables.orders.insert(
      id,
      Order {
        id,
        widget_id: order.widget_id,
        transaction_id: order.transaction_id,
        customer_id: order.customer_id,
        status: order.status,
        quantity: order.quantity,
        amount: order.amount,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::UpdateOrderStatus)?;
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
    order.status = status;
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn update_transaction_status(&self, transaction_id: i64, status: TransactionStatus) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::UpdateTransactionStatus)?;
    let txn = tables
      .transactions
      .get_mut(&transaction_id)
      .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", transaction_id)))?;
    if !txn.status.can_advance_to(status) {
      return Err(AppError::Conflict(format!(
        "transaction {} cannot move from {:?} to {:?}",
        transaction_id, txn.status, status
      )));
    }
    txn.status = status;
    txn.updated_at = Utc::now();
    Ok(())
  }

  async fn get_widget(&self, id: i64) -> AppResult<Option<Widget>> {
    let tables = self.tables.lock();
    tables.check(StoreOp::GetWidget)?;
    Ok(tables.widgets.get(&id).cloned())
  }

  async fn get_order(&self, id: i64) -> AppResult<Option<OrderDetail>> {
    let tables = self.tables.lock();
    tables.check(StoreOp::GetOrder)?;
    match tables.orders.get(&id) {
      Some(order) => tables.detail(order).map(Some),
      None => Ok(None),
    }
  }

  async fn get_orders_paginated(&self, kind: OrderKind, page: PageRequest) -> AppResult<(Vec<OrderDetail>, i64)> {
    let tables = self.tables.lock();
    tables.check(StoreOp::GetOrders)?;

    let mut matching: Vec<&Order> = tables
      .orders
      .values()
      .filter(|o| {
        tables
          .widgets
          .get(&o.widget_id)
          .is_some_and(|w| w.is_recurring == kind.is_recurring())
      })
      .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let total = matching.len() as i64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.page_size).unwrap_or(0);
    let orders = matching
      .into_iter()
      .skip(offset)
      .take(limit)
      .map(|o| tables.detail(o))
      .collect::<AppResult<Vec<_>>>()?;
    Ok((orders, total))
  }

  async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
    let tables = self.tables.lock();
    tables.check(StoreOp::GetUserByEmail)?;
    Ok(tables.users.values().find(|u| u.email == email).cloned())
  }

  async fn insert_user(&self, first_name: &str, last_name: &str, email: &str, password_hash: &str) -> AppResult<i64> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::InsertUser)?;
    if tables.users.values().any(|u| u.email == email) {
      return Err(AppError::Conflict(format!("a user with email {} already exists", email)));
    }
    let now = Utc::now();
    let id = tables.next_id();
    tables.users.insert(
      id,
      User {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn insert_token(&self, user_id: i64, token_hash: &str, expiry: DateTime<Utc>, _scope: &str) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::InsertToken)?;
    tables.tokens.retain(|t| t.user_id != user_id);
    tables.tokens.push(StoredToken {
      user_id,
      hash: token_hash.to_string(),
      expiry,
    });
    Ok(())
  }

  async fn get_user_for_token(&self, token: &str) -> AppResult<Option<User>> {
    let tables = self.tables.lock();
    tables.check(StoreOp::GetUserForToken)?;
    let hash = token_hash(token);
    let now = Utc::now();
    let user = tables
      .tokens
      .iter()
      .find(|t| t.hash == hash && t.expiry > now)
      .and_then(|t| tables.users.get(&t.user_id))
      .cloned();
    Ok(user)
  }

  async fn update_password_for_user(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::UpdatePassword)?;
    let user = tables
      .users
      .get_mut(&user_id)
      .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;
    user.password_hash = password_hash.to_string();
    user.updated_at = Utc::now();
    Ok(())
  }

  async fn open_journal(&self, flow: &str, subject: &serde_json::Value) -> AppResult<i64> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::OpenJournal)?;
    let now = Utc::now();
    let id = tables.next_id();
    tables.journal.insert(
      id,
      JournalEntry {
        id,
        flow: flow.to_string(),
        subject: subject.clone(),
        state: JournalState::Open.as_str().to_string(),
        last_step: None,
        note: None,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn mark_journal_step(&self, id: i64, step: &str, subject: &serde_json::Value) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::MarkJournalStep)?;
    let entry = tables
      .journal
      .get_mut(&id)
      .ok_or_else(|| AppError::NotFound(format!("journal entry {} not found", id)))?;
    entry.last_step = Some(step.to_string());
    entry.subject = subject.clone();
    entry.updated_at = Utc::now();
    Ok(())
  }

  async fn close_journal(&self, id: i64, state: JournalState, note: Option<&str>) -> AppResult<()> {
    let mut tables = self.tables.lock();
    tables.check(StoreOp::CloseJournal)?;
    let entry = tables
      .journal
      .get_mut(&id)
      .ok_or_else(|| AppError::NotFound(format!("journal entry {} not found", id)))?;
    entry.state = state.as_str().to_string();
    if let Some(note) = note {
      entry.note = Some(note.to_string());
    }
    entry.updated_at = Utc::now();
    Ok(())
  }

  async fn list_journal(&self, states: &[JournalState]) -> AppResult<Vec<JournalEntry>> {
    let tables = self.tables.lock();
    tables.check(StoreOp::ListJournal)?;
    let wanted: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
    Ok(
      tables
        .journal
        .values()
        .filter(|e| wanted.contains(&e.state.as_str()))
        .cloned()
        .collect(),
    )
  }
}
