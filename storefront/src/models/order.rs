// storefront/src/models/order.rs

use super::{Customer, Transaction, TransactionStatus, Widget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Purchased = 1,
  Refunded = 2,
  Cancelled = 3,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Purchased => "purchased",
      OrderStatus::Refunded => "refunded",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "purchased" => Ok(OrderStatus::Purchased),
      "refunded" => Ok(OrderStatus::Refunded),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

/// Sales are orders for one-off widgets; subscriptions are orders for recurring ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
  Sale,
  Subscription,
}

impl OrderKind {
  pub fn is_recurring(self) -> bool {
    self == OrderKind::Subscription
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: i64,
  pub widget_id: i64,
  pub transaction_id: i64,
  pub customer_id: i64,
  pub status: OrderStatus,
  pub quantity: i32,
  pub amount: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub widget_id: i64,
  pub transaction_id: i64,
  pub customer_id: i64,
  pub status: OrderStatus,
  pub quantity: i32,
  pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetSummary {
  pub id: i64,
  pub name: String,
  pub is_recurring: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
  pub id: i64,
  pub amount: i64,
  pub currency: String,
  pub last_four: String,
  pub payment_intent: String,
  pub status: TransactionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
  pub id: i64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
}

/// An order joined with its widget, transaction and customer.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
  #[serde(flatten)]
  pub order: Order,
  pub widget: WidgetSummary,
  pub transaction: TransactionSummary,
  pub customer: CustomerSummary,
}

impl OrderDetail {
  pub fn assemble(order: Order, widget: &Widget, txn: &Transaction, customer: &Customer) -> Self {
    Self {
      order,
      widget: WidgetSummary {
        id: widget.id,
        name: widget.name.clone(),
        is_recurring: widget.is_recurring,
      },
      transaction: TransactionSummary {
        id: txn.id,
        amount: txn.amount,
        currency: txn.currency.clone(),
        last_four: txn.last_four.clone(),
        payment_intent: txn.payment_intent.clone(),
        status: txn.status,
      },
      customer: CustomerSummary {
        id: customer.id,
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
      },
    }
  }
}
