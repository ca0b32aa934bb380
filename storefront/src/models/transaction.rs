// storefront/src/models/transaction.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};

/// Stored as the integer code in `transactions.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  Pending = 1,
  Cleared = 2,
  Refunded = 3,
  Declined = 4,
}

impl TransactionStatus {
  /// Status moves only forward. Re-applying the current status is allowed so
  /// repeated reconciliation stays idempotent.
  pub fn can_advance_to(self, next: TransactionStatus) -> bool {
    use TransactionStatus::*;
    self == next || matches!((self, next), (Pending, Cleared) | (Pending, Declined) | (Cleared, Refunded))
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
  pub id: i64,
  pub amount: i64,
  pub currency: String,
  pub last_four: String,
  pub expiry_month: i32,
  pub expiry_year: i32,
  pub payment_intent: String,
  pub payment_method: String,
  pub bank_return_code: String,
  pub status: TransactionStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
  pub amount: i64,
  pub currency: String,
  pub last_four: String,
  pub expiry_month: i32,
  pub expiry_year: i32,
  pub payment_intent: String,
  pub payment_method: String,
  pub bank_return_code: String,
  pub status: TransactionStatus,
}
