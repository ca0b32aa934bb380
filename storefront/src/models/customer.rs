// storefront/src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per checkout; customers are not deduplicated by email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
  pub id: i64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
}
