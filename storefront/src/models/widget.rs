// storefront/src/models/widget.rs

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Widget {
  pub id: i64,
  pub name: String,
  pub description: String,
  /// Minor currency units.
  pub price: i64,
  pub is_recurring: bool,
  /// Gateway plan for recurring widgets; empty otherwise.
  pub plan_id: String,
}
