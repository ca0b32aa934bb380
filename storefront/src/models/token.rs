// storefront/src/models/token.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SCOPE_AUTHENTICATION: &str = "authentication";
pub const TOKEN_LENGTH: usize = 26;

/// An issued bearer token. Only `hash` is persisted; `token` exists in memory
/// until it is returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
  pub token: String,
  #[serde(skip_serializing)]
  pub hash: String,
  #[serde(skip_serializing)]
  pub user_id: i64,
  pub expiry: DateTime<Utc>,
  #[serde(skip_serializing)]
  pub scope: String,
}
