// storefront/src/models/journal_entry.rs

use chrono::{DateTime, Utc};
use sagaflow::JournalState;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JournalEntry {
  pub id: i64,
  pub flow: String,
  pub subject: serde_json::Value,
  pub state: String,
  pub last_step: Option<String>,
  pub note: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
  pub fn journal_state(&self) -> Option<JournalState> {
    self.state.parse().ok()
  }

  pub fn subject_i64(&self, key: &str) -> Option<i64> {
    self.subject.get(key).and_then(|v| v.as_i64())
  }

  pub fn subject_str(&self, key: &str) -> Option<&str> {
    self.subject.get(key).and_then(|v| v.as_str())
  }
}
