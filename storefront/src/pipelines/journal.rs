// storefront/src/pipelines/journal.rs

//! Persists flow journal entries through the [`Store`].

use crate::errors::{AppError, Result as AppResult};
use crate::services::Store;
use async_trait::async_trait;
use sagaflow::{Journal, JournalId, JournalState};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub struct StoreJournal {
  store: Arc<dyn Store>,
}

impl StoreJournal {
  pub fn new(store: Arc<dyn Store>) -> Arc<Self> {
    Arc::new(Self { store })
  }
}

/// Subjects are JSON objects; anything else is kept as a plain description.
fn subject_value(subject: &str) -> Value {
  serde_json::from_str::<Value>(subject)
    .ok()
    .filter(Value::is_object)
    .unwrap_or_else(|| serde_json::json!({ "description": subject }))
}

#[async_trait]
impl Journal for StoreJournal {
  async fn begin(&self, flow: &str, subject: &str) -> anyhow::Result<JournalId> {
    Ok(self.store.open_journal(flow, &subject_value(subject)).await?)
  }

  async fn step_committed(&self, id: JournalId, step: &str, subject: &str) -> anyhow::Result<()> {
    Ok(self.store.mark_journal_step(id, step, &subject_value(subject)).await?)
  }

  async fn finish(&self, id: JournalId, state: JournalState, note: Option<String>) -> anyhow::Result<()> {
    Ok(self.store.close_journal(id, state, note.as_deref()).await?)
  }
}

/// Rejects a new run of `flow` for `order_id` while an earlier one is still
/// open or waiting on the reconciliation sweep.
pub async fn ensure_no_unfinished_run(store: &dyn Store, flow: &str, order_id: i64) -> AppResult<()> {
  let unfinished = store
    .list_journal(&[JournalState::Open, JournalState::NeedsReconciliation])
    .await?;
  let Some(entry) = unfinished
    .iter()
    .find(|e| e.flow == flow && e.subject_i64("order_id") == Some(order_id))
  else {
    return Ok(());
  };

  warn!(journal_id = entry.id, flow, order_id, state = %entry.state, "Earlier run is unfinished; refusing to repeat it.");
  Err(AppError::Conflict(format!(
    "order {} has an unfinished {} awaiting reconciliation",
    order_id, flow
  )))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::memory_store::MemoryStore;
  use serde_json::json;

  #[tokio::test]
  async fn only_unfinished_runs_of_the_same_flow_and_order_block() {
    let store = MemoryStore::new();
    let done = store.open_journal("refund", &json!({ "order_id": 7 })).await.unwrap();
    store.close_journal(done, JournalState::Completed, None).await.unwrap();
    store.open_journal("subscription_cancellation", &json!({ "order_id": 7 })).await.unwrap();
    let other = store.open_journal("refund", &json!({ "order_id": 8 })).await.unwrap();
    store
      .close_journal(other, JournalState::NeedsReconciliation, None)
      .await
      .unwrap();

    assert!(ensure_no_unfinished_run(&store, "refund", 7).await.is_ok());
    assert!(matches!(
      ensure_no_unfinished_run(&store, "refund", 8).await,
      Err(AppError::Conflict(_))
    ));
    assert!(matches!(
      ensure_no_unfinished_run(&store, "subscription_cancellation", 7).await,
      Err(AppError::Conflict(_))
    ));
  }

  #[test]
  fn non_object_subjects_are_wrapped() {
    assert_eq!(subject_value(r#"{"order_id":4}"#)["order_id"], 4);
    assert_eq!(subject_value("charge=-")["description"], "charge=-");
    assert_eq!(subject_value("[1,2]")["description"], "[1,2]");
  }
}
