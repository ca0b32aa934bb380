// storefront/src/pipelines/reconciliation.rs

//! Sweep over unfinished journal entries.
//!
//! Refunds and cancellations whose gateway call committed can be finished
//! locally by re-applying the status updates; everything else is left for
//! manual review.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{JournalEntry, OrderStatus, TransactionStatus};
use crate::pipelines::{cancellation_pipeline, refund_pipeline, subscription_pipeline};
use crate::services::Store;
use chrono::{DateTime, Duration, Utc};
use sagaflow::JournalState;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

pub const RESOLVED_NOTE: &str = "reconciled by sweep";

/// States the sweep looks at, and that the admin listing shows.
pub const UNRESOLVED_STATES: [JournalState; 3] = [
  JournalState::Open,
  JournalState::NeedsReconciliation,
  JournalState::Compensated,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  pub examined: usize,
  pub resolved: usize,
  pub needs_review: usize,
}

enum Verdict {
  /// Still running, or not yet stale.
  InFlight,
  Resolved,
  NeedsReview,
}

/// One pass over the journal. Open entries untouched for `stale` are
/// treated as orphaned by a crashed process.
#[instrument(name = "reconciliation::sweep", skip(store), err(Display))]
pub async fn sweep(store: &dyn Store, stale: Duration, now: DateTime<Utc>) -> AppResult<SweepReport> {
  let entries = store.list_journal(&UNRESOLVED_STATES).await?;
  let mut report = SweepReport::default();

  for entry in entries {
    report.examined += 1;
    match examine(store, &entry, stale, now).await {
      Ok(Verdict::InFlight) => {}
      Ok(Verdict::Resolved) => report.resolved += 1,
      Ok(Verdict::NeedsReview) => report.needs_review += 1,
      Err(e) => {
        error!(journal_id = entry.id, flow = %entry.flow, error = %e, "Journal entry could not be reconciled.");
        report.needs_review += 1;
      }
    }
  }

  info!(
    examined = report.examined,
    resolved = report.resolved,
    needs_review = report.needs_review,
    "Reconciliation sweep finished."
  );
  Ok(report)
}

async fn examine(store: &dyn Store, entry: &JournalEntry, stale: Duration, now: DateTime<Utc>) -> AppResult<Verdict> {
  let state = entry
    .journal_state()
    .ok_or_else(|| AppError::Internal(format!("journal entry {} has unknown state '{}'", entry.id, entry.state)))?;

  if state == JournalState::Open {
    if now - entry.updated_at < stale {
      return Ok(Verdict::InFlight);
    }
    warn!(journal_id = entry.id, flow = %entry.flow, "Open journal entry is orphaned.");
    let note = format!("orphaned: no progress since {}", entry.updated_at.to_rfc3339());
    store
      .close_journal(entry.id, JournalState::NeedsReconciliation, Some(&note))
      .await?;
  }

  let settlement_step = match entry.flow.as_str() {
    refund_pipeline::FLOW_NAME => refund_pipeline::SETTLEMENT_STEP,
    cancellation_pipeline::FLOW_NAME => cancellation_pipeline::SETTLEMENT_STEP,
    subscription_pipeline::FLOW_NAME => {
      warn!(
        journal_id = entry.id,
        state = %state,
        subject = %entry.subject,
        "Subscription signup needs manual review."
      );
      return Ok(Verdict::NeedsReview);
    }
    other => {
      warn!(journal_id = entry.id, flow = other, "No reconciliation rule for flow.");
      return Ok(Verdict::NeedsReview);
    }
  };

  if entry.last_step.as_deref() != Some(settlement_step) {
    warn!(journal_id = entry.id, flow = %entry.flow, "Settlement not recorded; outcome at the gateway is unknown.");
    return Ok(Verdict::NeedsReview);
  }

  let (Some(order_id), Some(target)) = (entry.subject_i64("order_id"), entry.subject_str("target_status")) else {
    warn!(journal_id = entry.id, subject = %entry.subject, "Journal subject lacks order_id or target_status.");
    return Ok(Verdict::NeedsReview);
  };

  reapply(store, entry, order_id, target).await?;
  store
    .close_journal(entry.id, JournalState::Completed, Some(RESOLVED_NOTE))
    .await?;
  info!(journal_id = entry.id, order_id, target_status = target, "Journal entry reconciled.");
  Ok(Verdict::Resolved)
}

async fn reapply(store: &dyn Store, entry: &JournalEntry, order_id: i64, target: &str) -> AppResult<()> {
  let status: OrderStatus = target.parse().map_err(AppError::Internal)?;
  store.update_order_status(order_id, status).await?;

  if status == OrderStatus::Refunded {
    if let Some(transaction_id) = entry.subject_i64("transaction_id") {
      store
        .update_transaction_status(transaction_id, TransactionStatus::Refunded)
        .await?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::memory_store::MemoryStore;
  use serde_json::json;

  #[tokio::test]
  async fn fresh_open_entries_are_left_alone() {
    let store = MemoryStore::new();
    store
      .open_journal(refund_pipeline::FLOW_NAME, &json!({ "order_id": 1 }))
      .await
      .unwrap();

    let report = sweep(&store, Duration::minutes(15), Utc::now()).await.unwrap();
    assert_eq!(report, SweepReport { examined: 1, resolved: 0, needs_review: 0 });
    assert_eq!(store.journal()[0].state, "open");
  }

  #[tokio::test]
  async fn stale_entry_without_settlement_needs_review() {
    let store = MemoryStore::new();
    let id = store
      .open_journal(cancellation_pipeline::FLOW_NAME, &json!({ "order_id": 1, "target_status": "cancelled" }))
      .await
      .unwrap();
    store.age_journal_entry(id, Duration::hours(2));

    let report = sweep(&store, Duration::minutes(15), Utc::now()).await.unwrap();
    assert_eq!(report.needs_review, 1);
    let entry = &store.journal()[0];
    assert_eq!(entry.state, "needs_reconciliation");
    assert!(entry.note.as_deref().unwrap_or_default().starts_with("orphaned"));
  }
}
