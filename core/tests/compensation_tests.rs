// tests/compensation_tests.rs
mod common;

use common::*;
use sagaflow::{ContextData, Effect, Flow, FlowError};
use serial_test::serial;

fn settle_then_persist() -> Flow<TestContext, TestError> {
  let mut flow = Flow::<TestContext, TestError>::new(
    "settle_then_persist",
    &[
      ("validate", Effect::None, None),
      ("create_customer", Effect::Remote, None),
      ("charge", Effect::Settlement, None),
      ("persist", Effect::Local, None),
    ],
  );
  flow.reconciliation_notice("the charge went through, but the order could not be recorded");
  flow.on_step("validate", create_simple_handler("validate", "v"));
  flow.on_step("create_customer", create_simple_handler("create_customer", "c"));
  flow.on_step("charge", create_simple_handler("charge", "$"));
  flow
}

#[tokio::test]
#[serial]
async fn test_failure_after_settlement_becomes_partial_commit() {
  setup_tracing();
  let mut flow = settle_then_persist();
  flow.on_step("persist", create_failing_handler("persist", "database down"));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  let (step, committed, compensated) = err.partial_commit().expect("partial commit");
  assert_eq!(step, "persist");
  assert_eq!(committed, ["create_customer".to_string(), "charge".to_string()]);
  assert!(!compensated, "no compensation was registered for the settlement");

  match &err {
    TestError::Flow(FlowError::PartialCommit { notice, source, .. }) => {
      assert_eq!(notice, "the charge went through, but the order could not be recorded");
      assert!(source.to_string().contains("database down"));
    }
    other => panic!("unexpected {:?}", other),
  }
  assert!(matches!(&err, TestError::Flow(fe) if fe.needs_reconciliation()));
}

#[tokio::test]
#[serial]
async fn test_failure_before_settlement_is_not_partial_commit() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "remote_then_settle",
    &[
      ("create_customer", Effect::Remote, None),
      ("charge", Effect::Settlement, None),
      ("persist", Effect::Local, None),
    ],
  );
  flow.on_step("create_customer", create_simple_handler("create_customer", "c"));
  flow.on_step("charge", create_failing_handler("charge", "card declined"));
  flow.on_step("persist", create_simple_handler("persist", "p"));

  let err = flow.run(ContextData::new(TestContext::default())).await.unwrap_err();
  assert!(err.partial_commit().is_none());
  assert!(matches!(err, TestError::Handler(ref m) if m == "card declined"));
}

#[tokio::test]
#[serial]
async fn test_compensations_run_in_reverse_order() {
  setup_tracing();
  let mut flow = settle_then_persist();
  flow.on_step("persist", create_failing_handler("persist", "constraint violation"));
  flow.compensate_step("create_customer", create_compensation("create_customer", false));
  flow.compensate_step("charge", create_compensation("charge", false));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(ctx.read().compensations_run, vec!["charge", "create_customer"]);
  let (_, _, compensated) = err.partial_commit().expect("partial commit");
  assert!(compensated);
}

#[tokio::test]
#[serial]
async fn test_failed_compensation_marks_flow_uncompensated() {
  setup_tracing();
  let mut flow = settle_then_persist();
  flow.on_step("persist", create_failing_handler("persist", "disk full"));
  flow.compensate_step("charge", create_compensation("charge", true));
  flow.compensate_step("create_customer", create_compensation("create_customer", false));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  // A failing compensation does not prevent earlier ones from running.
  assert_eq!(ctx.read().compensations_run, vec!["charge", "create_customer"]);
  let (_, _, compensated) = err.partial_commit().expect("partial commit");
  assert!(!compensated);
}

#[tokio::test]
#[serial]
async fn test_failed_step_itself_is_not_compensated() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "single_settlement",
    &[("charge", Effect::Settlement, None)],
  );
  flow.on_step("charge", create_failing_handler("charge", "gateway timeout"));
  flow.compensate_step("charge", create_compensation("charge", false));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert!(ctx.read().compensations_run.is_empty());
  assert!(err.partial_commit().is_none());
}
