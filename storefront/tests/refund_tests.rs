// tests/refund_tests.rs
#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use serde_json::{json, Value};
use storefront::models::{OrderStatus, TransactionStatus};
use storefront::pipelines::reconciliation::{self, SweepReport, RESOLVED_NOTE};
use storefront::services::gateway::GatewayError;
use storefront::services::memory_store::StoreOp;
use storefront::services::payment_mock::GatewayOp;

#[actix_web::test]
async fn test_refund_marks_order_and_transaction() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/refund")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": pi, "amount": 1000 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Charge refunded");

  let refunds = t.gateway.refunds();
  assert_eq!(refunds.len(), 1);
  assert_eq!(refunds[0].amount, 1000);
  assert_eq!(refunds[0].payment_intent.as_deref(), Some(pi.as_str()));

  let order = t.store.order(order_id).unwrap();
  assert_eq!(order.status, OrderStatus::Refunded);
  assert_eq!(
    t.store.transaction(order.transaction_id).unwrap().status,
    TransactionStatus::Refunded
  );
  assert_eq!(t.store.journal()[0].state, "completed");
}

#[actix_web::test]
async fn test_second_refund_conflicts_without_touching_the_gateway() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  for expected in [StatusCode::OK, StatusCode::CONFLICT] {
    let req = test::TestRequest::post()
      .uri("/api/admin/refund")
      .insert_header(bearer(&token))
      .set_json(json!({ "id": order_id, "pi": pi, "amount": 1000 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), expected);
    if expected == StatusCode::CONFLICT {
      let body: Value = test::read_body_json(resp).await;
      assert_eq!(body["message"], format!("order {} is already refunded", order_id));
    }
  }

  assert_eq!(t.gateway.refunds().len(), 1);
}

#[actix_web::test]
async fn test_refund_rejects_bad_requests_before_calling_the_gateway() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  let cases = [
    (json!({ "id": order_id, "pi": pi, "amount": 0 }), StatusCode::BAD_REQUEST),
    (json!({ "id": order_id, "pi": pi, "amount": 1001 }), StatusCode::BAD_REQUEST),
    (json!({ "id": order_id, "pi": "pi_other", "amount": 500 }), StatusCode::BAD_REQUEST),
    (json!({ "id": 424242, "pi": pi, "amount": 500 }), StatusCode::NOT_FOUND),
  ];
  for (payload, status) in cases {
    let req = test::TestRequest::post()
      .uri("/api/admin/refund")
      .insert_header(bearer(&token))
      .set_json(&payload)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), status, "payload {}", payload);
  }

  assert!(t.gateway.refunds().is_empty());
  assert_eq!(t.store.order(order_id).unwrap().status, OrderStatus::Purchased);
}

#[actix_web::test]
async fn test_refund_requires_authentication() {
  let t = test_app();
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/refund")
    .set_json(json!({ "id": order_id, "pi": pi, "amount": 1000 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(t.gateway.refunds().is_empty());
}

#[actix_web::test]
async fn test_gateway_refusal_leaves_order_purchased() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  t.gateway.fail_on(
    GatewayOp::Refund,
    GatewayError::Api {
      status: 400,
      code: Some("charge_already_refunded".to_string()),
      message: "already refunded".to_string(),
    },
  );
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/refund")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": pi, "amount": 1000 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  assert_eq!(t.store.order(order_id).unwrap().status, OrderStatus::Purchased);
  assert_eq!(t.store.journal()[0].state, "failed");
}

#[actix_web::test]
async fn test_status_failure_after_refund_is_reconciled_by_the_sweep() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  t.store.fail_on(StoreOp::UpdateOrderStatus);
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/refund")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": pi, "amount": 1000 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(
    body["message"],
    "the charge was refunded, but the database could not be updated"
  );
  assert_eq!(body["content"]["reconciliation_required"], true);
  assert_eq!(body["content"]["step"], "mark_order_refunded");
  assert_eq!(body["content"]["compensated"], false);

  assert_eq!(t.gateway.refunds().len(), 1);
  let entry = t.store.journal().remove(0);
  assert_eq!(entry.state, "needs_reconciliation");
  assert_eq!(entry.last_step.as_deref(), Some("issue_refund"));

  t.store.clear_failures();
  let report = reconciliation::sweep(t.store.as_ref(), chrono::Duration::minutes(15), chrono::Utc::now())
    .await
    .unwrap();
  assert_eq!(
    report,
    SweepReport {
      examined: 1,
      resolved: 1,
      needs_review: 0
    }
  );

  let order = t.store.order(order_id).unwrap();
  assert_eq!(order.status, OrderStatus::Refunded);
  assert_eq!(
    t.store.transaction(order.transaction_id).unwrap().status,
    TransactionStatus::Refunded
  );
  let entry = t.store.journal().remove(0);
  assert_eq!(entry.state, "completed");
  assert_eq!(entry.note.as_deref(), Some(RESOLVED_NOTE));
  // Still only the one refund at the gateway.
  assert_eq!(t.gateway.refunds().len(), 1);
}

#[actix_web::test]
async fn test_retry_after_partial_refund_waits_for_reconciliation() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  t.store.fail_on(StoreOp::UpdateOrderStatus);
  let app = init_app!(t);

  let refund = || {
    test::TestRequest::post()
      .uri("/api/admin/refund")
      .insert_header(bearer(&token))
      .set_json(json!({ "id": order_id, "pi": pi, "amount": 500 }))
      .to_request()
  };

  let resp = test::call_service(&app, refund()).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  t.store.clear_failures();

  let resp = test::call_service(&app, refund()).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(
    body["message"],
    format!("order {} has an unfinished refund awaiting reconciliation", order_id)
  );
  assert_eq!(t.gateway.refunds().len(), 1);
  assert_eq!(t.store.order(order_id).unwrap().status, OrderStatus::Purchased);

  // Once the sweep has finished the first refund the order reads as refunded.
  reconciliation::sweep(t.store.as_ref(), chrono::Duration::minutes(15), chrono::Utc::now())
    .await
    .unwrap();
  let resp = test::call_service(&app, refund()).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], format!("order {} is already refunded", order_id));
  assert_eq!(t.gateway.refunds().len(), 1);
}

#[actix_web::test]
async fn test_cancel_subscription_order() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  let (order_id, subscription_id) = t.seed_order(&widget, 2000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/cancel-subscription")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": subscription_id }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Subscription cancelled");

  assert_eq!(t.gateway.cancelled(), vec![subscription_id.clone()]);
  assert_eq!(t.store.order(order_id).unwrap().status, OrderStatus::Cancelled);

  let req = test::TestRequest::post()
    .uri("/api/admin/cancel-subscription")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": subscription_id }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(t.gateway.cancelled().len(), 1);
}

#[actix_web::test]
async fn test_cancel_rejects_one_off_sale() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/cancel-subscription")
    .insert_header(bearer(&token))
    .set_json(json!({ "id": order_id, "pi": pi }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(t.gateway.cancelled().is_empty());
}
