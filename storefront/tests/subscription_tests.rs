// tests/subscription_tests.rs
#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use serde_json::{json, Value};
use storefront::models::TransactionStatus;
use storefront::services::gateway::GatewayError;
use storefront::services::memory_store::StoreOp;
use storefront::services::payment_mock::GatewayOp;

fn signup_body(product_id: i64) -> Value {
  json!({
    "payment_method": "pm_card_visa",
    "email": "grace@example.com",
    "first_name": "Grace",
    "last_name": "Hopper",
    "card_brand": "visa",
    "exp_month": 12,
    "exp_year": 2030,
    "last_four": "4242",
    "plan": "",
    "product_id": product_id.to_string(),
  })
}

#[actix_web::test]
async fn test_signup_creates_remote_subscription_and_local_rows() {
  let t = test_app();
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(signup_body(widget.id))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Transaction successful");

  let subs = t.gateway.subscriptions();
  assert_eq!(subs.len(), 1);
  assert_eq!(subs[0].plan, "price_bronze");
  assert_eq!(subs[0].metadata.last_four, "4242");
  assert_eq!(subs[0].metadata.card_type, "visa");
  assert_eq!(body["content"]["subscription_id"], subs[0].subscription.id.as_str());

  let customers = t.store.customers();
  assert_eq!(customers.len(), 1);
  assert_eq!(customers[0].email, "grace@example.com");

  let txns = t.store.transactions();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].amount, 2000);
  assert_eq!(txns[0].currency, "eur");
  assert_eq!(txns[0].payment_intent, subs[0].subscription.id);
  assert_eq!(txns[0].status, TransactionStatus::Cleared);

  let orders = t.store.orders();
  assert_eq!(orders.len(), 1);
  assert_eq!(body["content"]["order_id"], orders[0].id);
  assert_eq!(orders[0].widget_id, widget.id);

  let journal = t.store.journal();
  assert_eq!(journal.len(), 1);
  assert_eq!(journal[0].flow, "subscription_signup");
  assert_eq!(journal[0].state, "completed");
  assert!(t.gateway.cancelled().is_empty());
}

#[actix_web::test]
async fn test_signup_rejects_one_off_widget() {
  let t = test_app();
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(signup_body(widget.id))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(t.gateway.customers().is_empty());
  assert!(t.gateway.subscriptions().is_empty());
}

#[actix_web::test]
async fn test_signup_validates_payload() {
  let t = test_app();
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  let app = init_app!(t);

  let mut body = signup_body(widget.id);
  body["email"] = json!("not-an-email");
  body["last_four"] = json!("42");
  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(body)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"], true);
  assert_eq!(body["message"], "failed validation");
  assert_eq!(body["errors"]["email"], "must be a valid email address");
  assert_eq!(body["errors"]["last_four"], "must be the last four card digits");
}

#[actix_web::test]
async fn test_declined_subscription_records_nothing() {
  let t = test_app();
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  t.gateway.fail_on(
    GatewayOp::CreateSubscription,
    GatewayError::Card {
      code: "card_declined".to_string(),
      decline_code: Some("insufficient_funds".to_string()),
      message: "Your card was declined.".to_string(),
    },
  );
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(signup_body(widget.id))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Your card was declined");

  assert!(t.store.customers().is_empty());
  assert!(t.store.orders().is_empty());
  let journal = t.store.journal();
  assert_eq!(journal[0].state, "failed");
}

#[actix_web::test]
async fn test_persistence_failure_after_subscribing_cancels_and_reports_reconciliation() {
  let t = test_app();
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  t.store.fail_on(StoreOp::InsertOrder);
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(signup_body(widget.id))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"], true);
  assert_eq!(
    body["message"],
    "the subscription was created, but the order could not be recorded"
  );
  assert_eq!(body["content"]["reconciliation_required"], true);
  assert_eq!(body["content"]["flow"], "subscription_signup");
  assert_eq!(body["content"]["step"], "persist_order");
  assert_eq!(body["content"]["compensated"], true);

  // The subscription exists remotely but was cancelled at period end.
  let subs = t.gateway.subscriptions();
  assert_eq!(subs.len(), 1);
  assert!(subs[0].subscription.cancel_at_period_end);
  assert_eq!(t.gateway.cancelled(), vec![subs[0].subscription.id.clone()]);

  let journal = t.store.journal();
  assert_eq!(journal.len(), 1);
  assert_eq!(journal[0].state, "compensated");
  assert_eq!(journal[0].last_step.as_deref(), Some("create_remote_subscription"));
  assert_eq!(journal[0].subject_str("subscription_id"), Some(subs[0].subscription.id.as_str()));
}

#[actix_web::test]
async fn test_failed_compensation_leaves_entry_for_reconciliation() {
  let t = test_app();
  let widget = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  t.store.fail_on(StoreOp::InsertCustomer);
  t.gateway.fail_on(
    GatewayOp::CancelSubscription,
    GatewayError::Transport("timed out".to_string()),
  );
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/create-customer-and-subscribe-to-plan")
    .set_json(signup_body(widget.id))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["content"]["compensated"], false);

  assert_eq!(t.store.journal()[0].state, "needs_reconciliation");
}
