// tests/admin_orders_tests.rs
#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use serde_json::{json, Value};

#[actix_web::test]
async fn test_all_sales_pages_newest_first() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let plan = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  let mut sale_ids = Vec::new();
  for i in 0..25 {
    let (id, _) = t.seed_order(&widget, 1000 + i).await;
    sale_ids.push(id);
  }
  t.seed_order(&plan, 2000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/all-sales")
    .insert_header(bearer(&token))
    .set_json(json!({ "page": 2, "page_size": 10 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body: Value = test::read_body_json(resp).await;
  let content = &body["content"];
  assert_eq!(content["current_page"], 2);
  assert_eq!(content["page_size"], 10);
  assert_eq!(content["last_page"], 3);
  assert_eq!(content["total_records"], 25);

  let orders = content["orders"].as_array().unwrap();
  assert_eq!(orders.len(), 10);
  assert!(orders.iter().all(|o| o["widget"]["is_recurring"] == false));
  // Newest first: the second page starts at the 11th most recent sale.
  sale_ids.reverse();
  let page_ids: Vec<i64> = orders.iter().map(|o| o["id"].as_i64().unwrap()).collect();
  assert_eq!(page_ids, sale_ids[10..20].to_vec());
}

#[actix_web::test]
async fn test_all_subscriptions_only_lists_recurring_orders() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let plan = t.store.add_widget("Bronze Plan", 2000, true, "price_bronze");
  t.seed_order(&widget, 1000).await;
  let (sub_order, sub_id) = t.seed_order(&plan, 2000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/all-subscriptions")
    .insert_header(bearer(&token))
    .set_json(json!({ "page": 1, "page_size": 10 }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  let orders = body["content"]["orders"].as_array().unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0]["id"], sub_order);
  assert_eq!(orders[0]["transaction"]["payment_intent"], sub_id.as_str());
  assert_eq!(orders[0]["customer"]["email"], "ada@example.com");
  assert_eq!(orders[0]["status"], "purchased");
}

#[actix_web::test]
async fn test_empty_listing_has_one_page() {
  let t = test_app();
  let token = t.admin_token().await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/all-sales")
    .insert_header(bearer(&token))
    .set_json(json!({ "page": 1, "page_size": 10 }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["content"]["last_page"], 1);
  assert_eq!(body["content"]["total_records"], 0);
  assert_eq!(body["content"]["orders"], json!([]));
}

#[actix_web::test]
async fn test_page_request_is_validated() {
  let t = test_app();
  let token = t.admin_token().await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/all-sales")
    .insert_header(bearer(&token))
    .set_json(json!({ "page": 0, "page_size": 500 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["errors"]["page"], "page must be at least 1");
  assert_eq!(body["errors"]["page_size"], "page_size must be between 1 and 100");
}

#[actix_web::test]
async fn test_get_sale_returns_joined_order() {
  let t = test_app();
  let token = t.admin_token().await;
  let widget = t.store.add_widget("Widget", 1000, false, "");
  let (order_id, pi) = t.seed_order(&widget, 1000).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri(&format!("/api/admin/get-sale/{}", order_id))
    .insert_header(bearer(&token))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["content"]["id"], order_id);
  assert_eq!(body["content"]["widget"]["name"], "Widget");
  assert_eq!(body["content"]["transaction"]["payment_intent"], pi.as_str());
  assert_eq!(body["content"]["transaction"]["last_four"], "4242");

  let req = test::TestRequest::post()
    .uri("/api/admin/get-sale/999999")
    .insert_header(bearer(&token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_admin_listing_requires_authentication() {
  let t = test_app();
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/all-sales")
    .set_json(json!({ "page": 1, "page_size": 10 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
