// tests/invoice_tests.rs
#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use serde_json::{json, Value};

fn invoice_body() -> Value {
  json!({
    "id": 100,
    "quantity": 1,
    "amount": 1000,
    "product": "Widget",
    "first_name": "Ada",
    "last_name": "Lovelace",
    "email": "ada@example.com",
    "created_at": "2026-03-14T09:00:00Z"
  })
}

#[actix_web::test]
async fn test_invoice_is_rendered_and_mailed() {
  let t = test_app();
  let token = t.admin_token().await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/invoice")
    .insert_header(bearer(&token))
    .set_json(invoice_body())
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "invoice 100.pdf created and sent to ada@example.com");

  let pdf_path = t.invoice_dir.path().join("100.pdf");
  let pdf = std::fs::read(&pdf_path).unwrap();
  assert!(pdf.starts_with(b"%PDF-"));
  let text = String::from_utf8_lossy(&pdf);
  assert!(text.contains("(10.00 eur)"));
  assert!(text.contains("(Attention: Ada Lovelace)"));
  assert!(text.contains("(2026-03-14)"));

  let sent = t.mailer.sent();
  assert_eq!(sent.len(), 1);
  let mail = &sent[0];
  assert_eq!(mail.from, "info@widgets.com");
  assert_eq!(mail.to, "ada@example.com");
  assert_eq!(mail.subject, "Your invoice");
  assert_eq!(mail.template, "invoice");
  assert_eq!(mail.attachments, vec![pdf_path]);
  assert!(mail.html.contains("Hello Ada"));
  assert!(mail.html.contains("10.00 eur"));
}

#[actix_web::test]
async fn test_invoice_currency_is_configurable() {
  let t = test_app_with(|cfg| cfg.invoice_currency = "usd".to_string());
  let token = t.admin_token().await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/invoice")
    .insert_header(bearer(&token))
    .set_json(invoice_body())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let pdf = std::fs::read(t.invoice_dir.path().join("100.pdf")).unwrap();
  assert!(String::from_utf8_lossy(&pdf).contains("(10.00 usd)"));
}

#[actix_web::test]
async fn test_mail_failure_is_a_delivery_error_and_keeps_the_pdf() {
  let t = test_app();
  let token = t.admin_token().await;
  t.mailer.fail_next();
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/admin/invoice")
    .insert_header(bearer(&token))
    .set_json(invoice_body())
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "the invoice could not be sent");

  assert!(t.invoice_dir.path().join("100.pdf").exists());
  assert!(t.mailer.sent().is_empty());
}

#[actix_web::test]
async fn test_invoice_payload_is_validated() {
  let t = test_app();
  let token = t.admin_token().await;
  let app = init_app!(t);

  let mut body = invoice_body();
  body["quantity"] = json!(0);
  body["email"] = json!("nope");
  let req = test::TestRequest::post()
    .uri("/api/admin/invoice")
    .insert_header(bearer(&token))
    .set_json(body)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["errors"]["quantity"], "must be at least 1");
  assert_eq!(body["errors"]["email"], "must be a valid email address");
  assert!(!t.invoice_dir.path().join("100.pdf").exists());
}
