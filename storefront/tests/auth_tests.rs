// tests/auth_tests.rs
#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use serde_json::{json, Value};
use storefront::models::TOKEN_LENGTH;
use storefront::services::memory_store::StoreOp;
use storefront::services::Store;

#[actix_web::test]
async fn test_signin_issues_a_token_that_authenticates() {
  let t = test_app();
  t.admin();
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/authenticate")
    .set_json(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"], false);
  assert_eq!(body["message"], format!("token for {} created", ADMIN_EMAIL));

  let token = body["content"]["authentication_token"]["token"]
    .as_str()
    .unwrap()
    .to_string();
  assert_eq!(token.len(), TOKEN_LENGTH);
  assert!(body["content"]["authentication_token"]["expiry"].is_string());
  assert!(body["content"]["authentication_token"].get("hash").is_none());

  let req = test::TestRequest::post()
    .uri("/api/is-authenticated")
    .insert_header(bearer(&token))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["error"], false);
  assert_eq!(body["message"], format!("authenticated user {}", ADMIN_EMAIL));
}

#[actix_web::test]
async fn test_signin_failures_are_indistinguishable() {
  let t = test_app();
  t.admin();
  let app = init_app!(t);

  let mut bodies = Vec::new();
  for payload in [
    json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }),
    json!({ "email": "nobody@example.com", "password": ADMIN_PASSWORD }),
  ] {
    let req = test::TestRequest::post()
      .uri("/api/authenticate")
      .set_json(payload)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    bodies.push(test::read_body(resp).await);
  }
  assert_eq!(bodies[0], bodies[1]);

  let body: Value = serde_json::from_slice(&bodies[0]).unwrap();
  assert_eq!(body["error"], true);
  assert_eq!(body["message"], "invalid authentication credentials");
  assert_eq!(body["content"], Value::Null);
}

#[actix_web::test]
async fn test_bearer_header_problems_all_get_the_same_401() {
  let t = test_app();
  let user = t.admin();
  let token = t.token_for(&user).await;
  let app = init_app!(t);

  let headers = [
    None,
    Some(format!("Basic {}", token)),
    Some("Bearer tooshort".to_string()),
    Some(format!("Bearer {}", "x".repeat(TOKEN_LENGTH))),
    Some(format!("Bearer {} trailing", token)),
  ];

  let mut bodies = Vec::new();
  for header in headers {
    let mut req = test::TestRequest::post().uri("/api/is-authenticated");
    if let Some(value) = header {
      req = req.insert_header(("Authorization", value));
    }
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    bodies.push(test::read_body(resp).await);
  }
  assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

#[actix_web::test]
async fn test_store_outage_during_token_lookup_is_unauthorized() {
  let t = test_app();
  let token = t.admin_token().await;
  t.store.fail_on(StoreOp::GetUserForToken);
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/is-authenticated")
    .insert_header(bearer(&token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_expired_token_is_rejected() {
  let t = test_app();
  let user = t.admin();
  let token = storefront::services::auth_service::generate_token(
    user.id,
    chrono::Duration::seconds(-1),
    storefront::models::SCOPE_AUTHENTICATION,
  );
  t.store
    .insert_token(user.id, &token.hash, token.expiry, &token.scope)
    .await
    .unwrap();
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/is-authenticated")
    .insert_header(bearer(&token.token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_new_signin_replaces_previous_token() {
  let t = test_app();
  let user = t.admin();
  let first = t.token_for(&user).await;
  let second = t.token_for(&user).await;
  let app = init_app!(t);

  let req = test::TestRequest::post()
    .uri("/api/is-authenticated")
    .insert_header(bearer(&first))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/is-authenticated")
    .insert_header(bearer(&second))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
