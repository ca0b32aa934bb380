// storefront/src/web/response.rs

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

/// The envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
  pub error: bool,
  pub message: String,
  pub content: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
  pub fn ok(message: impl Into<String>, content: T) -> Self {
    Self {
      error: false,
      message: message.into(),
      content: Some(content),
    }
  }

  pub fn into_response(self, status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).json(self)
  }
}

/// 200 with a message and no content.
pub fn ok_message(message: impl Into<String>) -> HttpResponse {
  ApiResponse::<()> {
    error: false,
    message: message.into(),
    content: None,
  }
  .into_response(StatusCode::OK)
}

/// 200 with a message and content.
pub fn ok_content<T: Serialize>(message: impl Into<String>, content: T) -> HttpResponse {
  ApiResponse::ok(message, content).into_response(StatusCode::OK)
}
