// storefront/src/errors.rs

use crate::services::gateway::{DeclineReason, GatewayError};
use crate::services::mailer::MailError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sagaflow::FlowError;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

pub const UNAUTHORIZED_MESSAGE: &str = "invalid authentication credentials";
pub const GENERIC_SERVER_MESSAGE: &str = "the server encountered a problem and could not process your request";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Bad Request: {0}")]
  BadRequest(String),

  /// The reason is logged at debug level and never sent to the client.
  #[error("Authentication Failed: {0}")]
  Unauthorized(String),

  #[error("Validation Failed: {0:?}")]
  Validation(BTreeMap<String, String>),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Card Declined: {}", .0.message())]
  CardDeclined(DeclineReason),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  /// Money moved at the gateway but local state could not be brought in line.
  #[error("Reconciliation Required in flow '{flow}' at step '{step}': {notice} ({detail})")]
  Reconciliation {
    notice: String,
    flow: String,
    step: String,
    compensated: bool,
    detail: String,
  },

  #[error("Invoice Render Error: {0}")]
  InvoiceRender(String),

  #[error("Invoice Delivery Error: {0}")]
  InvoiceDelivery(String),

  #[error("Mail Error: {0}")]
  Mail(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {0}")]
  Workflow(FlowError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn validation(field: &str, message: &str) -> Self {
    let mut errors = BTreeMap::new();
    errors.insert(field.to_string(), message.to_string());
    AppError::Validation(errors)
  }

  fn public_message(&self) -> String {
    match self {
      AppError::BadRequest(m) | AppError::NotFound(m) | AppError::Conflict(m) => m.clone(),
      AppError::Unauthorized(_) => UNAUTHORIZED_MESSAGE.to_string(),
      AppError::Validation(_) => "failed validation".to_string(),
      AppError::CardDeclined(reason) => reason.message().to_string(),
      AppError::Gateway(_) => "the payment processor could not complete the request".to_string(),
      AppError::Reconciliation { notice, .. } => notice.clone(),
      AppError::InvoiceRender(_) => "the invoice could not be generated".to_string(),
      AppError::InvoiceDelivery(_) => "the invoice could not be sent".to_string(),
      AppError::Mail(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow(_)
      | AppError::Internal(_) => GENERIC_SERVER_MESSAGE.to_string(),
    }
  }
}

impl From<FlowError> for AppError {
  fn from(err: FlowError) -> Self {
    match err {
      FlowError::PartialCommit {
        flow,
        step,
        compensated,
        notice,
        source,
        ..
      } => AppError::Reconciliation {
        notice,
        flow,
        step,
        compensated,
        detail: source.to_string(),
      },
      other => AppError::Workflow(other),
    }
  }
}

impl From<GatewayError> for AppError {
  fn from(err: GatewayError) -> Self {
    match err.decline_reason() {
      Some(reason) => AppError::CardDeclined(reason),
      None => AppError::Gateway(err.to_string()),
    }
  }
}

impl From<MailError> for AppError {
  fn from(err: MailError) -> Self {
    AppError::Mail(err.to_string())
  }
}

impl From<validator::ValidationErrors> for AppError {
  fn from(errs: validator::ValidationErrors) -> Self {
    let mut errors = BTreeMap::new();
    for (field, field_errors) in errs.field_errors() {
      if let Some(first) = field_errors.first() {
        let message = match &first.message {
          Some(m) => m.to_string(),
          None => format!("invalid value ({})", first.code),
        };
        errors.insert(field.to_string(), message);
      }
    }
    AppError::Validation(errors)
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(err) => AppError::Internal(err.to_string()),
      },
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::BadRequest(_) | AppError::CardDeclined(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Gateway(_) | AppError::InvoiceDelivery(_) => StatusCode::BAD_GATEWAY,
      AppError::Reconciliation { .. }
      | AppError::InvoiceRender(_)
      | AppError::Mail(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow(_)
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    match self {
      AppError::Unauthorized(reason) => {
        tracing::debug!(reason = %reason, "Rejecting unauthenticated request.");
      }
      AppError::Reconciliation {
        flow,
        step,
        compensated,
        detail,
        ..
      } => {
        tracing::error!(
          target: "reconciliation",
          flow = %flow,
          step = %step,
          compensated,
          detail = %detail,
          "Partial commit needs reconciliation."
        );
      }
      _ if status.is_server_error() => {
        tracing::error!(application_error = %self, "Responding with server error.");
      }
      _ => {
        tracing::info!(application_error = %self, status = status.as_u16(), "Responding with client error.");
      }
    }

    let body = match self {
      AppError::Validation(errors) => json!({
        "error": true,
        "message": self.public_message(),
        "errors": errors,
      }),
      AppError::Reconciliation {
        flow, step, compensated, ..
      } => json!({
        "error": true,
        "message": self.public_message(),
        "content": {
          "reconciliation_required": true,
          "flow": flow,
          "step": step,
          "compensated": compensated,
        },
      }),
      _ => json!({
        "error": true,
        "message": self.public_message(),
        "content": null,
      }),
    };

    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
