// storefront/src/web/handlers/auth_handlers.rs

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use validator::Validate;

use super::run_to_completion;
use crate::errors::AppError;
use crate::pipelines::contexts::{PasswordResetCtxData, ResetRequestCtxData, SigninCtxData};
use crate::state::AppState;
use crate::web::extract::{AuthenticatedUser, JsonPayload};
use crate::web::response::{ok_content, ok_message, ApiResponse};
use sagaflow::{ContextData, Outcome};

pub const NO_MATCHING_EMAIL: &str = "no matching email found on our system";

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct SigninPayload {
  pub email: String,
  pub password: String,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ForgotPasswordPayload {
  #[validate(email(message = "must be a valid email address"))]
  pub email: String,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ResetPasswordPayload {
  #[serde(alias = "encrypted_email")]
  pub token: String,
  #[validate(length(min = 6, message = "must be at least 6 characters"))]
  pub password: String,
}

// --- Handler Implementations ---

#[instrument(name = "handler::authenticate", skip(app_state, payload))]
pub async fn authenticate_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<SigninPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let email = payload.email.clone();

  let ctx = ContextData::new(SigninCtxData {
    app: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    user: None,
    token: None,
  });
  run_to_completion(&app_state, ctx.clone()).await?;

  let token = ctx
    .read()
    .token
    .clone()
    .ok_or_else(|| AppError::Internal("signin completed without a token".to_string()))?;
  Ok(ok_content(
    format!("token for {} created", email),
    json!({ "authentication_token": token }),
  ))
}

#[instrument(name = "handler::is_authenticated", skip_all, fields(user_id = user.0.id))]
pub async fn is_authenticated_handler(user: AuthenticatedUser) -> HttpResponse {
  ok_message(format!("authenticated user {}", user.0.email))
}

#[instrument(name = "handler::forgot_password", skip_all)]
pub async fn forgot_password_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<ForgotPasswordPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;

  let ctx = ContextData::new(ResetRequestCtxData {
    app: app_state.get_ref().clone(),
    email: payload.into_inner().email,
    user_found: false,
  });

  match app_state.flows.run(ctx.clone()).await? {
    Outcome::Completed => Ok(ok_message("Email sent")),
    Outcome::Stopped if !ctx.read().user_found => Ok(
      ApiResponse::<()> {
        error: true,
        message: NO_MATCHING_EMAIL.to_string(),
        content: None,
      }
      .into_response(StatusCode::ACCEPTED),
    ),
    Outcome::Stopped => Err(AppError::Internal("password reset request halted".to_string())),
  }
}

#[instrument(name = "handler::reset_password", skip_all)]
pub async fn reset_password_handler(
  app_state: web::Data<AppState>,
  payload: JsonPayload<ResetPasswordPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let payload = payload.into_inner();

  let ctx = ContextData::new(PasswordResetCtxData {
    app: app_state.get_ref().clone(),
    token: payload.token,
    password: payload.password,
    email: None,
    user_id: None,
  });
  run_to_completion(&app_state, ctx.clone()).await?;

  info!(user_id = ?ctx.read().user_id, "Password reset completed.");
  Ok(ok_message("password changed"))
}
