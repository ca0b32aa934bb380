// storefront/src/pipelines/password_reset_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{PasswordResetCtxData, ResetRequestCtxData};
use crate::services::auth_service;
use crate::services::mailer::OutgoingMail;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use serde_json::json;
use tracing::{event, instrument, Level};

pub const RESET_SUBJECT: &str = "Password Reset Request";
pub const RESET_TEMPLATE: &str = "password-reset";

/// Registers both halves of password reset: mailing a link, and redeeming it.
pub fn register_password_reset_pipelines(flows: &Flows<AppError>) {
  register_reset_request(flows);
  register_password_reset(flows);
}

fn register_reset_request(flows: &Flows<AppError>) {
  let mut flow = Flow::<ResetRequestCtxData, AppError>::new(
    "password_reset_request",
    &[
      ("find_user", Effect::None, None),
      ("send_reset_link", Effect::Remote, None),
    ],
  );

  flow.on_step("find_user", |ctx_data: ContextData<ResetRequestCtxData>| async move {
    let (store, email) = ctx_data.with_read(|d| (d.app.store.clone(), d.email.trim().to_string()));
    let found = store.get_user_by_email(&email).await?.is_some();
    ctx_data.write().user_found = found;
    if !found {
      event!(Level::INFO, "Password reset requested for an unknown email.");
      return Ok(Control::Stop);
    }
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("send_reset_link", |ctx_data| Box::pin(send_reset_link(ctx_data)));

  flows.register(flow);
}

#[instrument(name = "password_reset::send_reset_link", skip_all, err(Display))]
async fn send_reset_link(ctx_data: ContextData<ResetRequestCtxData>) -> AppResult<Control> {
  let (app, email) = ctx_data.with_read(|d| (d.app.clone(), d.email.trim().to_string()));

  let token = app
    .reset_tokens
    .seal(&email, chrono::Utc::now())
    .map_err(|e| AppError::Internal(format!("reset token could not be sealed: {}", e)))?;
  let link = format!(
    "{}/reset-password?token={}",
    app.config.frontend_url.trim_end_matches('/'),
    token
  );

  app
    .mailer
    .send(OutgoingMail {
      from: app.config.mail_from.clone(),
      to: email,
      subject: RESET_SUBJECT.to_string(),
      template: RESET_TEMPLATE.to_string(),
      data: json!({ "link": link }),
      attachments: Vec::new(),
    })
    .await?;

  event!(Level::INFO, "Password reset link sent.");
  Ok(Control::Continue)
}

fn register_password_reset(flows: &Flows<AppError>) {
  let mut flow = Flow::<PasswordResetCtxData, AppError>::new(
    "password_reset",
    &[
      ("open_token", Effect::None, None),
      ("find_user", Effect::None, None),
      ("store_password", Effect::Local, None),
    ],
  );

  flow.on_step("open_token", |ctx_data: ContextData<PasswordResetCtxData>| async move {
    let (reset_tokens, token) = ctx_data.with_read(|d| (d.app.reset_tokens.clone(), d.token.clone()));
    let email = reset_tokens.open(&token, chrono::Utc::now()).map_err(|e| {
      event!(Level::DEBUG, reason = %e, "Reset token rejected.");
      AppError::BadRequest("invalid or expired reset link".to_string())
    })?;
    ctx_data.write().email = Some(email);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("find_user", |ctx_data: ContextData<PasswordResetCtxData>| async move {
    let (store, email) = ctx_data.with_read(|d| (d.app.store.clone(), d.email.clone().unwrap_or_default()));
    let user = store
      .get_user_by_email(&email)
      .await?
      .ok_or_else(|| AppError::BadRequest("invalid or expired reset link".to_string()))?;
    ctx_data.write().user_id = Some(user.id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("store_password", |ctx_data: ContextData<PasswordResetCtxData>| async move {
    let (store, user_id, password) = ctx_data.with_read(|d| (d.app.store.clone(), d.user_id, d.password.clone()));
    let user_id = user_id.ok_or_else(|| AppError::Internal("password reset lost its user".to_string()))?;

    let hash = tokio::task::spawn_blocking(move || auth_service::hash_password(&password))
      .await
      .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))??;
    store.update_password_for_user(user_id, &hash).await?;

    event!(Level::INFO, user_id, "Password changed.");
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
}
