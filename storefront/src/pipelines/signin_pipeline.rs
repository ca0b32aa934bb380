// storefront/src/pipelines/signin_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::SCOPE_AUTHENTICATION;
use crate::pipelines::contexts::SigninCtxData;
use crate::services::auth_service;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use tracing::{event, instrument, warn, Level};

/// Registers the sign-in flow: look up the user, check the password, issue
/// a bearer token. Unknown users and wrong passwords fail identically.
pub fn register_signin_pipeline(flows: &Flows<AppError>) {
  let mut flow = Flow::<SigninCtxData, AppError>::new(
    "signin",
    &[
      ("fetch_user", Effect::None, None),
      ("verify_password", Effect::None, None),
      ("issue_token", Effect::Local, None),
    ],
  );

  flow.on_step("fetch_user", |ctx_data| Box::pin(fetch_user(ctx_data)));

  flow.on_step("verify_password", |ctx_data: ContextData<SigninCtxData>| async move {
    let (hash, password) = ctx_data.with_read(|d| (d.user.as_ref().map(|u| u.password_hash.clone()), d.password.clone()));
    let hash = hash.ok_or_else(|| AppError::Internal("signin reached verification without a user".to_string()))?;

    // argon2 is CPU bound
    let matches = tokio::task::spawn_blocking(move || auth_service::verify_password(&hash, &password))
      .await
      .map_err(|e| AppError::Internal(format!("password verification task failed: {}", e)))??;
    if !matches {
      warn!("Sign-in rejected: password mismatch.");
      return Err(AppError::Unauthorized("password mismatch".to_string()));
    }
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("issue_token", |ctx_data| Box::pin(issue_token(ctx_data)));

  flows.register(flow);
  tracing::info!("Sign-in pipeline registered.");
}

#[instrument(name = "signin::fetch_user", skip_all, err(Display))]
async fn fetch_user(ctx_data: ContextData<SigninCtxData>) -> AppResult<Control> {
  let (store, email) = ctx_data.with_read(|d| (d.app.store.clone(), d.email.trim().to_string()));

  match store.get_user_by_email(&email).await? {
    Some(user) => {
      event!(Level::DEBUG, user_id = user.id, "User found for sign-in.");
      ctx_data.write().user = Some(user);
      Ok(Control::Continue)
    }
    None => Err(AppError::Unauthorized(format!("no user with email {}", email))),
  }
}

#[instrument(name = "signin::issue_token", skip_all, err(Display))]
async fn issue_token(ctx_data: ContextData<SigninCtxData>) -> AppResult<Control> {
  let (store, user_id, ttl_hours) =
    ctx_data.with_read(|d| (d.app.store.clone(), d.user.as_ref().map(|u| u.id), d.app.config.token_ttl_hours));
  let user_id = user_id.ok_or_else(|| AppError::Internal("signin lost its user".to_string()))?;

  let token = auth_service::generate_token(user_id, chrono::Duration::hours(ttl_hours), SCOPE_AUTHENTICATION);
  store
    .insert_token(user_id, &token.hash, token.expiry, &token.scope)
    .await?;

  event!(Level::INFO, user_id, expiry = %token.expiry, "Authentication token issued.");
  ctx_data.write().token = Some(token);
  Ok(Control::Continue)
}
