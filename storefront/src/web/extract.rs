// storefront/src/web/extract.rs

//! Request extractors: strict JSON bodies and bearer-token authentication.

use crate::errors::AppError;
use crate::models::{User, TOKEN_LENGTH};
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use futures_util::StreamExt;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::ops::Deref;
use tracing::debug;

pub const MAX_BODY_BYTES: usize = 1_048_576;

/// A JSON body capped at [`MAX_BODY_BYTES`] that must hold exactly one value.
#[derive(Debug)]
pub struct JsonPayload<T>(pub T);

impl<T> JsonPayload<T> {
  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<T> Deref for JsonPayload<T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.0
  }
}

impl<T: DeserializeOwned + 'static> FromRequest for JsonPayload<T> {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(_req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let mut stream = payload.take();
    Box::pin(async move {
      let mut body = web::BytesMut::new();
      while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("body could not be read: {}", e)))?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
          return Err(AppError::BadRequest(format!(
            "body must not be larger than {} bytes",
            MAX_BODY_BYTES
          )));
        }
        body.extend_from_slice(&chunk);
      }
      parse_single_value(&body).map(JsonPayload)
    })
  }
}

fn parse_single_value<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
  let mut values = serde_json::Deserializer::from_slice(body).into_iter::<T>();
  let value = match values.next() {
    Some(Ok(value)) => value,
    Some(Err(e)) => return Err(describe_json_error(&e)),
    None => return Err(AppError::BadRequest("body must not be empty".to_string())),
  };
  if values.next().is_some() {
    return Err(AppError::BadRequest("body must only have a single JSON value".to_string()));
  }
  Ok(value)
}

fn describe_json_error(err: &serde_json::Error) -> AppError {
  use serde_json::error::Category;
  let message = match err.classify() {
    Category::Syntax => format!("body contains badly-formed JSON (at character {})", err.column()),
    Category::Eof => "body contains badly-formed JSON".to_string(),
    Category::Data => format!("body contains an invalid value: {}", err),
    Category::Io => format!("body could not be read: {}", err),
  };
  AppError::BadRequest(message)
}

/// Accepts `12`, `"12"` or `" 12 "`. Storefront forms post numeric fields as strings.
pub fn int_from_str_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(i64),
    Text(String),
  }

  match Raw::deserialize(deserializer)? {
    Raw::Number(n) => Ok(n),
    Raw::Text(s) => s
      .trim()
      .parse()
      .map_err(|_| de::Error::custom(format!("'{}' is not a whole number", s))),
  }
}

/// The user owning a valid bearer token.
///
/// Every failure (missing header, wrong scheme, wrong length, unknown or
/// expired token, store error) becomes the same 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let header = req
      .headers()
      .get(AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string);
    let app = req.app_data::<web::Data<AppState>>().cloned();

    Box::pin(async move {
      let app = app.ok_or_else(|| AppError::Internal("application state is not configured".to_string()))?;
      let token = bearer_token(header.as_deref()).map_err(|reason| AppError::Unauthorized(reason.to_string()))?;

      match app.store.get_user_for_token(token).await {
        Ok(Some(user)) => Ok(AuthenticatedUser(user)),
        Ok(None) => Err(AppError::Unauthorized("no matching user found".to_string())),
        Err(e) => {
          debug!(error = %e, "Token lookup failed.");
          Err(AppError::Unauthorized("token lookup failed".to_string()))
        }
      }
    })
  }
}

fn bearer_token(header: Option<&str>) -> Result<&str, &'static str> {
  let header = header.ok_or("no authorization header received")?;
  let mut parts = header.split(' ');
  let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
    return Err("malformed authorization header");
  };
  if scheme != "Bearer" {
    return Err("authorization scheme is not Bearer");
  }
  if token.len() != TOKEN_LENGTH {
    return Err("authentication token wrong size");
  }
  Ok(token)
}
