// storefront/src/services/auth_service.rs

//! Password hashing and bearer token issuance.

use crate::errors::AppError;
use crate::models::{AuthToken, TOKEN_LENGTH};
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, error, instrument};

/// Hashes a plain-text password using Argon2 with a random salt.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::BadRequest("password must not be empty".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|argon_err| {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing process failed: {}", argon_err))
    })
}

/// Verifies a plain-text password against a stored Argon2 hash.
///
/// Returns `Ok(false)` on a mismatch. A hash that cannot be parsed is an
/// internal error, not an authentication failure.
#[instrument(
  name = "auth_service::verify_password",
  skip(hashed_password_str, provided_password),
  err(Display),
  fields(hash_len = hashed_password_str.len())
)]
pub fn verify_password(hashed_password_str: &str, provided_password: &str) -> Result<bool, AppError> {
  if hashed_password_str.is_empty() {
    return Err(AppError::Unauthorized("stored password hash is empty".to_string()));
  }
  if provided_password.is_empty() {
    return Err(AppError::Unauthorized("provided password is empty".to_string()));
  }

  let parsed_hash = PasswordHash::new(hashed_password_str).map_err(|parse_err| {
    error!(error = %parse_err, "Failed to parse stored password hash string.");
    AppError::Internal(format!("Invalid stored password hash format: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password verification failed: passwords do not match.");
      Ok(false)
    }
    Err(other_argon_err) => {
      error!(error = %other_argon_err, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!(
        "Password verification process failed: {}",
        other_argon_err
      )))
    }
  }
}

/// Hex SHA-256 of a plaintext token. Only this form is ever stored.
pub fn token_hash(token: &str) -> String {
  format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// A fresh random token for `user_id` valid for `ttl`.
pub fn generate_token(user_id: i64, ttl: Duration, scope: &str) -> AuthToken {
  let token: String = rand::rng()
    .sample_iter(&Alphanumeric)
    .take(TOKEN_LENGTH)
    .map(char::from)
    .collect();
  AuthToken {
    hash: token_hash(&token),
    token,
    user_id,
    expiry: Utc::now() + ttl,
    scope: scope.to_string(),
  }
}
