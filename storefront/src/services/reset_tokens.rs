// storefront/src/services/reset_tokens.rs

//! Self-contained password reset tokens.
//!
//! A token is AES-256-GCM over `"{expires_unix}:{email}"`, keyed by the
//! SHA-256 of the application secret, with the 12-byte nonce prepended and
//! the whole encoded as unpadded base64url so it can travel in a query string.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetTokenError {
  #[error("reset token is malformed")]
  Malformed,

  #[error("reset token failed authentication")]
  Tampered,

  #[error("reset token has expired")]
  Expired,
}

#[derive(Clone)]
pub struct ResetTokens {
  cipher: Aes256Gcm,
  ttl: Duration,
}

impl ResetTokens {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    let key = Sha256::digest(secret.as_bytes());
    Self {
      cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
      ttl,
    }
  }

  pub fn seal(&self, email: &str, now: DateTime<Utc>) -> Result<String, ResetTokenError> {
    let expires = (now + self.ttl).timestamp();
    let plaintext = format!("{}:{}", expires, email);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let ciphertext = self
      .cipher
      .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
      .map_err(|_| ResetTokenError::Malformed)?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(&combined))
  }

  /// Returns the email the token was issued for.
  pub fn open(&self, token: &str, now: DateTime<Utc>) -> Result<String, ResetTokenError> {
    let combined = URL_SAFE_NO_PAD
      .decode(token.trim())
      .map_err(|_| ResetTokenError::Malformed)?;
    if combined.len() < NONCE_SIZE + TAG_SIZE {
      return Err(ResetTokenError::Malformed);
    }

    let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
    let plaintext = self
      .cipher
      .decrypt(Nonce::from_slice(nonce), ciphertext)
      .map_err(|_| ResetTokenError::Tampered)?;
    let plaintext = String::from_utf8(plaintext).map_err(|_| ResetTokenError::Malformed)?;

    let (expires, email) = plaintext.split_once(':').ok_or(ResetTokenError::Malformed)?;
    let expires: i64 = expires.parse().map_err(|_| ResetTokenError::Malformed)?;
    if now.timestamp() > expires {
      return Err(ResetTokenError::Expired);
    }
    Ok(email.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens() -> ResetTokens {
    ResetTokens::new("a-test-secret", Duration::minutes(60))
  }

  #[test]
  fn sealed_token_opens_to_its_email() {
    let now = Utc::now();
    let token = tokens().seal("admin@example.com", now).unwrap();
    assert!(!token.contains('='));
    assert_eq!(tokens().open(&token, now).unwrap(), "admin@example.com");
  }

  #[test]
  fn token_expires_after_its_lifetime() {
    let now = Utc::now();
    let token = tokens().seal("admin@example.com", now).unwrap();
    assert_eq!(
      tokens().open(&token, now + Duration::minutes(61)),
      Err(ResetTokenError::Expired)
    );
  }

  #[test]
  fn altered_or_foreign_tokens_are_rejected() {
    let now = Utc::now();
    let token = tokens().seal("admin@example.com", now).unwrap();

    let mut bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let altered = URL_SAFE_NO_PAD.encode(&bytes);
    assert_eq!(tokens().open(&altered, now), Err(ResetTokenError::Tampered));

    let other = ResetTokens::new("another-secret", Duration::minutes(60));
    assert_eq!(other.open(&token, now), Err(ResetTokenError::Tampered));
    assert_eq!(tokens().open("not base64!", now), Err(ResetTokenError::Malformed));
  }
}
