// storefront/src/services/gateway.rs

//! The payment processor boundary: request/response calls with no local state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
  pub id: String,
  #[serde(default)]
  pub client_secret: Option<String>,
  pub amount: i64,
  pub currency: String,
  pub status: String,
  /// Most recent charge; absent until the intent has been confirmed.
  #[serde(default)]
  pub latest_charge: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDetails {
  pub brand: String,
  pub last4: String,
  pub exp_month: i32,
  pub exp_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
  pub id: String,
  #[serde(default)]
  pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayCustomer {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
  pub id: String,
  pub status: String,
  #[serde(default)]
  pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Refund {
  pub id: String,
  pub amount: i64,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub payment_intent: Option<String>,
}

/// Opaque card metadata attached to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMetadata {
  pub last_four: String,
  pub card_type: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
  #[error("card error ({code}): {message}")]
  Card {
    code: String,
    decline_code: Option<String>,
    message: String,
  },

  #[error("gateway api error (status {status}): {message}")]
  Api {
    status: u16,
    code: Option<String>,
    message: String,
  },

  #[error("gateway transport error: {0}")]
  Transport(String),

  #[error("gateway response could not be decoded: {0}")]
  Decode(String),
}

impl GatewayError {
  /// The user-facing decline for this error, if it is a card problem.
  ///
  /// Card errors always map (unknown codes fall back to a generic decline).
  /// API errors map only when their code belongs to the decline vocabulary,
  /// e.g. `amount_too_small` is reported as an invalid request.
  pub fn decline_reason(&self) -> Option<DeclineReason> {
    match self {
      GatewayError::Card { code, .. } => Some(DeclineReason::from_code(code)),
      GatewayError::Api { code: Some(code), .. } => DeclineReason::known(code),
      _ => None,
    }
  }
}

/// The fixed vocabulary of decline messages shown to customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
  CardDeclined,
  ExpiredCard,
  IncorrectCvc,
  IncorrectZip,
  AmountTooLarge,
  AmountTooSmall,
  BalanceInsufficient,
  PostalCodeInvalid,
}

impl DeclineReason {
  pub fn known(code: &str) -> Option<Self> {
    match code {
      "card_declined" => Some(DeclineReason::CardDeclined),
      "expired_card" => Some(DeclineReason::ExpiredCard),
      "incorrect_cvc" => Some(DeclineReason::IncorrectCvc),
      "incorrect_zip" => Some(DeclineReason::IncorrectZip),
      "amount_too_large" => Some(DeclineReason::AmountTooLarge),
      "amount_too_small" => Some(DeclineReason::AmountTooSmall),
      "balance_insufficient" => Some(DeclineReason::BalanceInsufficient),
      "postal_code_invalid" => Some(DeclineReason::PostalCodeInvalid),
      _ => None,
    }
  }

  pub fn from_code(code: &str) -> Self {
    Self::known(code).unwrap_or(DeclineReason::CardDeclined)
  }

  pub fn message(self) -> &'static str {
    match self {
      DeclineReason::CardDeclined => "Your card was declined",
      DeclineReason::ExpiredCard => "Your card is expired",
      DeclineReason::IncorrectCvc => "Incorrect CVC code",
      DeclineReason::IncorrectZip => "Incorrect zip/postal code",
      DeclineReason::AmountTooLarge => "The amount is too large to charge to your card",
      DeclineReason::AmountTooSmall => "The amount is too small to charge to your card",
      DeclineReason::BalanceInsufficient => "Insufficient balance",
      DeclineReason::PostalCodeInvalid => "Your postal code is invalid",
    }
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_payment_intent(&self, currency: &str, amount: i64) -> Result<PaymentIntent, GatewayError>;

  async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;

  async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError>;

  /// Creates a customer with `payment_method` attached as its default.
  async fn create_customer(&self, payment_method: &str, name: &str, email: &str)
    -> Result<GatewayCustomer, GatewayError>;

  async fn create_subscription(
    &self,
    customer_id: &str,
    plan: &str,
    metadata: &SubscriptionMetadata,
  ) -> Result<Subscription, GatewayError>;

  /// Cancels at the end of the current billing period.
  async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, GatewayError>;

  async fn refund(&self, payment_intent: &str, amount: i64) -> Result<Refund, GatewayError>;
}
