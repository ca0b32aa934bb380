// storefront/src/services/stripe_client.rs

//! Stripe REST client: form-encoded requests, bearer auth, structured errors.

use crate::config::StripeConfig;
use crate::services::gateway::{
  GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent, PaymentMethod, Refund, Subscription,
  SubscriptionMetadata,
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
  error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  #[serde(rename = "type")]
  kind: Option<String>,
  code: Option<String>,
  decline_code: Option<String>,
  message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
  http: Client,
  secret: String,
  api_base: String,
}

impl StripeClient {
  pub fn new(cfg: &StripeConfig) -> Result<Self, GatewayError> {
    let timeout = Duration::from_secs(if cfg.timeout_secs > 0 { cfg.timeout_secs } else { 30 });
    let http = Client::builder()
      .use_rustls_tls()
      .timeout(timeout)
      .build()
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    Ok(Self {
      http,
      secret: cfg.secret.clone(),
      api_base: cfg.api_base.trim_end_matches('/').to_string(),
    })
  }

  async fn call<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    form: &[(&str, String)],
  ) -> Result<T, GatewayError> {
    let url = format!("{}{}", self.api_base, path);
    let mut request = self.http.request(method.clone(), &url).bearer_auth(&self.secret);
    if method != Method::GET {
      request = request.form(form);
    }

    let response = request.send().await.map_err(|e| {
      warn!(path, error = %e, "Stripe request did not complete.");
      GatewayError::Transport(e.to_string())
    })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;
    debug!(path, status = status.as_u16(), "Stripe responded.");

    if status.is_success() {
      return serde_json::from_str::<T>(&body).map_err(|e| GatewayError::Decode(e.to_string()));
    }
    Err(decode_error(status, &body))
  }
}

fn decode_error(status: StatusCode, body: &str) -> GatewayError {
  let Ok(envelope) = serde_json::from_str::<StripeErrorEnvelope>(body) else {
    return GatewayError::Api {
      status: status.as_u16(),
      code: None,
      message: format!("unexpected response body ({} bytes)", body.len()),
    };
  };
  let err = envelope.error;
  let message = err.message.unwrap_or_default();

  if err.kind.as_deref() == Some("card_error") {
    return GatewayError::Card {
      code: err.code.unwrap_or_else(|| "card_declined".to_string()),
      decline_code: err.decline_code,
      message,
    };
  }
  GatewayError::Api {
    status: status.as_u16(),
    code: err.code,
    message,
  }
}

#[async_trait]
impl PaymentGateway for StripeClient {
  #[instrument(name = "stripe::create_payment_intent", skip(self), err(Display))]
  async fn create_payment_intent(&self, currency: &str, amount: i64) -> Result<PaymentIntent, GatewayError> {
    let form = [
      ("amount", amount.to_string()),
      ("currency", currency.to_string()),
    ];
    self.call(Method::POST, "/v1/payment_intents", &form).await
  }

  #[instrument(name = "stripe::retrieve_payment_intent", skip(self), err(Display))]
  async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
    self.call(Method::GET, &format!("/v1/payment_intents/{}", id), &[]).await
  }

  #[instrument(name = "stripe::retrieve_payment_method", skip(self), err(Display))]
  async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError> {
    self.call(Method::GET, &format!("/v1/payment_methods/{}", id), &[]).await
  }

  #[instrument(name = "stripe::create_customer", skip(self, name, email), err(Display))]
  async fn create_customer(
    &self,
    payment_method: &str,
    name: &str,
    email: &str,
  ) -> Result<GatewayCustomer, GatewayError> {
    let form = [
      ("payment_method", payment_method.to_string()),
      ("name", name.to_string()),
      ("email", email.to_string()),
      ("invoice_settings[default_payment_method]", payment_method.to_string()),
    ];
    self.call(Method::POST, "/v1/customers", &form).await
  }

  #[instrument(name = "stripe::create_subscription", skip(self, metadata), err(Display))]
  async fn create_subscription(
    &self,
    customer_id: &str,
    plan: &str,
    metadata: &SubscriptionMetadata,
  ) -> Result<Subscription, GatewayError> {
    let form = [
      ("customer", customer_id.to_string()),
      ("items[0][plan]", plan.to_string()),
      ("metadata[last_four]", metadata.last_four.clone()),
      ("metadata[card_type]", metadata.card_type.clone()),
      ("expand[]", "latest_invoice.payment_intent".to_string()),
    ];
    self.call(Method::POST, "/v1/subscriptions", &form).await
  }

  #[instrument(name = "stripe::cancel_subscription", skip(self), err(Display))]
  async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, GatewayError> {
    let form = [("cancel_at_period_end", "true".to_string())];
    self
      .call(Method::POST, &format!("/v1/subscriptions/{}", subscription_id), &form)
      .await
  }

  #[instrument(name = "stripe::refund", skip(self), err(Display))]
  async fn refund(&self, payment_intent: &str, amount: i64) -> Result<Refund, GatewayError> {
    let form = [
      ("payment_intent", payment_intent.to_string()),
      ("amount", amount.to_string()),
    ];
    self.call(Method::POST, "/v1/refunds", &form).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn card_error_body_becomes_card_variant() {
    let body = r#"{"error":{"type":"card_error","code":"incorrect_cvc","message":"Your card's security code is incorrect."}}"#;
    match decode_error(StatusCode::PAYMENT_REQUIRED, body) {
      GatewayError::Card { code, .. } => assert_eq!(code, "incorrect_cvc"),
      other => panic!("expected card error, got {:?}", other),
    }
  }

  #[test]
  fn non_json_body_is_an_api_error_without_code() {
    match decode_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>") {
      GatewayError::Api { status, code, .. } => {
        assert_eq!(status, 502);
        assert_eq!(code, None);
      }
      other => panic!("expected api error, got {:?}", other),
    }
  }
}
