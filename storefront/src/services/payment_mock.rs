// storefront/src/services/payment_mock.rs

//! In-process payment gateway with failure injection.

use crate::services::gateway::{
  CardDetails, GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent, PaymentMethod, Refund, Subscription,
  SubscriptionMetadata,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
  CreatePaymentIntent,
  RetrievePaymentIntent,
  RetrievePaymentMethod,
  CreateCustomer,
  CreateSubscription,
  CancelSubscription,
  Refund,
}

#[derive(Debug, Clone)]
pub struct MockSubscription {
  pub subscription: Subscription,
  pub customer_id: String,
  pub plan: String,
  pub metadata: SubscriptionMetadata,
}

#[derive(Default)]
struct MockState {
  intents: HashMap<String, PaymentIntent>,
  methods: HashMap<String, PaymentMethod>,
  customers: Vec<GatewayCustomer>,
  subscriptions: Vec<MockSubscription>,
  cancelled: Vec<String>,
  refunds: Vec<Refund>,
  failures: HashMap<GatewayOp, GatewayError>,
}

#[derive(Default)]
pub struct MockGateway {
  state: Mutex<MockState>,
}

fn short_id(prefix: &str) -> String {
  format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn missing(kind: &str, id: &str) -> GatewayError {
  GatewayError::Api {
    status: 404,
    code: Some("resource_missing".to_string()),
    message: format!("No such {}: '{}'", kind, id),
  }
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every later call of `op` fails with `error` until [`clear_failures`] runs.
  ///
  /// [`clear_failures`]: MockGateway::clear_failures
  pub fn fail_on(&self, op: GatewayOp, error: GatewayError) {
    self.state.lock().failures.insert(op, error);
  }

  pub fn clear_failures(&self) {
    self.state.lock().failures.clear();
  }

  /// Registers a confirmed intent and its card, as if the client had completed the charge.
  pub fn seed_payment(&self, intent: PaymentIntent, method: PaymentMethod) {
    let mut state = self.state.lock();
    state.intents.insert(intent.id.clone(), intent);
    state.methods.insert(method.id.clone(), method);
  }

  /// A succeeded intent with a charge, paired with a visa card method.
  pub fn seed_succeeded_payment(&self, amount: i64, currency: &str) -> (PaymentIntent, PaymentMethod) {
    let intent = PaymentIntent {
      id: short_id("pi"),
      client_secret: None,
      amount,
      currency: currency.to_string(),
      status: "succeeded".to_string(),
      latest_charge: Some(short_id("ch")),
    };
    let method = PaymentMethod {
      id: short_id("pm"),
      card: Some(CardDetails {
        brand: "visa".to_string(),
        last4: "4242".to_string(),
        exp_month: 12,
        exp_year: 2030,
      }),
    };
    self.seed_payment(intent.clone(), method.clone());
    (intent, method)
  }

  pub fn customers(&self) -> Vec<GatewayCustomer> {
    self.state.lock().customers.clone()
  }

  pub fn subscriptions(&self) -> Vec<MockSubscription> {
    self.state.lock().subscriptions.clone()
  }

  pub fn cancelled(&self) -> Vec<String> {
    self.state.lock().cancelled.clone()
  }

  pub fn refunds(&self) -> Vec<Refund> {
    self.state.lock().refunds.clone()
  }

  fn check(&self, op: GatewayOp) -> Result<(), GatewayError> {
    match self.state.lock().failures.get(&op) {
      Some(err) => Err(err.clone()),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  #[instrument(name = "mock_gateway::create_payment_intent", skip(self), err(Display))]
  async fn create_payment_intent(&self, currency: &str, amount: i64) -> Result<PaymentIntent, GatewayError> {
    self.check(GatewayOp::CreatePaymentIntent)?;
    let id = short_id("pi");
    let intent = PaymentIntent {
      client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
      id,
      amount,
      currency: currency.to_string(),
      status: "requires_payment_method".to_string(),
      latest_charge: None,
    };
    self.state.lock().intents.insert(intent.id.clone(), intent.clone());
    info!(intent_id = %intent.id, "Mock payment intent created.");
    Ok(intent)
  }

  async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
    self.check(GatewayOp::RetrievePaymentIntent)?;
    self
      .state
      .lock()
      .intents
      .get(id)
      .cloned()
      .ok_or_else(|| missing("payment_intent", id))
  }

  async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError> {
    self.check(GatewayOp::RetrievePaymentMethod)?;
    self
      .state
      .lock()
      .methods
      .get(id)
      .cloned()
      .ok_or_else(|| missing("payment_method", id))
  }

  async fn create_customer(
    &self,
    _payment_method: &str,
    _name: &str,
    email: &str,
  ) -> Result<GatewayCustomer, GatewayError> {
    self.check(GatewayOp::CreateCustomer)?;
    let customer = GatewayCustomer {
      id: short_id("cus"),
      email: Some(email.to_string()),
    };
    self.state.lock().customers.push(customer.clone());
    Ok(customer)
  }

  async fn create_subscription(
    &self,
    customer_id: &str,
    plan: &str,
    metadata: &SubscriptionMetadata,
  ) -> Result<Subscription, GatewayError> {
    self.check(GatewayOp::CreateSubscription)?;
    let subscription = Subscription {
      id: short_id("sub"),
      status: "active".to_string(),
      cancel_at_period_end: false,
    };
    self.state.lock().subscriptions.push(MockSubscription {
      subscription: subscription.clone(),
      customer_id: customer_id.to_string(),
      plan: plan.to_string(),
      metadata: metadata.clone(),
    });
    info!(subscription_id = %subscription.id, "Mock subscription created.");
    Ok(subscription)
  }

  async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, GatewayError> {
    self.check(GatewayOp::CancelSubscription)?;
    let mut state = self.state.lock();
    let found = state
      .subscriptions
      .iter_mut()
      .find(|s| s.subscription.id == subscription_id)
      .map(|s| {
        s.subscription.cancel_at_period_end = true;
        s.subscription.clone()
      });
    let subscription = match found {
      Some(sub) => sub,
      // Subscriptions created outside this double (e.g. seeded orders) still cancel.
      None => Subscription {
        id: subscription_id.to_string(),
        status: "active".to_string(),
        cancel_at_period_end: true,
      },
    };
    state.cancelled.push(subscription_id.to_string());
    Ok(subscription)
  }

  async fn refund(&self, payment_intent: &str, amount: i64) -> Result<Refund, GatewayError> {
    self.check(GatewayOp::Refund)?;
    let refund = Refund {
      id: short_id("re"),
      amount,
      status: Some("succeeded".to_string()),
      payment_intent: Some(payment_intent.to_string()),
    };
    self.state.lock().refunds.push(refund.clone());
    info!(refund_id = %refund.id, "Mock refund issued.");
    Ok(refund)
  }
}
