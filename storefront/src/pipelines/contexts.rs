// storefront/src/pipelines/contexts.rs

//! The data each flow operates on. Handlers receive these wrapped in
//! `sagaflow::ContextData`.

use crate::models::{AuthToken, OrderDetail, User, Widget};
use crate::services::gateway::{CardDetails, PaymentIntent};
use crate::services::invoice_pdf::InvoiceData;
use crate::state::AppState;
use serde_json::json;
use std::path::PathBuf;

// --- Payments ---

#[derive(Clone)]
pub struct ChargeCtxData {
  pub app: AppState,
  pub currency: String,
  pub amount: i64,
  pub intent: Option<PaymentIntent>,
}

/// Buyer details shared by the flows that record a sale.
#[derive(Debug, Clone, Default)]
pub struct Buyer {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
}

/// Rows written so far by a flow that records a sale.
#[derive(Debug, Clone, Default)]
pub struct RecordedSale {
  pub customer_id: Option<i64>,
  pub transaction_id: Option<i64>,
  pub order_id: Option<i64>,
}

#[derive(Clone)]
pub struct SubscriptionCtxData {
  pub app: AppState,
  pub buyer: Buyer,
  pub widget_id: i64,
  pub plan: String,
  pub payment_method: String,
  pub last_four: String,
  pub card_brand: String,
  pub expiry_month: i32,
  pub expiry_year: i32,
  pub widget: Option<Widget>,
  pub remote_customer_id: Option<String>,
  pub subscription_id: Option<String>,
  pub recorded: RecordedSale,
}

impl SubscriptionCtxData {
  /// Journal subject: enough to find the remote subscription by hand.
  pub fn journal_subject(&self) -> String {
    json!({
      "widget_id": self.widget_id,
      "email": self.buyer.email,
      "remote_customer_id": self.remote_customer_id,
      "subscription_id": self.subscription_id,
      "order_id": self.recorded.order_id,
    })
    .to_string()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
  /// Storefront checkout: records customer, transaction and order.
  Checkout,
  /// Virtual terminal: records the transaction only.
  Terminal,
}

#[derive(Clone)]
pub struct ConfirmationCtxData {
  pub app: AppState,
  pub mode: ConfirmationMode,
  pub buyer: Buyer,
  pub widget_id: Option<i64>,
  pub payment_intent: String,
  pub payment_method: String,
  pub intent: Option<PaymentIntent>,
  pub card: Option<CardDetails>,
  pub recorded: RecordedSale,
}

#[derive(Clone)]
pub struct RefundCtxData {
  pub app: AppState,
  pub order_id: i64,
  pub payment_intent: String,
  pub amount: i64,
  pub order: Option<OrderDetail>,
  pub refund_id: Option<String>,
}

impl RefundCtxData {
  pub fn journal_subject(&self) -> String {
    json!({
      "order_id": self.order_id,
      "transaction_id": self.order.as_ref().map(|o| o.order.transaction_id),
      "payment_intent": self.payment_intent,
      "amount": self.amount,
      "refund_id": self.refund_id,
      "target_status": "refunded",
    })
    .to_string()
  }
}

#[derive(Clone)]
pub struct CancellationCtxData {
  pub app: AppState,
  pub order_id: i64,
  pub subscription_id: String,
  pub order: Option<OrderDetail>,
}

impl CancellationCtxData {
  pub fn journal_subject(&self) -> String {
    json!({
      "order_id": self.order_id,
      "subscription_id": self.subscription_id,
      "target_status": "cancelled",
    })
    .to_string()
  }
}

#[derive(Clone)]
pub struct InvoiceCtxData {
  pub app: AppState,
  pub invoice: InvoiceData,
  pub pdf_path: Option<PathBuf>,
}

// --- Accounts ---

#[derive(Clone)]
pub struct SigninCtxData {
  pub app: AppState,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub token: Option<AuthToken>,
}

#[derive(Clone)]
pub struct ResetRequestCtxData {
  pub app: AppState,
  pub email: String,
  pub user_found: bool,
}

#[derive(Clone)]
pub struct PasswordResetCtxData {
  pub app: AppState,
  pub token: String,
  pub password: String,
  pub email: Option<String>,
  pub user_id: Option<i64>,
}
