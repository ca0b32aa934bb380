// tests/common/mod.rs
#![allow(dead_code)]

use chrono::Utc;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use storefront::config::AppConfig;
use storefront::models::{
  NewCustomer, NewOrder, NewTransaction, OrderStatus, TransactionStatus, User, Widget, SCOPE_AUTHENTICATION,
};
use storefront::pipelines::register_all_pipelines;
use storefront::services::auth_service;
use storefront::services::email_mock::MockMailer;
use storefront::services::mailer::MailTemplates;
use storefront::services::memory_store::MemoryStore;
use storefront::services::payment_mock::MockGateway;
use storefront::services::Store;
use storefront::state::AppState;
use tempfile::TempDir;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "password";

/// An [`AppState`] wired to in-process doubles, with handles to inspect them.
pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
  pub mailer: Arc<MockMailer>,
  pub invoice_dir: TempDir,
}

pub fn test_app() -> TestApp {
  test_app_with(|_| {})
}

pub fn test_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
  setup_tracing();
  let invoice_dir = tempfile::tempdir().unwrap();

  let mut config = AppConfig::default();
  config.invoice_dir = invoice_dir.path().to_path_buf();
  config.invoice_template = invoice_dir.path().join("no-template.pdf");
  config.email_template_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/email");
  config.reconciliation_interval_secs = 0;
  customize(&mut config);

  let templates = MailTemplates::load(&config.email_template_dir).unwrap();
  let store = Arc::new(MemoryStore::new());
  let gateway = Arc::new(MockGateway::new());
  let mailer = Arc::new(MockMailer::new(templates));

  let state = AppState::new(store.clone(), gateway.clone(), mailer.clone(), config).unwrap();
  register_all_pipelines(&state.flows, &state);

  TestApp {
    state,
    store,
    gateway,
    mailer,
    invoice_dir,
  }
}

/// Builds the actix test service over a [`TestApp`]'s state.
macro_rules! init_app {
  ($test_app:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($test_app.state.clone()))
        .configure(storefront::web::configure_app_routes),
    )
    .await
  };
}

impl TestApp {
  /// Adds a user whose password is [`ADMIN_PASSWORD`].
  pub fn admin(&self) -> User {
    let hash = auth_service::hash_password(ADMIN_PASSWORD).unwrap();
    self.store.add_user(ADMIN_EMAIL, &hash)
  }

  /// Issues a bearer token for `user` without going through sign-in.
  pub async fn token_for(&self, user: &User) -> String {
    let token = auth_service::generate_token(user.id, chrono::Duration::hours(1), SCOPE_AUTHENTICATION);
    self
      .store
      .insert_token(user.id, &token.hash, token.expiry, &token.scope)
      .await
      .unwrap();
    token.token
  }

  pub async fn admin_token(&self) -> String {
    let user = self.admin();
    self.token_for(&user).await
  }

  /// Records a cleared sale of `widget` as if checkout had completed.
  /// Returns the order id and the payment intent it was charged on.
  pub async fn seed_order(&self, widget: &Widget, amount: i64) -> (i64, String) {
    let payment_intent = if widget.is_recurring {
      format!("sub_seed_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    } else {
      format!("pi_seed_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    };
    let customer_id = self
      .store
      .insert_customer(&NewCustomer {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
      })
      .await
      .unwrap();
    let transaction_id = self
      .store
      .insert_transaction(&NewTransaction {
        amount,
        currency: "eur".to_string(),
        last_four: "4242".to_string(),
        expiry_month: 12,
        expiry_year: 2030,
        payment_intent: payment_intent.clone(),
        payment_method: "pm_seed".to_string(),
        bank_return_code: "ch_seed".to_string(),
        status: TransactionStatus::Cleared,
      })
      .await
      .unwrap();
    let order_id = self
      .store
      .insert_order(&NewOrder {
        widget_id: widget.id,
        transaction_id,
        customer_id,
        status: OrderStatus::Purchased,
        quantity: 1,
        amount,
      })
      .await
      .unwrap();
    (order_id, payment_intent)
  }
}

pub fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}
