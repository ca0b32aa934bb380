// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::services::invoice_pdf::InvoiceRenderer;
use crate::services::reset_tokens::ResetTokens;
use crate::services::{Mailer, PaymentGateway, Store};
use sagaflow::Flows;
use std::sync::Arc;

/// Everything a request or flow step may touch. Built once at startup.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub mailer: Arc<dyn Mailer>,
  pub invoices: InvoiceRenderer,
  pub reset_tokens: ResetTokens,
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Flows still have to be registered with
  /// [`register_all_pipelines`](crate::pipelines::register_all_pipelines).
  pub fn new(
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    config: AppConfig,
  ) -> AppResult<Self> {
    if config.reset_link_ttl_minutes <= 0 {
      return Err(AppError::Config("RESET_LINK_TTL_MINUTES must be positive".to_string()));
    }
    let invoices = InvoiceRenderer::new(
      config.invoice_dir.clone(),
      config.invoice_template.clone(),
      config.invoice_currency.clone(),
    );
    let reset_tokens = ResetTokens::new(
      &config.secret_key,
      chrono::Duration::minutes(config.reset_link_ttl_minutes),
    );

    Ok(Self {
      store,
      gateway,
      mailer,
      invoices,
      reset_tokens,
      flows: Arc::new(Flows::new()),
      config: Arc::new(config),
    })
  }
}
