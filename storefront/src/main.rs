// storefront/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use storefront::config::{AppConfig, LogFormat, MailBackend, PaymentBackend};
use storefront::errors::{AppError, Result as AppResult};
use storefront::pipelines::{self, reconciliation};
use storefront::services::email_mock::MockMailer;
use storefront::services::mailer::{MailTemplates, SmtpMailer};
use storefront::services::payment_mock::MockGateway;
use storefront::services::pg_store::PgStore;
use storefront::services::stripe_client::StripeClient;
use storefront::services::{auth_service, Mailer, PaymentGateway, Store};
use storefront::state::AppState;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter) // RUST_LOG overrides the default level
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  // Logging starts before the rest of the config so config errors are logged.
  let log_format = LogFormat::from_env().unwrap_or(LogFormat::Pretty);
  init_tracing(log_format);

  tracing::info!("Starting widgets storefront API...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };
  tracing::debug!(config = ?app_config, "Configuration loaded.");

  let app_state = match build_state(app_config).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialize application state.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  pipelines::register_all_pipelines(&app_state.flows, &app_state);
  spawn_reconciliation(&app_state);

  let server_address = format!("{}:{}", app_state.config.server_host, app_state.config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(storefront::web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}

async fn build_state(config: AppConfig) -> AppResult<AppState> {
  let pool = PgPoolOptions::new()
    .max_connections(config.database_max_connections)
    .acquire_timeout(Duration::from_secs(5))
    .connect(&config.database_url)
    .await?;
  tracing::info!("Connected to the database.");

  if config.run_migrations {
    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .map_err(|e| AppError::Config(format!("migrations failed: {}", e)))?;
    tracing::info!("Database migrations applied.");
  }

  std::fs::create_dir_all(&config.invoice_dir)
    .map_err(|e| AppError::Config(format!("invoice directory {}: {}", config.invoice_dir.display(), e)))?;

  let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

  let gateway: Arc<dyn PaymentGateway> = match config.payment_backend {
    PaymentBackend::Stripe => Arc::new(StripeClient::new(&config.stripe).map_err(|e| AppError::Config(e.to_string()))?),
    PaymentBackend::Mock => {
      tracing::warn!("PAYMENT_BACKEND=mock: no money moves.");
      Arc::new(MockGateway::new())
    }
  };

  let templates = MailTemplates::load(&config.email_template_dir)?;
  let mailer: Arc<dyn Mailer> = match config.mail_backend {
    MailBackend::Smtp => Arc::new(SmtpMailer::new(&config.smtp, templates)?),
    MailBackend::Log => Arc::new(MockMailer::new(templates)),
  };

  if let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password) {
    seed_admin(store.as_ref(), email, password).await?;
  }

  AppState::new(store, gateway, mailer, config)
}

/// Creates the bootstrap admin unless a user with `email` already exists.
async fn seed_admin(store: &dyn Store, email: &str, password: &str) -> AppResult<()> {
  if store.get_user_by_email(email).await?.is_some() {
    tracing::debug!("Admin user already present.");
    return Ok(());
  }
  let hash = auth_service::hash_password(password)?;
  let id = store.insert_user("Admin", "User", email, &hash).await?;
  tracing::info!(user_id = id, "Seeded admin user.");
  Ok(())
}

fn spawn_reconciliation(app_state: &AppState) {
  let interval_secs = app_state.config.reconciliation_interval_secs;
  if interval_secs == 0 {
    tracing::info!("Periodic reconciliation disabled.");
    return;
  }
  let store = app_state.store.clone();
  let stale = chrono::Duration::seconds(app_state.config.reconciliation_stale_secs);

  actix_web::rt::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.tick().await;
    loop {
      ticker.tick().await;
      if let Err(e) = reconciliation::sweep(store.as_ref(), stale, chrono::Utc::now()).await {
        tracing::error!(error = %e, "Periodic reconciliation sweep failed.");
      }
    }
  });
}
