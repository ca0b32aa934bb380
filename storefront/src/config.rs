// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentBackend {
  Stripe,
  Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
  Smtp,
  /// Renders templates and logs the message instead of sending it.
  Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl LogFormat {
  /// Read separately from [`AppConfig::from_env`] so logging can start first.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    match var_or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
      "json" => Ok(LogFormat::Json),
      "pretty" | "text" => Ok(LogFormat::Pretty),
      other => Err(AppError::Config(format!("Invalid LOG_FORMAT: '{}'", other))),
    }
  }
}

#[derive(Clone)]
pub struct StripeConfig {
  pub secret: String,
  pub key: String,
  pub api_base: String,
  pub timeout_secs: u64,
}

impl fmt::Debug for StripeConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StripeConfig")
      .field("secret", &"[REDACTED]")
      .field("key", &self.key)
      .field("api_base", &self.api_base)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

#[derive(Clone)]
pub struct SmtpConfig {
  pub host: String,
  pub port: u16,
  pub username: String,
  pub password: String,
  pub starttls: bool,
  pub timeout_secs: u64,
}

impl fmt::Debug for SmtpConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SmtpConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("username", &self.username)
      .field("password", &"[REDACTED]")
      .field("starttls", &self.starttls)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

/// Process-wide configuration. Built once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  pub database_url: String,
  pub database_max_connections: u32,
  pub run_migrations: bool,
  /// Bootstrap admin account created at startup when no user has this email.
  pub seed_admin_email: Option<String>,
  pub seed_admin_password: Option<String>,

  pub payment_backend: PaymentBackend,
  pub stripe: StripeConfig,

  pub mail_backend: MailBackend,
  pub smtp: SmtpConfig,
  pub mail_from: String,
  pub email_template_dir: PathBuf,

  pub frontend_url: String,
  pub secret_key: String,
  pub token_ttl_hours: i64,
  pub reset_link_ttl_minutes: i64,

  pub invoice_dir: PathBuf,
  pub invoice_template: PathBuf,
  pub invoice_currency: String,
  pub default_currency: String,

  /// Zero disables the periodic sweep.
  pub reconciliation_interval_secs: u64,
  pub reconciliation_stale_secs: i64,

  pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &"[REDACTED]")
      .field("payment_backend", &self.payment_backend)
      .field("stripe", &self.stripe)
      .field("mail_backend", &self.mail_backend)
      .field("smtp", &self.smtp)
      .field("invoice_dir", &self.invoice_dir)
      .field("reconciliation_interval_secs", &self.reconciliation_interval_secs)
      .finish_non_exhaustive()
  }
}

fn var_or(name: &str, default: &str) -> String {
  env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  match env::var(name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    Err(_) => Ok(default),
  }
}

fn optional_var(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let defaults = Self::default();

    let database_url =
      env::var("DATABASE_URL").map_err(|e| AppError::Config(format!("Missing environment variable 'DATABASE_URL': {}", e)))?;

    let payment_backend = match var_or("PAYMENT_BACKEND", "stripe").to_lowercase().as_str() {
      "stripe" => PaymentBackend::Stripe,
      "mock" => PaymentBackend::Mock,
      other => return Err(AppError::Config(format!("Invalid PAYMENT_BACKEND: '{}'", other))),
    };

    let stripe_secret = optional_var("STRIPE_SECRET");
    if payment_backend == PaymentBackend::Stripe && stripe_secret.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'STRIPE_SECRET' (required by PAYMENT_BACKEND=stripe)".to_string(),
      ));
    }

    let mail_backend = match var_or("MAIL_BACKEND", "smtp").to_lowercase().as_str() {
      "smtp" => MailBackend::Smtp,
      "log" => MailBackend::Log,
      other => return Err(AppError::Config(format!("Invalid MAIL_BACKEND: '{}'", other))),
    };

    let log_format = LogFormat::from_env()?;

    let config = Self {
      server_host: var_or("SERVER_HOST", &defaults.server_host),
      server_port: parse_var("SERVER_PORT", defaults.server_port)?,
      database_url,
      database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
      run_migrations: parse_var("RUN_MIGRATIONS", defaults.run_migrations)?,
      seed_admin_email: optional_var("SEED_ADMIN_EMAIL"),
      seed_admin_password: optional_var("SEED_ADMIN_PASSWORD"),
      payment_backend,
      stripe: StripeConfig {
        secret: stripe_secret.unwrap_or_default(),
        key: var_or("STRIPE_KEY", ""),
        api_base: var_or("STRIPE_API_BASE", &defaults.stripe.api_base),
        timeout_secs: parse_var("STRIPE_TIMEOUT_SECS", defaults.stripe.timeout_secs)?,
      },
      mail_backend,
      smtp: SmtpConfig {
        host: var_or("SMTP_HOST", &defaults.smtp.host),
        port: parse_var("SMTP_PORT", defaults.smtp.port)?,
        username: var_or("SMTP_USERNAME", ""),
        password: var_or("SMTP_PASSWORD", ""),
        starttls: parse_var("SMTP_STARTTLS", defaults.smtp.starttls)?,
        timeout_secs: parse_var("SMTP_TIMEOUT_SECS", defaults.smtp.timeout_secs)?,
      },
      mail_from: var_or("MAIL_FROM", &defaults.mail_from),
      email_template_dir: PathBuf::from(var_or("EMAIL_TEMPLATE_DIR", "./templates/email")),
      frontend_url: var_or("FRONTEND_URL", &defaults.frontend_url).trim_end_matches('/').to_string(),
      secret_key: var_or("SECRET_KEY", &defaults.secret_key),
      token_ttl_hours: parse_var("TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
      reset_link_ttl_minutes: parse_var("RESET_LINK_TTL_MINUTES", defaults.reset_link_ttl_minutes)?,
      invoice_dir: PathBuf::from(var_or("INVOICE_DIR", "./invoices")),
      invoice_template: PathBuf::from(var_or("INVOICE_TEMPLATE", "./pdf-templates/invoice.pdf")),
      invoice_currency: var_or("INVOICE_CURRENCY", &defaults.invoice_currency).to_lowercase(),
      default_currency: var_or("DEFAULT_CURRENCY", &defaults.default_currency).to_lowercase(),
      reconciliation_interval_secs: parse_var("RECONCILIATION_INTERVAL_SECS", defaults.reconciliation_interval_secs)?,
      reconciliation_stale_secs: parse_var("RECONCILIATION_STALE_SECS", defaults.reconciliation_stale_secs)?,
      log_format,
    };

    if config.secret_key == defaults.secret_key {
      tracing::warn!("SECRET_KEY not set; using the development default.");
    }
    if config.token_ttl_hours <= 0 || config.reset_link_ttl_minutes <= 0 {
      return Err(AppError::Config("Token lifetimes must be positive".to_string()));
    }

    tracing::info!("Application configuration loaded successfully.");
    Ok(config)
  }
}

impl Default for AppConfig {
  /// Development defaults with in-process payment and mail backends.
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 4001,
      database_url: "postgres://localhost/widgets".to_string(),
      database_max_connections: 10,
      run_migrations: true,
      seed_admin_email: None,
      seed_admin_password: None,
      payment_backend: PaymentBackend::Mock,
      stripe: StripeConfig {
        secret: String::new(),
        key: String::new(),
        api_base: "https://api.stripe.com".to_string(),
        timeout_secs: 30,
      },
      mail_backend: MailBackend::Log,
      smtp: SmtpConfig {
        host: "localhost".to_string(),
        port: 1025,
        username: String::new(),
        password: String::new(),
        starttls: false,
        timeout_secs: 10,
      },
      mail_from: "info@widgets.com".to_string(),
      email_template_dir: PathBuf::from("templates/email"),
      frontend_url: "http://localhost:4000".to_string(),
      secret_key: "widgets-development-secret-key!!".to_string(),
      token_ttl_hours: 24,
      reset_link_ttl_minutes: 60,
      invoice_dir: PathBuf::from("invoices"),
      invoice_template: PathBuf::from("pdf-templates/invoice.pdf"),
      invoice_currency: "eur".to_string(),
      default_currency: "eur".to_string(),
      reconciliation_interval_secs: 300,
      reconciliation_stale_secs: 900,
      log_format: LogFormat::Pretty,
    }
  }
}
