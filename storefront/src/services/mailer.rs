// storefront/src/services/mailer.rs

//! Outbound email: Tera HTML templates delivered over SMTP with lettre.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum MailError {
  #[error("template '{name}' could not be rendered: {reason}")]
  Template { name: String, reason: String },

  #[error("invalid address '{address}': {reason}")]
  Address { address: String, reason: String },

  #[error("message could not be built: {0}")]
  Build(String),

  #[error("attachment '{path}' could not be read: {reason}")]
  Attachment { path: String, reason: String },

  #[error("mail transport failed: {0}")]
  Transport(String),
}

/// A message addressed to one recipient, rendered from `{template}.html`.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
  pub from: String,
  pub to: String,
  pub subject: String,
  pub template: String,
  pub data: serde_json::Value,
  pub attachments: Vec<PathBuf>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Every `*.html` file under the template directory, keyed by its relative path.
#[derive(Debug, Clone)]
pub struct MailTemplates {
  tera: Tera,
}

impl MailTemplates {
  pub fn load(dir: &Path) -> Result<Self, MailError> {
    let glob = format!("{}/**/*.html", dir.display());
    let tera = Tera::new(&glob).map_err(|e| MailError::Template {
      name: glob.clone(),
      reason: e.to_string(),
    })?;
    info!(dir = %dir.display(), templates = tera.get_template_names().count(), "Mail templates loaded.");
    Ok(Self { tera })
  }

  pub fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, MailError> {
    let file = format!("{}.html", name);
    let template_error = |reason: String| MailError::Template {
      name: name.to_string(),
      reason,
    };
    let context = Context::from_value(data.clone()).map_err(|e| template_error(e.to_string()))?;
    self.tera.render(&file, &context).map_err(|e| template_error(e.to_string()))
  }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
  address.parse::<Mailbox>().map_err(|e| MailError::Address {
    address: address.to_string(),
    reason: e.to_string(),
  })
}

fn content_type_for(path: &Path) -> ContentType {
  let mime = match path.extension().and_then(|e| e.to_str()) {
    Some("pdf") => "application/pdf",
    _ => "application/octet-stream",
  };
  ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}

pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  templates: MailTemplates,
}

impl SmtpMailer {
  pub fn new(cfg: &SmtpConfig, templates: MailTemplates) -> Result<Self, MailError> {
    let mut builder = if cfg.starttls {
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host).map_err(|e| MailError::Transport(e.to_string()))?
    } else {
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
    };
    builder = builder
      .port(cfg.port)
      .timeout(Some(Duration::from_secs(cfg.timeout_secs)));
    if !cfg.username.is_empty() {
      builder = builder.credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()));
    }

    Ok(Self {
      transport: builder.build(),
      templates,
    })
  }
}

#[async_trait]
impl Mailer for SmtpMailer {
  #[instrument(
    name = "smtp_mailer::send",
    skip_all,
    fields(template = %mail.template, attachments = mail.attachments.len()),
    err(Display)
  )]
  async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
    let html = self.templates.render(&mail.template, &mail.data)?;

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(html));
    for path in &mail.attachments {
      let bytes = tokio::fs::read(path).await.map_err(|e| MailError::Attachment {
        path: path.display().to_string(),
        reason: e.to_string(),
      })?;
      let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
      body = body.singlepart(Attachment::new(filename).body(bytes, content_type_for(path)));
    }

    let message = Message::builder()
      .from(mailbox(&mail.from)?)
      .to(mailbox(&mail.to)?)
      .subject(mail.subject.as_str())
      .multipart(body)
      .map_err(|e| MailError::Build(e.to_string()))?;

    self
      .transport
      .send(message)
      .await
      .map_err(|e| MailError::Transport(e.to_string()))?;
    info!("Mail delivered to SMTP relay.");
    Ok(())
  }
}
