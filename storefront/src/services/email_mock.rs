// storefront/src/services/email_mock.rs

//! A [`Mailer`] that renders templates and records messages instead of sending them.
//! Used for `MAIL_BACKEND=log` and in tests.

use crate::services::mailer::{MailError, MailTemplates, Mailer, OutgoingMail};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug, Clone)]
pub struct SentMail {
  pub from: String,
  pub to: String,
  pub subject: String,
  pub template: String,
  pub html: String,
  pub attachments: Vec<PathBuf>,
}

pub struct MockMailer {
  templates: MailTemplates,
  sent: Mutex<Vec<SentMail>>,
  fail_next: AtomicBool,
}

impl MockMailer {
  pub fn new(templates: MailTemplates) -> Self {
    Self {
      templates,
      sent: Mutex::new(Vec::new()),
      fail_next: AtomicBool::new(false),
    }
  }

  /// The next `send` fails with a transport error.
  pub fn fail_next(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }

  pub fn sent(&self) -> Vec<SentMail> {
    self.sent.lock().clone()
  }
}

#[async_trait]
impl Mailer for MockMailer {
  async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
    let html = self.templates.render(&mail.template, &mail.data)?;

    if self.fail_next.swap(false, Ordering::SeqCst) {
      tracing::warn!(template = %mail.template, "Simulated mail transport failure.");
      return Err(MailError::Transport("simulated connection refused".to_string()));
    }

    for path in &mail.attachments {
      if !path.exists() {
        return Err(MailError::Attachment {
          path: path.display().to_string(),
          reason: "file does not exist".to_string(),
        });
      }
    }

    info!(
      to = %mail.to,
      subject = %mail.subject,
      template = %mail.template,
      attachments = mail.attachments.len(),
      "Mail recorded instead of sent."
    );
    self.sent.lock().push(SentMail {
      from: mail.from,
      to: mail.to,
      subject: mail.subject,
      template: mail.template,
      html,
      attachments: mail.attachments,
    });
    Ok(())
  }
}
