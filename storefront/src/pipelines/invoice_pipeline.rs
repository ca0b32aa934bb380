// storefront/src/pipelines/invoice_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::InvoiceCtxData;
use crate::services::invoice_pdf::format_amount;
use crate::services::mailer::OutgoingMail;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use serde_json::json;
use tracing::{event, Level};

pub const INVOICE_SUBJECT: &str = "Your invoice";
pub const INVOICE_TEMPLATE: &str = "invoice";

/// Render the invoice PDF, then mail it. Neither step is retried.
pub fn register_invoice_pipeline(flows: &Flows<AppError>) {
  let mut flow = Flow::<InvoiceCtxData, AppError>::new(
    "invoice",
    &[
      ("render_invoice", Effect::Local, None),
      ("send_invoice", Effect::Remote, None),
    ],
  );

  flow.on_step("render_invoice", |ctx_data: ContextData<InvoiceCtxData>| async move {
    let (invoices, invoice) = ctx_data.with_read(|d| (d.app.invoices.clone(), d.invoice.clone()));
    let path = invoices
      .render(invoice)
      .await
      .map_err(|e| AppError::InvoiceRender(e.to_string()))?;
    ctx_data.write().pdf_path = Some(path);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("send_invoice", |ctx_data: ContextData<InvoiceCtxData>| async move {
    let (mailer, from, currency, invoice, pdf_path) = ctx_data.with_read(|d| {
      (
        d.app.mailer.clone(),
        d.app.config.mail_from.clone(),
        d.app.config.invoice_currency.clone(),
        d.invoice.clone(),
        d.pdf_path.clone(),
      )
    });
    let pdf_path = pdf_path.ok_or_else(|| AppError::Internal("invoice was not rendered".to_string()))?;

    let mail = OutgoingMail {
      from,
      to: invoice.email.clone(),
      subject: INVOICE_SUBJECT.to_string(),
      template: INVOICE_TEMPLATE.to_string(),
      data: json!({
        "order_id": invoice.order_id,
        "first_name": invoice.first_name,
        "last_name": invoice.last_name,
        "product": invoice.product,
        "quantity": invoice.quantity,
        "amount": format_amount(invoice.amount, &currency),
      }),
      attachments: vec![pdf_path],
    };
    mailer.send(mail).await.map_err(|e| {
      event!(Level::WARN, order_id = invoice.order_id, error = %e, "Invoice mail failed.");
      AppError::InvoiceDelivery(e.to_string())
    })?;

    event!(Level::INFO, order_id = invoice.order_id, "Invoice sent.");
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Invoice pipeline registered.");
}
