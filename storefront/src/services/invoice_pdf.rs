// storefront/src/services/invoice_pdf.rs

//! Invoice PDFs: text overlaid on a fixed US Letter template.
//!
//! Field positions are given in millimetres from the top-left corner and
//! converted to PDF points (origin bottom-left) when the page is written.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const LETTER_WIDTH_PT: i64 = 612;
const LETTER_HEIGHT_PT: f32 = 792.0;
const POINTS_PER_MM: f32 = 72.0 / 25.4;
/// Distance from a field's top edge to its text baseline.
const BASELINE_OFFSET_MM: f32 = 5.5;
const FONT_SIZE: i64 = 11;
const FONT_KEY: &str = "FInvoice";

#[derive(Debug, Error)]
pub enum InvoiceError {
  #[error("invoice template could not be used: {0}")]
  Template(String),

  #[error("invoice pdf could not be built: {0}")]
  Pdf(String),

  #[error("invoice file error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invoice rendering task failed: {0}")]
  Task(String),
}

impl From<lopdf::Error> for InvoiceError {
  fn from(err: lopdf::Error) -> Self {
    InvoiceError::Pdf(err.to_string())
  }
}

/// The order fields printed on an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceData {
  pub order_id: i64,
  pub product: String,
  pub quantity: i32,
  pub amount: i64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub created_at: DateTime<Utc>,
}

/// `1000, "eur"` → `"10.00 eur"`.
pub fn format_amount(amount: i64, currency: &str) -> String {
  let sign = if amount < 0 { "-" } else { "" };
  let abs = amount.unsigned_abs();
  format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

struct Placed {
  x_mm: f32,
  y_mm: f32,
  text: String,
}

fn placements(data: &InvoiceData, currency: &str) -> Vec<Placed> {
  let at = |x_mm: f32, y_mm: f32, text: String| Placed { x_mm, y_mm, text };
  vec![
    at(10.0, 50.0, format!("Attention: {} {}", data.first_name, data.last_name)),
    at(10.0, 55.0, data.email.clone()),
    at(10.0, 60.0, data.created_at.format("%Y-%m-%d").to_string()),
    at(10.0, 93.0, data.product.clone()),
    at(166.0, 93.0, data.quantity.to_string()),
    at(185.0, 93.0, format_amount(data.amount, currency)),
  ]
}

/// Code points 0x80..=0x9F of WinAnsiEncoding that differ from Latin-1.
const WIN_ANSI_HIGH: [(char, u8); 27] = [
  ('€', 0x80), ('‚', 0x82), ('ƒ', 0x83), ('„', 0x84), ('…', 0x85), ('†', 0x86), ('‡', 0x87),
  ('ˆ', 0x88), ('‰', 0x89), ('Š', 0x8A), ('‹', 0x8B), ('Œ', 0x8C), ('Ž', 0x8E), ('‘', 0x91),
  ('’', 0x92), ('“', 0x93), ('”', 0x94), ('•', 0x95), ('–', 0x96), ('—', 0x97), ('˜', 0x98),
  ('™', 0x99), ('š', 0x9A), ('›', 0x9B), ('œ', 0x9C), ('ž', 0x9E), ('Ÿ', 0x9F),
];

/// Encodes text for the WinAnsi Helvetica font. Characters the font cannot
/// show become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
  text
    .chars()
    .map(|c| match c as u32 {
      0x20..=0x7E | 0xA0..=0xFF => c as u8,
      _ => WIN_ANSI_HIGH
        .iter()
        .find(|(mapped, _)| *mapped == c)
        .map_or(b'?', |(_, byte)| *byte),
    })
    .collect()
}

fn text_operations(fields: &[Placed]) -> Vec<Operation> {
  let mut ops = Vec::with_capacity(fields.len() * 5);
  for field in fields {
    let x = field.x_mm * POINTS_PER_MM;
    let y = LETTER_HEIGHT_PT - (field.y_mm + BASELINE_OFFSET_MM) * POINTS_PER_MM;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![FONT_KEY.into(), FONT_SIZE.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new(
      "Tj",
      vec![Object::String(win_ansi(&field.text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
  }
  ops
}

fn helvetica() -> Dictionary {
  dictionary! {
    "Type" => "Font",
    "Subtype" => "Type1",
    "BaseFont" => "Helvetica",
    "Encoding" => "WinAnsiEncoding",
  }
}

fn blank_letter(overlay: Vec<Operation>) -> Result<Document, InvoiceError> {
  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();
  let font_id = doc.add_object(helvetica());
  let resources_id = doc.add_object(dictionary! {
    "Font" => dictionary! { FONT_KEY => font_id },
  });
  let content = Content { operations: overlay };
  let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
  let page_id = doc.add_object(dictionary! {
    "Type" => "Page",
    "Parent" => pages_id,
    "Contents" => content_id,
  });
  let pages = dictionary! {
    "Type" => "Pages",
    "Kids" => vec![page_id.into()],
    "Count" => 1,
    "Resources" => resources_id,
    "MediaBox" => vec![0.into(), 0.into(), LETTER_WIDTH_PT.into(), (LETTER_HEIGHT_PT as i64).into()],
  };
  doc.objects.insert(pages_id, Object::Dictionary(pages));
  let catalog_id = doc.add_object(dictionary! {
    "Type" => "Catalog",
    "Pages" => pages_id,
  });
  doc.trailer.set("Root", catalog_id);
  Ok(doc)
}

/// Follows a reference to the dictionary it points at, or returns the inline one.
fn resolve_dict(doc: &Document, object: &Object) -> Result<Dictionary, InvoiceError> {
  let object = match object {
    Object::Reference(id) => doc.get_object(*id)?,
    other => other,
  };
  Ok(object.as_dict()?.clone())
}

/// The page's resources, inherited from an ancestor `Pages` node when absent.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, InvoiceError> {
  let mut node_id = page_id;
  loop {
    let node = doc.get_object(node_id)?.as_dict()?;
    if let Ok(resources) = node.get(b"Resources") {
      return resolve_dict(doc, resources);
    }
    match node.get(b"Parent").and_then(Object::as_reference) {
      Ok(parent) => node_id = parent,
      Err(_) => return Ok(Dictionary::new()),
    }
  }
}

fn overlay_first_page(mut doc: Document, overlay: Vec<Operation>) -> Result<Document, InvoiceError> {
  let page_id = *doc
    .get_pages()
    .values()
    .next()
    .ok_or_else(|| InvoiceError::Template("template has no pages".to_string()))?;

  let font_id = doc.add_object(helvetica());
  let mut resources = effective_resources(&doc, page_id)?;
  let mut fonts = match resources.get(b"Font") {
    Ok(fonts) => resolve_dict(&doc, fonts)?,
    Err(_) => Dictionary::new(),
  };
  fonts.set(FONT_KEY, font_id);
  resources.set("Font", fonts);

  // Isolate the template's graphics state from the overlay.
  let save_id = doc.add_object(Stream::new(
    dictionary! {},
    Content {
      operations: vec![Operation::new("q", vec![])],
    }
    .encode()?,
  ));
  let mut overlay_ops = vec![Operation::new("Q", vec![])];
  overlay_ops.extend(overlay);
  let overlay_id = doc.add_object(Stream::new(dictionary! {}, Content { operations: overlay_ops }.encode()?));

  let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
  let mut contents: Vec<Object> = vec![save_id.into()];
  match page.get(b"Contents") {
    Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
    Ok(existing) => contents.push(existing.clone()),
    Err(_) => {}
  }
  contents.push(overlay_id.into());
  page.set("Contents", contents);
  page.set("Resources", resources);
  Ok(doc)
}

/// Renders invoices into `{dir}/{order_id}.pdf`.
#[derive(Debug, Clone)]
pub struct InvoiceRenderer {
  dir: PathBuf,
  template: PathBuf,
  currency: String,
}

impl InvoiceRenderer {
  pub fn new(dir: impl Into<PathBuf>, template: impl Into<PathBuf>, currency: impl Into<String>) -> Self {
    Self {
      dir: dir.into(),
      template: template.into(),
      currency: currency.into(),
    }
  }

  pub fn path_for(&self, order_id: i64) -> PathBuf {
    self.dir.join(format!("{}.pdf", order_id))
  }

  #[instrument(name = "invoice::render", skip_all, fields(order_id = data.order_id), err(Display))]
  pub async fn render(&self, data: InvoiceData) -> Result<PathBuf, InvoiceError> {
    let renderer = self.clone();
    tokio::task::spawn_blocking(move || renderer.render_blocking(&data))
      .await
      .map_err(|e| InvoiceError::Task(e.to_string()))?
  }

  fn render_blocking(&self, data: &InvoiceData) -> Result<PathBuf, InvoiceError> {
    let overlay = text_operations(&placements(data, &self.currency));
    let mut doc = if self.template.exists() {
      debug!(template = %self.template.display(), "Overlaying invoice template.");
      let template = Document::load(&self.template).map_err(|e| InvoiceError::Template(e.to_string()))?;
      overlay_first_page(template, overlay)?
    } else {
      warn!(template = %self.template.display(), "Invoice template missing; using a blank Letter page.");
      blank_letter(overlay)?
    };

    std::fs::create_dir_all(&self.dir)?;
    let path = self.path_for(data.order_id);
    doc.save(&path)?;
    info!(path = %path.display(), "Invoice written.");
    Ok(path)
  }
}
