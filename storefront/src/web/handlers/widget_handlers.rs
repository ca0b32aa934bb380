// storefront/src/web/handlers/widget_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::response::ok_content;

#[instrument(name = "handler::get_widget", skip(app_state, path), fields(widget_id = %path.as_ref()))]
pub async fn get_widget_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let widget_id = path.into_inner();

  let widget = app_state
    .store
    .get_widget(widget_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("widget {} not found", widget_id)))?;

  info!(widget_name = %widget.name, "Widget fetched.");
  Ok(ok_content("", widget))
}
