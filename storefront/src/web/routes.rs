// storefront/src/web/routes.rs

use crate::web::handlers::{admin_handlers, auth_handlers, invoice_handlers, payment_handlers, widget_handlers};
use crate::web::response::ok_message;
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  ok_message("ok")
}

/// Mounts every endpoint under `/api`. Admin routes authenticate through the
/// `AuthenticatedUser` extractor in each handler.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      // Storefront
      .route("/payment-intent", web::post().to(payment_handlers::payment_intent_handler))
      .route("/widget/{id}", web::get().to(widget_handlers::get_widget_handler))
      .route(
        "/create-customer-and-subscribe-to-plan",
        web::post().to(payment_handlers::subscribe_handler),
      )
      .route("/payment-succeeded", web::post().to(payment_handlers::payment_succeeded_handler))
      .route(
        "/virtual-terminal-succeeded",
        web::post().to(payment_handlers::virtual_terminal_succeeded_handler),
      )
      // Accounts
      .route("/authenticate", web::post().to(auth_handlers::authenticate_handler))
      .route("/is-authenticated", web::post().to(auth_handlers::is_authenticated_handler))
      .route("/forgot-password", web::post().to(auth_handlers::forgot_password_handler))
      .route("/reset-password", web::post().to(auth_handlers::reset_password_handler))
      // Back office
      .service(
        web::scope("/admin")
          .route("/all-sales", web::post().to(admin_handlers::all_sales_handler))
          .route("/all-subscriptions", web::post().to(admin_handlers::all_subscriptions_handler))
          .route("/get-sale/{id}", web::post().to(admin_handlers::get_sale_handler))
          .route("/refund", web::post().to(admin_handlers::refund_handler))
          .route("/cancel-subscription", web::post().to(admin_handlers::cancel_subscription_handler))
          .route("/invoice", web::post().to(invoice_handlers::create_and_send_invoice_handler))
          .route("/reconciliation", web::get().to(admin_handlers::list_reconciliation_handler))
          .route("/reconciliation/sweep", web::post().to(admin_handlers::run_reconciliation_handler)),
      ),
  );
}
