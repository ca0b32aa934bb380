// storefront/src/services/mod.rs

//! Clients for everything outside the process: payments, persistence, mail, files.

pub mod auth_service;
pub mod email_mock;
pub mod gateway;
pub mod invoice_pdf;
pub mod mailer;
pub mod memory_store;
pub mod payment_mock;
pub mod pg_store;
pub mod reset_tokens;
pub mod store;
pub mod stripe_client;

pub use gateway::PaymentGateway;
pub use mailer::Mailer;
pub use store::Store;
