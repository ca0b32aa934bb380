// storefront/src/lib.rs

//! Widgets storefront backend: Stripe charges and subscriptions, refunds,
//! invoices and back-office auth, each run as a `sagaflow` flow.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;
