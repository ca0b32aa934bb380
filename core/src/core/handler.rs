// sagaflow/src/core/handler.rs

use crate::core::context_data::ContextData;
use crate::core::control::Control;
use std::future::Future;
use std::pin::Pin;

/// A step handler: takes a clone of the flow's [`ContextData`] and resolves
/// to a [`Control`] signal or the flow's error type.
///
/// Handlers copy what they need out of the context, drop the guard, and only
/// then await I/O.
pub type Handler<TData, Err> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<Control, Err>> + Send>> + Send + Sync>;

/// A compensation undoes (or neutralizes) a committed step. Its own failure
/// is reported as a plain `anyhow::Error` because it never replaces the
/// error that triggered it.
pub type Compensation<TData> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;
