// sagaflow/src/flow/mod.rs

//! Defines the `Flow<TData, Err>` struct, its construction, and execution.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Flow;
