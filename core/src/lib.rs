// sagaflow/src/lib.rs

//! sagaflow: async step flows for multi-step business transactions.
//!
//! A [`Flow`] is an ordered list of named steps operating on a shared
//! [`ContextData<T>`]. Each step declares the kind of side effect it has
//! ([`Effect`]), which lets the engine:
//!  - open a write-ahead [`Journal`] entry before the first external call,
//!  - record every committed remote step,
//!  - run compensation handlers in reverse order when a later step fails,
//!  - report failures after a settlement as [`FlowError::PartialCommit`]
//!    instead of an ordinary error.
//!
//! Flows are registered in a [`Flows`] registry keyed by their context type.

pub mod core;
pub mod error;
pub mod flow;
pub mod journal;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{Control, Outcome};
pub use crate::core::handler::{Compensation, Handler};
pub use crate::core::step::{Effect, SkipCondition, StepDef};

pub use crate::flow::definition::Flow;

pub use crate::error::{FlowError, FlowResult};
pub use crate::journal::{Journal, JournalId, JournalState};
pub use crate::registry::Flows;

/*
    Typical usage:
    1. Define a context struct `MyCtx` for the business operation.
    2. Create a `Flow<MyCtx, MyErr>` with its steps and their effects.
    3. Register handlers with `.on_step()` and, for settlement steps that can
       be undone, `.compensate_step()`.
    4. Optionally attach a journal with `.with_journal()` plus a subject
       description with `.describe_with()`.
    5. Register the flow with a `Flows<MyErr>` registry and call
       `flows.run(ContextData::new(my_ctx)).await`.
*/
