pub mod context_data;
pub mod control;
pub mod handler;
pub mod step;

pub use context_data::ContextData;
pub use control::{Control, Outcome};
pub use handler::{Compensation, Handler};
pub use step::{Effect, SkipCondition, StepDef};
