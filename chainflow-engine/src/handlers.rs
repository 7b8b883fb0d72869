//! Operation handlers for the chainflow engine.
//!
//! Only steps exist as durable operations; sleeps, event waits and child
//! invocations are left to the orchestrator.

pub mod step;

pub use step::{step_handler, StepContext};
