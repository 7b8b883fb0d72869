//! # chainflow engine
//!
//! The engine serves durable functions to an Inngest-style orchestration
//! service. It declares functions with event triggers, announces them to the
//! orchestrator, and runs them when the orchestrator calls back over HTTP.
//!
//! ## Overview
//!
//! Durability belongs to the orchestrator. Every delivery of a run carries
//! the outcomes of the steps that already completed, and the engine replays
//! those outcomes instead of executing the steps again. A function only has
//! to route its side effects through [`DurableContext::step_named`]:
//!
//! - **Memoized steps**: a step that succeeded in an earlier delivery returns
//!   its recorded result without running its closure.
//! - **Deterministic ids**: step ids are a blake2b hash of the step name plus
//!   its occurrence count, so replays line up with the recorded state.
//! - **Injectable step tool**: [`StepTool`] is the seam between function code
//!   and the memo table, so functions can be tested without a server.
//! - **Cancellation**: every invocation owns a cancellation token; a cancelled
//!   context refuses to start new steps.
//!
//! ## Writing a function
//!
//! ```rust,no_run
//! use chainflow_engine::{
//!     create_function, Client, ClientOpts, DurableContext, DurableResult, FunctionOpts, Input,
//!     Trigger,
//! };
//!
//! async fn greet(input: Input, ctx: DurableContext) -> DurableResult<String> {
//!     let name = input.event.data.str_field_or("name", "world").to_string();
//!     ctx.step_named("greet", move |_| Ok(format!("Hello, {}!", name))).await
//! }
//!
//! # async fn run() -> DurableResult<()> {
//! let mut client = Client::new(ClientOpts::new("core"))?;
//! create_function(
//!     &mut client,
//!     FunctionOpts::new("greet", "Greet"),
//!     Trigger::event("app/greet"),
//!     greet,
//! )?;
//!
//! let listener = chainflow_engine::serve::bind("0.0.0.0:8080".parse().unwrap()).await?;
//! chainflow_engine::serve::serve(listener, client.serve()).await
//! # }
//! ```
//!
//! ## Step semantics
//!
//! [`StepSemantics::AtMostOncePerRetry`] (the default) records a `Started`
//! operation before the closure runs; [`StepSemantics::AtLeastOncePerRetry`]
//! records only the outcome. Either way, a step whose memoized name differs
//! from the name requested at the same position fails with
//! [`DurableError::NonDeterministic`].

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod function;
pub mod functions;
pub mod handlers;
pub mod invocation;
pub mod logging;
pub mod operation;
pub mod serdes;
pub mod serve;
pub mod state;

pub use client::{Client, ClientOpts, RegistrationRequest};
pub use config::{EngineConfig, StepConfig, StepSemantics};
pub use context::{
    generate_operation_id, BoxError, DurableContext, ExecutionStepTool, LogInfo, Logger,
    OperationIdGenerator, OperationIdentifier, SharedStepTool, StepFn, StepTool, TracingLogger,
};
pub use error::{DurableError, DurableResult, ErrorObject};
pub use event::{Event, EventPayload};
pub use function::{create_function, FunctionConfig, FunctionOpts, Input, ServableFunction, Trigger};
pub use handlers::{step_handler, StepContext};
pub use invocation::{InvocationMetadata, InvocationOutput, InvocationRequest, InvocationStatus};
pub use operation::{Operation, OperationStatus};
pub use serdes::{JsonSerDes, SerDes, SerDesContext, SerDesError};
pub use serve::ServeHandler;
pub use state::{CheckpointedResult, ExecutionState};
