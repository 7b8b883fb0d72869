//! Testing utilities for chainflow-engine functions.
//!
//! # Features
//!
//! - **MockStepTool**: a [`StepTool`](chainflow_engine::StepTool) that runs
//!   steps inline, records every call, and can replay or fail steps on demand
//! - **LocalTestRunner**: runs a handler in-process, then replays it against
//!   the operations it recorded
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chainflow_engine::{DurableContext, EventPayload};
//! use chainflow_engine::functions::hello_world::greet;
//! use chainflow_engine_testing::MockStepTool;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let tool = Arc::new(MockStepTool::new());
//! let ctx = DurableContext::new(tool.clone(), "run-1");
//!
//! let result = greet(&EventPayload::from_value(json!({"name": "Ada"})), &ctx).await.unwrap();
//!
//! assert_eq!(result.message, "Hello, Ada!");
//! assert_eq!(tool.executed_count(), 1);
//! # });
//! ```

pub mod local_runner;
pub mod mock_step;

pub use local_runner::{ExecutionStatus, LocalTestRunner, TestResult};
pub use mock_step::{MockStepTool, StepCall};

pub use chainflow_engine::{
    DurableContext, DurableError, DurableResult, Event, EventPayload, Input, Operation,
    OperationStatus,
};
