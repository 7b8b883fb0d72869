//! Local test runner for durable functions.
//!
//! [`LocalTestRunner`] runs a function handler in-process against a fresh
//! [`ExecutionState`], keeps the operations it recorded, and can replay the
//! function against them the way the orchestrator would on redelivery.
//!
//! # Examples
//!
//! ```
//! use chainflow_engine::functions::hello_world::hello_world;
//! use chainflow_engine::Event;
//! use chainflow_engine_testing::{ExecutionStatus, LocalTestRunner};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut runner = LocalTestRunner::new(hello_world);
//! let event = Event::new("hello.world", json!({"name": "Ada"}));
//!
//! let first = runner.run(event.clone()).await;
//! assert_eq!(first.get_status(), ExecutionStatus::Succeeded);
//! assert_eq!(first.executed_count(), 1);
//!
//! let replayed = runner.replay(event).await;
//! assert_eq!(replayed.executed_count(), 0);
//! assert_eq!(replayed.replayed_count(), 1);
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use chainflow_engine::{
    DurableContext, DurableError, DurableResult, Event, ExecutionState, ExecutionStepTool, Input,
    Operation, OperationStatus, StepConfig,
};

/// Status of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The handler returned a result
    Succeeded,
    /// The handler returned an error
    Failed,
    /// The handler observed cancellation
    Cancelled,
}

/// Outcome of one run of a handler.
#[derive(Debug)]
pub struct TestResult<T> {
    result: DurableResult<T>,
    operations: Vec<Operation>,
    replayed: usize,
}

impl<T> TestResult<T> {
    /// The status of the run.
    pub fn get_status(&self) -> ExecutionStatus {
        match &self.result {
            Ok(_) => ExecutionStatus::Succeeded,
            Err(e) if e.is_cancelled() => ExecutionStatus::Cancelled,
            Err(_) => ExecutionStatus::Failed,
        }
    }

    /// The handler result, if it succeeded.
    pub fn get_result(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The handler error, if it failed.
    pub fn get_error(&self) -> Option<&DurableError> {
        self.result.as_ref().err()
    }

    /// Consumes the result and returns the handler outcome.
    pub fn into_result(self) -> DurableResult<T> {
        self.result
    }

    /// Operations checkpointed during this run, in execution order.
    pub fn get_operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The first operation checkpointed under the step `name`.
    pub fn get_operation(&self, name: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.name.as_deref() == Some(name))
    }

    /// Number of steps whose closure ran during this run.
    pub fn executed_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.status != OperationStatus::Started)
            .count()
    }

    /// Number of steps served from the memoized state.
    pub fn replayed_count(&self) -> usize {
        self.replayed
    }
}

/// Runs a function handler in-process and replays it from its own history.
pub struct LocalTestRunner<F> {
    handler: F,
    run_id: String,
    step_config: StepConfig,
    recorded: Vec<Operation>,
}

impl<F> LocalTestRunner<F> {
    /// Creates a runner for `handler`.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            run_id: "local-run".to_string(),
            step_config: StepConfig::default(),
            recorded: Vec::new(),
        }
    }

    /// Sets the run id handed to the handler.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Sets the step configuration of the step tool.
    pub fn with_step_config(mut self, step_config: StepConfig) -> Self {
        self.step_config = step_config;
        self
    }

    /// Every operation recorded so far, memoized and new.
    pub fn recorded_operations(&self) -> &[Operation] {
        &self.recorded
    }

    /// Forgets the recorded history.
    pub fn reset(&mut self) {
        self.recorded.clear();
    }

    /// Runs the handler against an empty memo table.
    pub async fn run<Fut, T>(&mut self, event: Event) -> TestResult<T>
    where
        F: Fn(Input, DurableContext) -> Fut,
        Fut: Future<Output = DurableResult<T>>,
    {
        self.recorded.clear();
        self.execute(event).await
    }

    /// Runs the handler against the operations recorded by earlier runs.
    pub async fn replay<Fut, T>(&mut self, event: Event) -> TestResult<T>
    where
        F: Fn(Input, DurableContext) -> Fut,
        Fut: Future<Output = DurableResult<T>>,
    {
        self.execute(event).await
    }

    async fn execute<Fut, T>(&mut self, event: Event) -> TestResult<T>
    where
        F: Fn(Input, DurableContext) -> Fut,
        Fut: Future<Output = DurableResult<T>>,
    {
        let state = Arc::new(ExecutionState::new(&self.run_id, self.recorded.clone()));
        let tool = ExecutionStepTool::new(state.clone()).with_config(self.step_config.clone());
        let ctx = DurableContext::new(Arc::new(tool), &self.run_id);

        tracing::debug!(run_id = %self.run_id, memoized = self.recorded.len(), "Local run starting");
        let result = (self.handler)(Input::new(event, &self.run_id), ctx).await;

        self.recorded = state.operations().await;
        TestResult {
            result,
            operations: state.new_operations().await,
            replayed: state.replayed_count().await,
        }
    }
}
