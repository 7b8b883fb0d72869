//! Mock implementation of [`StepTool`] for testing.
//!
//! # Examples
//!
//! ```
//! use chainflow_engine_testing::MockStepTool;
//! use chainflow_engine::DurableError;
//! use serde_json::json;
//!
//! // Executes every step inline
//! let tool = MockStepTool::new();
//!
//! // Replays "hello-world" from memo, executes everything else
//! let tool = MockStepTool::new().with_memoized("hello-world", json!("Hello, Ada!"));
//!
//! // Fails every step without executing it
//! let tool = MockStepTool::new().with_failure(DurableError::execution("unavailable"));
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chainflow_engine::{DurableError, DurableResult, StepContext, StepFn, StepTool};
use serde_json::Value;

/// Record of one `run_step` call made to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCall {
    /// The step name passed to `run_step`
    pub name: String,
    /// Whether the step closure ran
    pub executed: bool,
}

/// Step tool that runs closures inline and records every call.
///
/// The mock can be pre-seeded with memoized results, which are returned
/// without running the closure, or configured to fail every step.
#[derive(Debug, Default)]
pub struct MockStepTool {
    memoized: Mutex<HashMap<String, Value>>,
    failure: Mutex<Option<DurableError>>,
    calls: Mutex<Vec<StepCall>>,
}

impl MockStepTool {
    /// Creates a mock that executes every step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `value` for the step `name` instead of running it.
    pub fn with_memoized(self, name: impl Into<String>, value: Value) -> Self {
        self.memoized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), value);
        self
    }

    /// Makes every step fail with `error` without running.
    pub fn with_failure(self, error: DurableError) -> Self {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    /// Returns every recorded call, in order.
    pub fn get_calls(&self) -> Vec<StepCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `run_step` calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of calls whose closure actually ran.
    pub fn executed_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.executed)
            .count()
    }

    /// Clears recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, name: &str, executed: bool) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(StepCall {
                name: name.to_string(),
                executed,
            });
    }
}

#[async_trait]
impl StepTool for MockStepTool {
    async fn run_step(&self, name: &str, work: StepFn) -> DurableResult<Value> {
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(error) = failure {
            self.record(name, false);
            return Err(error);
        }

        let memoized = self
            .memoized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        if let Some(value) = memoized {
            tracing::debug!(step = name, "Mock replaying memoized step");
            self.record(name, false);
            return Ok(value);
        }

        self.record(name, true);
        work(StepContext::new(name, "mock-run").with_name(name))
            .map_err(|e| DurableError::user_code(e.to_string()))
    }
}
