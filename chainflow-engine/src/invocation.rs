//! Wire types for function invocations.
//!
//! The orchestrator POSTs an [`InvocationRequest`] for every delivery of a run
//! and receives an [`InvocationOutput`] back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DurableError, ErrorObject};
use crate::event::Event;
use crate::operation::Operation;

/// Input payload for a function invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationRequest {
    /// The triggering event
    pub event: Event,

    /// Every event of a batched invocation; empty for single-event runs
    #[serde(default)]
    pub events: Vec<Event>,

    /// Memoized step outcomes keyed by operation id
    #[serde(default)]
    pub steps: Map<String, Value>,

    /// Run metadata
    #[serde(default)]
    pub ctx: InvocationMetadata,
}

impl InvocationRequest {
    /// Creates a request for a first delivery of `event`.
    pub fn new(event: Event) -> Self {
        Self {
            event,
            events: Vec::new(),
            steps: Map::new(),
            ctx: InvocationMetadata::default(),
        }
    }

    /// Seeds the request with memoized step outcomes.
    pub fn with_steps(mut self, steps: Map<String, Value>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.ctx.run_id = Some(run_id.into());
        self
    }
}

/// Run metadata attached to an invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationMetadata {
    /// The run id assigned by the orchestrator
    #[serde(default)]
    pub run_id: Option<String>,

    /// Attempt number of this delivery (0-indexed)
    #[serde(default)]
    pub attempt: u32,
}

/// Status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    /// The function returned a result
    Succeeded,
    /// The function returned an error
    Failed,
}

/// Output payload for a function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationOutput {
    /// The status of the invocation
    pub status: InvocationStatus,

    /// The function result if the invocation succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details if the invocation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,

    /// Steps executed for the first time during this delivery
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl InvocationOutput {
    /// Creates a new output indicating successful completion.
    pub fn succeeded(result: Value, operations: Vec<Operation>) -> Self {
        Self {
            status: InvocationStatus::Succeeded,
            result: Some(result),
            error: None,
            operations,
        }
    }

    /// Creates a new output indicating failure.
    pub fn failed(error: ErrorObject, operations: Vec<Operation>) -> Self {
        Self {
            status: InvocationStatus::Failed,
            result: None,
            error: Some(error),
            operations,
        }
    }

    /// Creates an output from the function outcome.
    pub fn from_outcome(outcome: &Result<Value, DurableError>, operations: Vec<Operation>) -> Self {
        match outcome {
            Ok(value) => Self::succeeded(value.clone(), operations),
            Err(error) => Self::failed(ErrorObject::from(error), operations),
        }
    }

    /// Returns true if the invocation succeeded.
    pub fn is_succeeded(&self) -> bool {
        matches!(self.status, InvocationStatus::Succeeded)
    }

    /// Returns true if the invocation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, InvocationStatus::Failed)
    }
}
