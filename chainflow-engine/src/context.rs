//! Invocation context and the step capability.
//!
//! Functions never talk to the orchestrator directly. They receive a
//! [`DurableContext`] and run their side effects through
//! [`DurableContext::step_named`], which hands the work to whatever
//! [`StepTool`] the context was built with. In production that is an
//! [`ExecutionStepTool`] backed by the memoized state of the current
//! invocation; tests can substitute their own implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blake2::{Blake2b512, Digest};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::StepConfig;
use crate::error::{DurableError, DurableResult};
use crate::handlers::step::{step_handler, StepContext};
use crate::serdes::{JsonSerDes, SerDes, SerDesContext};
use crate::state::ExecutionState;

/// Error type step closures may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased unit of work handed to a [`StepTool`].
pub type StepFn = Box<dyn FnOnce(StepContext) -> Result<Value, BoxError> + Send>;

/// Runs named units of work at most once per invocation.
///
/// Implementations either execute `work` and remember the outcome, or return
/// the remembered outcome without executing it. Failures are returned as-is.
#[async_trait]
pub trait StepTool: Send + Sync {
    /// Runs `work` under the step `name`, or replays its memoized result.
    async fn run_step(&self, name: &str, work: StepFn) -> DurableResult<Value>;
}

/// Shared handle to a step tool.
pub type SharedStepTool = Arc<dyn StepTool>;

/// Context handed to every function invocation.
#[derive(Clone)]
pub struct DurableContext {
    step_tool: SharedStepTool,
    run_id: String,
    attempt: u32,
    cancellation: CancellationToken,
}

impl DurableContext {
    /// Creates a context for the given run.
    pub fn new(step_tool: SharedStepTool, run_id: impl Into<String>) -> Self {
        Self {
            step_tool,
            run_id: run_id.into(),
            attempt: 0,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the attempt number reported by the orchestrator.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Uses `token` to observe cancellation of this invocation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The run id of this invocation.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The attempt number of this invocation (0-indexed).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The token that cancels this invocation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs `func` as the step `name` and returns its typed result.
    ///
    /// If the step has already completed in an earlier delivery of this
    /// invocation, the memoized result is returned and `func` is not called.
    /// A cancelled context fails with [`DurableError::Cancelled`] without
    /// dispatching the step; cancellation while the step runs aborts the wait.
    pub async fn step_named<T, F>(&self, name: &str, func: F) -> DurableResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(StepContext) -> Result<T, BoxError> + Send + 'static,
    {
        if self.cancellation.is_cancelled() {
            return Err(DurableError::cancelled(format!(
                "step '{}' not started, run {} was cancelled",
                name, self.run_id
            )));
        }

        let serdes = JsonSerDes::<T>::new();
        let serdes_ctx = SerDesContext::new(name, &self.run_id);

        let work: StepFn = {
            let serdes = serdes.clone();
            let serdes_ctx = serdes_ctx.clone();
            Box::new(move |step_ctx| {
                let value = func(step_ctx)?;
                Ok(serdes.serialize(&value, &serdes_ctx)?)
            })
        };

        let value = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                return Err(DurableError::cancelled(format!(
                    "step '{}' interrupted, run {} was cancelled",
                    name, self.run_id
                )));
            }
            result = self.step_tool.run_step(name, work) => result?,
        };

        Ok(serdes.deserialize(value, &serdes_ctx)?)
    }
}

impl fmt::Debug for DurableContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableContext")
            .field("run_id", &self.run_id)
            .field("attempt", &self.attempt)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Identifies one step within an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationIdentifier {
    /// Deterministic operation id
    pub operation_id: String,
    /// The step name the id was derived from
    pub name: String,
}

impl OperationIdentifier {
    /// Creates a new OperationIdentifier.
    pub fn new(operation_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for OperationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.operation_id)
    }
}

/// Hashes a step name and its occurrence count into an operation id.
///
/// The first use of a name hashes the name itself; the n-th repeat hashes
/// `name:n`. The id is the hex of the first 20 bytes of a blake2b digest.
pub fn generate_operation_id(name: &str, occurrence: usize) -> String {
    let mut hasher = Blake2b512::new();
    if occurrence == 0 {
        hasher.update(name.as_bytes());
    } else {
        hasher.update(format!("{}:{}", name, occurrence).as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..20])
}

/// Assigns deterministic ids to steps in the order a function asks for them.
#[derive(Debug, Default)]
pub struct OperationIdGenerator {
    seen: Mutex<HashMap<String, usize>>,
}

impl OperationIdGenerator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier for the next use of `name`.
    pub fn next_id(&self, name: &str) -> OperationIdentifier {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let count = seen.entry(name.to_string()).or_insert(0);
        let id = generate_operation_id(name, *count);
        *count += 1;
        OperationIdentifier::new(id, name)
    }
}

/// Structured fields attached to step log records.
#[derive(Debug, Clone, Default)]
pub struct LogInfo {
    /// The run the record belongs to
    pub run_id: String,
    /// The operation the record belongs to
    pub operation_id: Option<String>,
    /// The step name
    pub step_name: Option<String>,
}

impl LogInfo {
    /// Creates LogInfo for a run.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    /// Attaches an operation id.
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Attaches a step name.
    pub fn with_step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }
}

/// Logging seam used by the step handler.
pub trait Logger: Send + Sync {
    /// Logs a debug message.
    fn debug(&self, message: &str, info: &LogInfo);
    /// Logs an info message.
    fn info(&self, message: &str, info: &LogInfo);
    /// Logs an error.
    fn error(&self, message: &str, info: &LogInfo);
}

/// [`Logger`] that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, info: &LogInfo) {
        tracing::debug!(
            run_id = %info.run_id,
            operation_id = info.operation_id.as_deref().unwrap_or(""),
            step = info.step_name.as_deref().unwrap_or(""),
            "{}", message
        );
    }

    fn info(&self, message: &str, info: &LogInfo) {
        tracing::info!(
            run_id = %info.run_id,
            operation_id = info.operation_id.as_deref().unwrap_or(""),
            step = info.step_name.as_deref().unwrap_or(""),
            "{}", message
        );
    }

    fn error(&self, message: &str, info: &LogInfo) {
        tracing::error!(
            run_id = %info.run_id,
            operation_id = info.operation_id.as_deref().unwrap_or(""),
            step = info.step_name.as_deref().unwrap_or(""),
            "{}", message
        );
    }
}

/// [`StepTool`] backed by the memoized state of one invocation.
pub struct ExecutionStepTool {
    state: Arc<ExecutionState>,
    config: StepConfig,
    logger: Arc<dyn Logger>,
}

impl ExecutionStepTool {
    /// Creates a step tool over `state` with default configuration.
    pub fn new(state: Arc<ExecutionState>) -> Self {
        Self {
            state,
            config: StepConfig::default(),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Sets the step configuration.
    pub fn with_config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }

    /// The state this tool memoizes into.
    pub fn state(&self) -> &Arc<ExecutionState> {
        &self.state
    }
}

#[async_trait]
impl StepTool for ExecutionStepTool {
    async fn run_step(&self, name: &str, work: StepFn) -> DurableResult<Value> {
        let op_id = self.state.next_operation_id(name);
        step_handler(work, &self.state, &op_id, &self.config, &self.logger).await
    }
}
