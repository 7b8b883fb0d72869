//! Step operation handler.
//!
//! This module implements the local step semantics: replay a memoized outcome
//! when one exists, otherwise execute the step once and checkpoint the result
//! into the invocation's [`ExecutionState`].

use std::sync::Arc;

use serde_json::Value;

use crate::config::{StepConfig, StepSemantics};
use crate::context::{LogInfo, Logger, OperationIdentifier, StepFn};
use crate::error::{DurableError, DurableResult, ErrorObject, USER_CODE_ERROR_TYPE};
use crate::operation::Operation;
use crate::state::{CheckpointedResult, ExecutionState};

/// Context provided to step functions during execution.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// The operation identifier for this step
    pub operation_id: String,
    /// The name of the step, if provided
    pub name: Option<String>,
    /// The run the step belongs to
    pub run_id: String,
    /// The current attempt (0-indexed)
    pub attempt: u32,
}

impl StepContext {
    /// Creates a new StepContext.
    pub fn new(operation_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            name: None,
            run_id: run_id.into(),
            attempt: 0,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Executes a step with memoization.
///
/// - A memoized `Succeeded` outcome is returned without calling `func`.
/// - A memoized `Failed` outcome is returned as [`DurableError::UserCode`].
/// - A memoized outcome recorded under a different step name is a
///   [`DurableError::NonDeterministic`] error.
/// - Otherwise `func` runs once. With [`StepSemantics::AtMostOncePerRetry`]
///   a `Started` checkpoint is written before it runs.
pub async fn step_handler(
    func: StepFn,
    state: &Arc<ExecutionState>,
    op_id: &OperationIdentifier,
    config: &StepConfig,
    logger: &Arc<dyn Logger>,
) -> DurableResult<Value> {
    let log_info = LogInfo::new(state.run_id())
        .with_operation_id(&op_id.operation_id)
        .with_step_name(&op_id.name);

    logger.debug(&format!("Starting step operation: {}", op_id), &log_info);

    let checkpoint_result = state.get_checkpoint_result(&op_id.operation_id).await;
    if let Some(result) = handle_replay(&checkpoint_result, state, op_id, logger, &log_info).await? {
        return Ok(result);
    }

    let step_ctx = StepContext::new(&op_id.operation_id, state.run_id())
        .with_name(&op_id.name)
        .with_attempt(state.attempt());

    if config.step_semantics == StepSemantics::AtMostOncePerRetry {
        logger.debug("Checkpointing step start (AT_MOST_ONCE)", &log_info);
        state.checkpoint(base_operation(op_id)).await;
    } else {
        logger.debug("Executing step (AT_LEAST_ONCE)", &log_info);
    }

    match func(step_ctx) {
        Ok(value) => {
            state
                .checkpoint(base_operation(op_id).succeeded(value.clone()))
                .await;
            logger.debug("Step completed successfully", &log_info);
            Ok(value)
        }
        Err(error) => {
            let error_obj = ErrorObject::new(USER_CODE_ERROR_TYPE, error.to_string());
            state.checkpoint(base_operation(op_id).failed(error_obj)).await;
            logger.error(&format!("Step failed: {}", error), &log_info);
            Err(DurableError::user_code(error.to_string()))
        }
    }
}

/// Returns the memoized result when the step already completed.
async fn handle_replay(
    checkpoint_result: &CheckpointedResult,
    state: &Arc<ExecutionState>,
    op_id: &OperationIdentifier,
    logger: &Arc<dyn Logger>,
    log_info: &LogInfo,
) -> DurableResult<Option<Value>> {
    if !checkpoint_result.is_existent() {
        return Ok(None);
    }

    if let Some(recorded) = checkpoint_result.name() {
        if recorded != op_id.name {
            return Err(DurableError::NonDeterministic {
                message: format!(
                    "Expected step '{}' but found '{}' at operation_id {}",
                    op_id.name, recorded, op_id.operation_id
                ),
                operation_id: Some(op_id.operation_id.clone()),
            });
        }
    }

    if checkpoint_result.is_succeeded() {
        logger.debug(&format!("Replaying succeeded step: {}", op_id), log_info);
        state.track_replay(&op_id.operation_id).await;
        return Ok(Some(checkpoint_result.result().cloned().unwrap_or(Value::Null)));
    }

    if checkpoint_result.is_failed() {
        logger.debug(&format!("Replaying failed step: {}", op_id), log_info);
        state.track_replay(&op_id.operation_id).await;
        return Err(match checkpoint_result.error() {
            Some(error) => DurableError::from(error.clone()),
            None => DurableError::execution("Step failed with unknown error"),
        });
    }

    // Started but never finished: run it again.
    Ok(None)
}

fn base_operation(op_id: &OperationIdentifier) -> Operation {
    Operation::new(&op_id.operation_id).with_name(&op_id.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TracingLogger;
    use crate::operation::OperationStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_state(memoized: Vec<Operation>) -> Arc<ExecutionState> {
        Arc::new(ExecutionState::new("run-test", memoized))
    }

    fn create_test_op_id() -> OperationIdentifier {
        OperationIdentifier::new("test-op-123", "test-step")
    }

    fn create_test_logger() -> Arc<dyn Logger> {
        Arc::new(TracingLogger)
    }

    fn counting(counter: Arc<AtomicUsize>, value: Value) -> StepFn {
        Box::new(move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    #[test]
    fn test_step_context_builders() {
        let ctx = StepContext::new("op-123", "run-1").with_name("my-step").with_attempt(3);
        assert_eq!(ctx.operation_id, "op-123");
        assert_eq!(ctx.run_id, "run-1");
        assert_eq!(ctx.name.as_deref(), Some("my-step"));
        assert_eq!(ctx.attempt, 3);
    }

    #[tokio::test]
    async fn test_step_handler_success_checkpoints_result() {
        let state = create_test_state(Vec::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let result = step_handler(
            counting(counter.clone(), json!(42)),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap(), json!(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let new_ops = state.new_operations().await;
        assert_eq!(new_ops.len(), 1);
        assert_eq!(new_ops[0].status, OperationStatus::Succeeded);
        assert_eq!(new_ops[0].name.as_deref(), Some("test-step"));
    }

    #[tokio::test]
    async fn test_step_handler_failure() {
        let state = create_test_state(Vec::new());

        let result = step_handler(
            Box::new(|_ctx| Err("boom".into())),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap_err(), DurableError::user_code("boom"));
        let op = state.get_checkpoint_result("test-op-123").await;
        assert!(op.is_failed());
    }

    #[tokio::test]
    async fn test_step_handler_replays_without_executing() {
        let memoized = Operation::new("test-op-123")
            .with_name("test-step")
            .succeeded(json!("cached"));
        let state = create_test_state(vec![memoized]);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = step_handler(
            counting(counter.clone(), json!("fresh")),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap(), json!("cached"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(state.is_replayed("test-op-123").await);
        assert!(state.new_operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_step_handler_replays_failure() {
        let memoized = Operation::new("test-op-123")
            .failed(ErrorObject::new("UserCodeError", "earlier failure"));
        let state = create_test_state(vec![memoized]);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = step_handler(
            counting(counter.clone(), json!(1)),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap_err(), DurableError::user_code("earlier failure"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_step_handler_name_mismatch_is_non_deterministic() {
        let memoized = Operation::new("test-op-123")
            .with_name("another-step")
            .succeeded(json!(1));
        let state = create_test_state(vec![memoized]);

        let result = step_handler(
            Box::new(|_ctx| Ok(json!(2))),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert!(matches!(result, Err(DurableError::NonDeterministic { .. })));
    }

    #[tokio::test]
    async fn test_step_handler_reruns_started_step() {
        let memoized = Operation::new("test-op-123").with_name("test-step");
        let state = create_test_state(vec![memoized]);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = step_handler(
            counting(counter.clone(), json!("again")),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap(), json!("again"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_step_handler_passes_attempt_to_step() {
        let state = Arc::new(ExecutionState::new("run-test", Vec::new()).with_attempt(2));

        let result = step_handler(
            Box::new(|ctx| Ok(json!(ctx.attempt))),
            &state,
            &create_test_op_id(),
            &StepConfig::default(),
            &create_test_logger(),
        )
        .await;

        assert_eq!(result.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_step_handler_at_least_once_skips_start_checkpoint() {
        let state = create_test_state(Vec::new());
        let config = StepConfig::with_semantics(StepSemantics::AtLeastOncePerRetry);

        step_handler(
            Box::new(|ctx| {
                assert_eq!(ctx.name.as_deref(), Some("test-step"));
                Ok(json!(null))
            }),
            &state,
            &create_test_op_id(),
            &config,
            &create_test_logger(),
        )
        .await
        .unwrap();

        assert!(state.get_checkpoint_result("test-op-123").await.is_succeeded());
    }
}
