//! Memoized execution state for a single invocation.
//!
//! The orchestrator sends the outcome of every step completed in earlier
//! deliveries of a run. [`ExecutionState`] holds those outcomes keyed by
//! operation id, records the outcome of steps executed during this delivery,
//! and tracks which memoized steps were replayed.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::context::{OperationIdGenerator, OperationIdentifier};
use crate::error::ErrorObject;
use crate::operation::{Operation, OperationStatus};

/// Result of looking up an operation in the memoized state.
#[derive(Debug, Clone, Default)]
pub struct CheckpointedResult {
    operation: Option<Operation>,
}

impl CheckpointedResult {
    /// Creates a new CheckpointedResult.
    pub fn new(operation: Option<Operation>) -> Self {
        Self { operation }
    }

    /// Returns true if an operation was memoized under the id.
    pub fn is_existent(&self) -> bool {
        self.operation.is_some()
    }

    /// Returns true if the memoized operation succeeded.
    pub fn is_succeeded(&self) -> bool {
        self.status() == Some(OperationStatus::Succeeded)
    }

    /// Returns true if the memoized operation failed.
    pub fn is_failed(&self) -> bool {
        self.status() == Some(OperationStatus::Failed)
    }

    /// The status of the memoized operation.
    pub fn status(&self) -> Option<OperationStatus> {
        self.operation.as_ref().map(|op| op.status)
    }

    /// The recorded step name, if the orchestrator sent one.
    pub fn name(&self) -> Option<&str> {
        self.operation.as_ref()?.name.as_deref()
    }

    /// The memoized result data.
    pub fn result(&self) -> Option<&Value> {
        self.operation.as_ref()?.data.as_ref()
    }

    /// The memoized error.
    pub fn error(&self) -> Option<&ErrorObject> {
        self.operation.as_ref()?.error.as_ref()
    }
}

/// Memoized state of one invocation.
pub struct ExecutionState {
    /// The run this state belongs to
    run_id: String,

    /// Attempt number of the current delivery (0-indexed)
    attempt: u32,

    /// Map of operation_id to Operation for lookup during replay
    operations: RwLock<HashMap<String, Operation>>,

    /// Operations checkpointed during this delivery, in execution order
    new_operations: Mutex<Vec<Operation>>,

    /// Operation ids that were served from memoized state
    replayed_operations: RwLock<HashSet<String>>,

    /// Assigns ids to steps in call order
    id_generator: OperationIdGenerator,
}

impl ExecutionState {
    /// Creates state for `run_id` seeded with previously memoized operations.
    pub fn new(run_id: impl Into<String>, memoized: impl IntoIterator<Item = Operation>) -> Self {
        let operations = memoized
            .into_iter()
            .map(|op| (op.operation_id.clone(), op))
            .collect();

        Self {
            run_id: run_id.into(),
            attempt: 0,
            operations: RwLock::new(operations),
            new_operations: Mutex::new(Vec::new()),
            replayed_operations: RwLock::new(HashSet::new()),
            id_generator: OperationIdGenerator::new(),
        }
    }

    /// Creates state from the `steps` map of an invocation request.
    pub fn from_memoized_steps(run_id: impl Into<String>, steps: &Map<String, Value>) -> Self {
        Self::new(
            run_id,
            steps
                .iter()
                .map(|(id, value)| Operation::from_memoized(id.as_str(), value)),
        )
    }

    /// Sets the attempt number of the current delivery.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// The run this state belongs to.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The attempt number of the current delivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the identifier for the next step called `name`.
    pub fn next_operation_id(&self, name: &str) -> OperationIdentifier {
        self.id_generator.next_id(name)
    }

    /// Looks up the memoized outcome for `operation_id`.
    pub async fn get_checkpoint_result(&self, operation_id: &str) -> CheckpointedResult {
        let operations = self.operations.read().await;
        CheckpointedResult::new(operations.get(operation_id).cloned())
    }

    /// Records `operation` as the latest state of its step.
    ///
    /// A later checkpoint of the same operation replaces the earlier one in
    /// both the lookup map and the list of new operations.
    pub async fn checkpoint(&self, operation: Operation) {
        {
            let mut new_operations = self.new_operations.lock().await;
            match new_operations
                .iter_mut()
                .find(|op| op.operation_id == operation.operation_id)
            {
                Some(existing) => *existing = operation.clone(),
                None => new_operations.push(operation.clone()),
            }
        }
        let mut operations = self.operations.write().await;
        operations.insert(operation.operation_id.clone(), operation);
    }

    /// Marks `operation_id` as served from memoized state.
    pub async fn track_replay(&self, operation_id: &str) {
        let mut replayed = self.replayed_operations.write().await;
        replayed.insert(operation_id.to_string());
    }

    /// Returns true if `operation_id` was served from memoized state.
    pub async fn is_replayed(&self, operation_id: &str) -> bool {
        self.replayed_operations.read().await.contains(operation_id)
    }

    /// Number of operations served from memoized state.
    pub async fn replayed_count(&self) -> usize {
        self.replayed_operations.read().await.len()
    }

    /// Operations checkpointed during this delivery, in execution order.
    pub async fn new_operations(&self) -> Vec<Operation> {
        self.new_operations.lock().await.clone()
    }

    /// Every operation known to this state: memoized and new.
    pub async fn operations(&self) -> Vec<Operation> {
        self.operations.read().await.values().cloned().collect()
    }
}

impl std::fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionState")
            .field("run_id", &self.run_id)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
