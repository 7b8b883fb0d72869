//! Operation types for memoized steps.
//!
//! An [`Operation`] is the record of one step: its deterministic id, the name
//! the function gave it, and how it ended. The orchestrator hands previously
//! completed operations back on every delivery so that steps can be replayed
//! instead of executed again.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorObject;

/// Represents a memoized step in an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Deterministic identifier derived from the step name
    #[serde(rename = "id")]
    pub operation_id: String,

    /// Step name as given by the function, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Current status of the operation
    pub status: OperationStatus,

    /// Result data if the operation succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error details if the operation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Operation {
    /// Creates a started Operation with the given ID.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            name: None,
            status: OperationStatus::Started,
            data: None,
            error: None,
        }
    }

    /// Sets the name for this operation.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the operation succeeded with the given data.
    pub fn succeeded(mut self, data: Value) -> Self {
        self.status = OperationStatus::Succeeded;
        self.data = Some(data);
        self.error = None;
        self
    }

    /// Marks the operation failed with the given error.
    pub fn failed(mut self, error: ErrorObject) -> Self {
        self.status = OperationStatus::Failed;
        self.data = None;
        self.error = Some(error);
        self
    }

    /// Rebuilds an operation from the memoized value the orchestrator sends.
    ///
    /// Accepted shapes are `{"data": ...}`, `{"error": {...}}` and a bare value,
    /// which is treated as successful data.
    pub fn from_memoized(operation_id: impl Into<String>, value: &Value) -> Self {
        let op = Operation::new(operation_id);
        if let Value::Object(map) = value {
            if let Some(error) = map.get("error") {
                let error = serde_json::from_value::<ErrorObject>(error.clone())
                    .unwrap_or_else(|_| ErrorObject::new("Error", error.to_string()));
                return op.failed(error);
            }
            if let Some(data) = map.get("data") {
                let op = op.succeeded(data.clone());
                return match map.get("name").and_then(Value::as_str) {
                    Some(name) => op.with_name(name),
                    None => op,
                };
            }
        }
        op.succeeded(value.clone())
    }
}

/// The status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Checkpointed before execution, outcome not yet known
    Started,
    /// Completed with a result
    Succeeded,
    /// Completed with an error
    Failed,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "Started"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_operation_is_started() {
        let op = Operation::new("op-1");
        assert_eq!(op.status, OperationStatus::Started);
        assert!(op.name.is_none());
    }

    #[test]
    fn test_from_memoized_data_shape() {
        let op = Operation::from_memoized("op-1", &json!({"data": "Hello, Ada!"}));
        assert_eq!(op.status, OperationStatus::Succeeded);
        assert_eq!(op.data, Some(json!("Hello, Ada!")));
    }

    #[test]
    fn test_from_memoized_error_shape() {
        let op = Operation::from_memoized(
            "op-1",
            &json!({"error": {"name": "Error", "message": "boom"}}),
        );
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.error, Some(ErrorObject::new("Error", "boom")));
    }

    #[test]
    fn test_from_memoized_bare_value() {
        let op = Operation::from_memoized("op-1", &json!(true));
        assert_eq!(op.status, OperationStatus::Succeeded);
        assert_eq!(op.data, Some(json!(true)));
    }

    #[test]
    fn test_from_memoized_keeps_name() {
        let op = Operation::from_memoized("op-1", &json!({"data": 1, "name": "hello-world"}));
        assert_eq!(op.name.as_deref(), Some("hello-world"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let op = Operation::new("op-1").with_name("s").succeeded(json!(42));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value, json!({"id": "op-1", "name": "s", "status": "Succeeded", "data": 42}));
    }
}
