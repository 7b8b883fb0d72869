//! Serialization of step results.
//!
//! Step results travel to and from the orchestrator as JSON values. The
//! [`SerDes`] trait converts typed results to that form and back; [`JsonSerDes`]
//! is the serde_json implementation used by
//! [`DurableContext::step_named`](crate::context::DurableContext::step_named).
//!
//! ```rust
//! use chainflow_engine::serdes::{JsonSerDes, SerDes, SerDesContext};
//!
//! let serdes = JsonSerDes::<String>::new();
//! let context = SerDesContext::new("op-123", "run-1");
//!
//! let value = serdes.serialize(&"Hello, Ada!".to_string(), &context).unwrap();
//! let restored = serdes.deserialize(value, &context).unwrap();
//! assert_eq!(restored, "Hello, Ada!");
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::DurableError;

/// Error type for serialization/deserialization failures.
#[derive(Debug, Clone)]
pub struct SerDesError {
    /// The kind of error (serialization or deserialization)
    pub kind: SerDesErrorKind,
    /// Descriptive error message
    pub message: String,
}

/// The kind of SerDes error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerDesErrorKind {
    /// Error during serialization
    Serialization,
    /// Error during deserialization
    Deserialization,
}

impl SerDesError {
    /// Creates a new serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Serialization,
            message: message.into(),
        }
    }

    /// Creates a new deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Deserialization,
            message: message.into(),
        }
    }
}

impl fmt::Display for SerDesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SerDesErrorKind::Serialization => write!(f, "Serialization error: {}", self.message),
            SerDesErrorKind::Deserialization => {
                write!(f, "Deserialization error: {}", self.message)
            }
        }
    }
}

impl std::error::Error for SerDesError {}

impl From<SerDesError> for DurableError {
    fn from(error: SerDesError) -> Self {
        DurableError::serdes(error.to_string())
    }
}

/// Identifies the step a value belongs to.
#[derive(Debug, Clone)]
pub struct SerDesContext {
    /// The step name being (de)serialized
    pub step_name: String,
    /// The run the step belongs to
    pub run_id: String,
}

impl SerDesContext {
    /// Creates a new SerDesContext.
    pub fn new(step_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            run_id: run_id.into(),
        }
    }
}

/// Converts step results to and from their memoized JSON form.
pub trait SerDes<T>: Send + Sync {
    /// Serializes a value to its memoized representation.
    fn serialize(&self, value: &T, context: &SerDesContext) -> Result<Value, SerDesError>;

    /// Restores a value from its memoized representation.
    fn deserialize(&self, data: Value, context: &SerDesContext) -> Result<T, SerDesError>;
}

/// Default JSON serialization using serde_json.
pub struct JsonSerDes<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerDes<T> {
    /// Creates a new JsonSerDes.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerDes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerDes<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> SerDes<T> for JsonSerDes<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T, context: &SerDesContext) -> Result<Value, SerDesError> {
        serde_json::to_value(value).map_err(|e| {
            SerDesError::serialization(format!("step '{}': {}", context.step_name, e))
        })
    }

    fn deserialize(&self, data: Value, context: &SerDesContext) -> Result<T, SerDesError> {
        serde_json::from_value(data).map_err(|e| {
            SerDesError::deserialization(format!("step '{}': {}", context.step_name, e))
        })
    }
}
