//! Error types for the chainflow engine.
//!
//! Startup failures, step failures and registration failures all surface as
//! [`DurableError`]. [`ErrorObject`] is the form errors take on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DurableError {
    /// Explicit failure raised by function code.
    #[error("Execution error: {message}")]
    Execution {
        /// Error message describing what went wrong
        message: String,
    },

    /// Invalid configuration or arguments.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation failure
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerDes {
        /// Error message describing the serialization failure
        message: String,
    },

    /// The memoized state does not match the steps the function asked for.
    #[error("Non-deterministic execution: {message}")]
    NonDeterministic {
        /// Error message describing the mismatch
        message: String,
        /// The operation ID where the mismatch occurred
        operation_id: Option<String>,
    },

    /// Error returned from inside a step closure.
    #[error("User code error: {message}")]
    UserCode {
        /// Error message from the user code
        message: String,
        /// The type of error
        error_type: String,
    },

    /// The invocation was cancelled before the step could complete.
    #[error("Invocation cancelled: {message}")]
    Cancelled {
        /// Error message describing where the cancellation was observed
        message: String,
    },

    /// The orchestrator rejected or could not receive the app's function configs.
    #[error("Registration error: {message}")]
    Registration {
        /// Error message describing the failure
        message: String,
        /// HTTP status returned by the orchestrator, if any
        status: Option<u16>,
    },

    /// The process could not start (listener bind, accept loop).
    #[error("Startup error: {message}")]
    Startup {
        /// Error message describing the failure
        message: String,
    },
}

impl DurableError {
    /// Creates a new Execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Creates a new Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new SerDes error.
    pub fn serdes(message: impl Into<String>) -> Self {
        Self::SerDes {
            message: message.into(),
        }
    }

    /// Creates a new UserCode error with the default error type.
    pub fn user_code(message: impl Into<String>) -> Self {
        Self::UserCode {
            message: message.into(),
            error_type: USER_CODE_ERROR_TYPE.to_string(),
        }
    }

    /// Creates a new Cancelled error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates a new Registration error.
    pub fn registration(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Registration {
            message: message.into(),
            status,
        }
    }

    /// Creates a new Startup error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Returns true if this error came from a cancelled invocation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Error type recorded for failures raised by step closures.
pub const USER_CODE_ERROR_TYPE: &str = "UserCodeError";

/// Result alias used throughout the crate.
pub type DurableResult<T> = Result<T, DurableError>;

/// Error object for serialization in invocation responses and memoized steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error type/name
    #[serde(rename = "ErrorType", alias = "name")]
    pub error_type: String,
    /// The error message
    #[serde(rename = "ErrorMessage", alias = "message")]
    pub error_message: String,
}

impl ErrorObject {
    /// Creates a new ErrorObject.
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}

impl From<&DurableError> for ErrorObject {
    fn from(error: &DurableError) -> Self {
        match error {
            DurableError::Execution { message } => ErrorObject::new("ExecutionError", message),
            DurableError::Validation { message } => ErrorObject::new("ValidationError", message),
            DurableError::SerDes { message } => ErrorObject::new("SerDesError", message),
            DurableError::NonDeterministic { message, .. } => {
                ErrorObject::new("NonDeterministicExecutionError", message)
            }
            DurableError::UserCode {
                message,
                error_type,
            } => ErrorObject::new(error_type, message),
            DurableError::Cancelled { message } => ErrorObject::new("CancelledError", message),
            DurableError::Registration { message, .. } => {
                ErrorObject::new("RegistrationError", message)
            }
            DurableError::Startup { message } => ErrorObject::new("StartupError", message),
        }
    }
}

impl From<ErrorObject> for DurableError {
    fn from(error: ErrorObject) -> Self {
        DurableError::UserCode {
            message: error.error_message,
            error_type: error.error_type,
        }
    }
}

impl From<serde_json::Error> for DurableError {
    fn from(error: serde_json::Error) -> Self {
        DurableError::serdes(error.to_string())
    }
}
