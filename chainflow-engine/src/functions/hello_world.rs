//! The "hello world" function.
//!
//! Reads an optional `name` from the event payload and produces a greeting
//! inside a single memoized step, so redeliveries of the same run return the
//! greeting recorded the first time.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::Client;
use crate::context::DurableContext;
use crate::error::DurableResult;
use crate::event::EventPayload;
use crate::function::{create_function, FunctionOpts, Input, ServableFunction, Trigger};

/// Step name the greeting is memoized under.
pub const STEP_NAME: &str = "hello-world";
/// Function id.
pub const FUNCTION_ID: &str = "hello-world";
/// Function display name.
pub const FUNCTION_NAME: &str = "Hello World";
/// Name used when the payload carries no usable `name`.
pub const DEFAULT_NAME: &str = "world";
/// Status reported on success.
pub const STATUS_SUCCESS: &str = "success";

/// Output of the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingResult {
    /// Always [`STATUS_SUCCESS`]
    pub status: String,
    /// The greeting
    pub message: String,
}

impl GreetingResult {
    fn success(message: String) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message,
        }
    }
}

/// The name to greet: the payload's `name` when it is a string, else [`DEFAULT_NAME`].
pub fn display_name(payload: &EventPayload) -> &str {
    payload.str_field_or("name", DEFAULT_NAME)
}

/// Formats the greeting for `name`.
pub fn greeting(name: &str) -> String {
    format!("Hello, {}!", name)
}

/// Greets the name found in `payload` from within the `hello-world` step.
///
/// Step failures, including cancellation, are returned unchanged.
pub async fn greet(payload: &EventPayload, ctx: &DurableContext) -> DurableResult<GreetingResult> {
    let name = display_name(payload).to_string();
    info!(name = %name, run_id = %ctx.run_id(), "Extracted name from payload");

    let message = ctx
        .step_named(STEP_NAME, move |_| Ok(greeting(&name)))
        .await
        .map_err(|e| {
            error!(step = STEP_NAME, error = %e, "Greeting step failed");
            e
        })?;

    info!(step = STEP_NAME, message = %message, "Greeting step completed");
    Ok(GreetingResult::success(message))
}

/// Handler registered with the client.
pub async fn hello_world(input: Input, ctx: DurableContext) -> DurableResult<GreetingResult> {
    greet(&input.event.data, &ctx).await
}

/// Declares the function on `client`, triggered by `trigger_event`.
pub fn register(client: &mut Client, trigger_event: &str) -> DurableResult<ServableFunction> {
    create_function(
        client,
        FunctionOpts::new(FUNCTION_ID, FUNCTION_NAME),
        Trigger::event(trigger_event),
        hello_world,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOpts;
    use crate::context::{BoxError, StepFn, StepTool};
    use crate::error::DurableError;
    use crate::handlers::StepContext;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct InlineTool;

    #[async_trait]
    impl StepTool for InlineTool {
        async fn run_step(&self, name: &str, work: StepFn) -> DurableResult<Value> {
            work(StepContext::new(name, "run-1").with_name(name))
                .map_err(|e: BoxError| DurableError::user_code(e.to_string()))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl StepTool for FailingTool {
        async fn run_step(&self, _name: &str, _work: StepFn) -> DurableResult<Value> {
            Err(DurableError::execution("orchestrator unavailable"))
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&EventPayload::from_value(json!({"name": "Ada"}))), "Ada");
        assert_eq!(display_name(&EventPayload::from_value(json!({"name": 42}))), "world");
        assert_eq!(display_name(&EventPayload::from_value(json!({}))), "world");
        assert_eq!(display_name(&EventPayload::absent()), "world");
    }

    #[test]
    fn test_greeting_format() {
        assert_eq!(greeting("Ada"), "Hello, Ada!");
        assert_eq!(greeting(""), "Hello, !");
    }

    #[tokio::test]
    async fn test_greet_success() {
        let ctx = DurableContext::new(Arc::new(InlineTool), "run-1");
        let payload = EventPayload::from_value(json!({"name": "Ada"}));

        let result = greet(&payload, &ctx).await.unwrap();

        assert_eq!(result.status, "success");
        assert_eq!(result.message, "Hello, Ada!");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "success", "message": "Hello, Ada!"})
        );
    }

    #[tokio::test]
    async fn test_greet_propagates_step_error() {
        let ctx = DurableContext::new(Arc::new(FailingTool), "run-1");

        let err = greet(&EventPayload::absent(), &ctx).await.unwrap_err();

        assert_eq!(err, DurableError::execution("orchestrator unavailable"));
    }

    #[test]
    fn test_register_declares_function() {
        let mut client = Client::new(ClientOpts::new("core")).unwrap();
        let function = register(&mut client, "api/hello.world").unwrap();

        assert_eq!(function.id(), FUNCTION_ID);
        assert_eq!(function.name(), FUNCTION_NAME);
        assert_eq!(function.trigger().event, "api/hello.world");
        assert_eq!(client.functions().len(), 1);
    }
}
