//! Shared test utilities for integration tests.
//!
//! Helpers for building events, memoized step maps and engine clients, plus
//! proptest strategies for payloads.

#![allow(dead_code)] // These utilities are used by other integration test files

use std::sync::Arc;

use chainflow_engine::functions::hello_world;
use chainflow_engine::{
    generate_operation_id, Client, ClientOpts, DurableContext, Event, EventPayload, SharedStepTool,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

pub const TEST_RUN_ID: &str = "01TESTRUN";
pub const TEST_APP_ID: &str = "core";
pub const TEST_TRIGGER: &str = "hello.world";

/// Creates a trigger event carrying `data`.
pub fn hello_event(data: Value) -> Event {
    Event::new(TEST_TRIGGER, data)
}

/// Creates a context over `tool` for the test run.
pub fn context_with(tool: SharedStepTool) -> DurableContext {
    DurableContext::new(tool, TEST_RUN_ID)
}

/// The `steps` map the orchestrator sends after the greeting step succeeded.
pub fn memoized_greeting(message: &str) -> Map<String, Value> {
    let mut steps = Map::new();
    steps.insert(
        generate_operation_id(hello_world::STEP_NAME, 0),
        json!({"data": message}),
    );
    steps
}

/// A client declaring the hello world function, pointed at `register_url`.
pub fn hello_client(register_url: Option<String>) -> Client {
    let mut client = Client::new(ClientOpts {
        register_url,
        signing_key: Some("1234".to_string()),
        dev: Some(true),
        url: Some("http://localhost:8080".to_string()),
        ..ClientOpts::new(TEST_APP_ID)
    })
    .expect("client");
    hello_world::register(&mut client, TEST_TRIGGER).expect("register");
    client
}

/// Wraps an arbitrary JSON value as a payload.
pub fn payload(value: Value) -> EventPayload {
    EventPayload::from_value(value)
}

// =============================================================================
// Proptest Strategies
// =============================================================================

/// Strategy for JSON values that are not strings.
pub fn non_string_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(|v| json!(v)),
        Just(json!({"first": "Ada"})),
    ]
}

/// Strategy for payload keys other than `name`.
pub fn other_key_strategy() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}".prop_filter("not name", |k| k != "name")
}

/// Shared step tool handle from a concrete tool.
pub fn shared<T: chainflow_engine::StepTool + 'static>(tool: Arc<T>) -> SharedStepTool {
    tool
}
