//! Function declarations.
//!
//! A [`ServableFunction`] pairs an id and name with one event [`Trigger`] and
//! an async handler. [`create_function`] validates the declaration and adds it
//! to a [`Client`], which serves and registers it.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Client;
use crate::context::DurableContext;
use crate::error::{DurableError, DurableResult};
use crate::event::Event;

/// Step id announced for the single HTTP entry point of a function.
pub const ENTRY_STEP_ID: &str = "step";

/// Identity of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionOpts {
    /// Stable id, unique within the app
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl FunctionOpts {
    /// Creates new FunctionOpts.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Event trigger of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Event name that starts a run
    pub event: String,
}

impl Trigger {
    /// Creates a trigger on the event `name`.
    pub fn event(name: impl Into<String>) -> Self {
        Self { event: name.into() }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event)
    }
}

/// Input handed to a function handler.
#[derive(Debug, Clone)]
pub struct Input {
    /// The triggering event
    pub event: Event,
    /// All events of a batched run
    pub events: Vec<Event>,
    /// The run id
    pub run_id: String,
    /// Attempt number (0-indexed)
    pub attempt: u32,
}

impl Input {
    /// Creates input for a single-event run.
    pub fn new(event: Event, run_id: impl Into<String>) -> Self {
        Self {
            events: vec![event.clone()],
            event,
            run_id: run_id.into(),
            attempt: 0,
        }
    }
}

type HandlerFn = dyn Fn(Input, DurableContext) -> BoxFuture<'static, DurableResult<Value>> + Send + Sync;

/// A function that can be served and registered.
#[derive(Clone)]
pub struct ServableFunction {
    opts: FunctionOpts,
    trigger: Trigger,
    handler: Arc<HandlerFn>,
}

impl ServableFunction {
    /// Creates a function from a typed async handler.
    ///
    /// Fails with [`DurableError::Validation`] if the id or trigger event is empty.
    pub fn new<F, Fut, T>(opts: FunctionOpts, trigger: Trigger, func: F) -> DurableResult<Self>
    where
        F: Fn(Input, DurableContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DurableResult<T>> + Send + 'static,
        T: Serialize + 'static,
    {
        if opts.id.trim().is_empty() {
            return Err(DurableError::validation("function id must not be empty"));
        }
        if trigger.event.trim().is_empty() {
            return Err(DurableError::validation(format!(
                "function '{}' has an empty trigger event",
                opts.id
            )));
        }

        let handler: Arc<HandlerFn> = Arc::new(move |input: Input, ctx: DurableContext| {
            let fut = func(input, ctx);
            async move {
                fut.await
                    .and_then(|output| serde_json::to_value(output).map_err(DurableError::from))
            }
            .boxed()
        });

        Ok(Self {
            opts,
            trigger,
            handler,
        })
    }

    /// The function id.
    pub fn id(&self) -> &str {
        &self.opts.id
    }

    /// The function name, falling back to the id.
    pub fn name(&self) -> &str {
        if self.opts.name.is_empty() {
            &self.opts.id
        } else {
            &self.opts.name
        }
    }

    /// The function trigger.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// The app-qualified id the orchestrator knows this function by.
    pub fn slug(&self, app_id: &str) -> String {
        format!("{}-{}", app_id, self.opts.id)
    }

    /// Runs the handler.
    pub async fn invoke(&self, input: Input, ctx: DurableContext) -> DurableResult<Value> {
        (self.handler)(input, ctx).await
    }

    /// The registration config for this function, served from `url`.
    pub fn config(&self, app_id: &str, url: &reqwest::Url) -> FunctionConfig {
        let slug = self.slug(app_id);
        let mut step_url = url.clone();
        step_url
            .query_pairs_mut()
            .append_pair("fnId", &slug)
            .append_pair("stepId", ENTRY_STEP_ID);

        let mut steps = BTreeMap::new();
        steps.insert(
            ENTRY_STEP_ID.to_string(),
            StepDefinition {
                id: ENTRY_STEP_ID.to_string(),
                name: ENTRY_STEP_ID.to_string(),
                runtime: StepRuntime {
                    kind: "http".to_string(),
                    url: step_url.to_string(),
                },
            },
        );

        FunctionConfig {
            id: slug,
            name: self.name().to_string(),
            triggers: vec![self.trigger.clone()],
            steps,
        }
    }
}

impl fmt::Debug for ServableFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServableFunction")
            .field("id", &self.opts.id)
            .field("name", &self.opts.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Declares a function and adds it to `client`.
///
/// Returns a handle to the declared function. Fails if the declaration is
/// invalid or the client already serves a function with the same id.
pub fn create_function<F, Fut, T>(
    client: &mut Client,
    opts: FunctionOpts,
    trigger: Trigger,
    handler: F,
) -> DurableResult<ServableFunction>
where
    F: Fn(Input, DurableContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DurableResult<T>> + Send + 'static,
    T: Serialize + 'static,
{
    let function = ServableFunction::new(opts, trigger, handler)?;
    client.add_function(function.clone())?;
    Ok(function)
}

/// Function config sent to the orchestrator on registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionConfig {
    /// App-qualified function id
    pub id: String,
    /// Function name
    pub name: String,
    /// Triggers
    pub triggers: Vec<Trigger>,
    /// Entry points keyed by step id
    pub steps: BTreeMap<String, StepDefinition>,
}

/// One HTTP entry point of a function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDefinition {
    /// Step id
    pub id: String,
    /// Step name
    pub name: String,
    /// Where the orchestrator reaches the step
    pub runtime: StepRuntime,
}

/// Transport details of a step entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRuntime {
    /// Runtime type, always `http`
    #[serde(rename = "type")]
    pub kind: String,
    /// URL to invoke
    pub url: String,
}
