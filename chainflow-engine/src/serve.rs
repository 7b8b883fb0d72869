//! HTTP surface the orchestrator calls into.
//!
//! `GET` returns introspection data, `PUT` syncs the function registry with
//! the orchestrator, `POST ?fnId=` invokes a function. Every connection is
//! served on its own tokio task.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{Client, SDK_NAME};
use crate::context::{DurableContext, ExecutionStepTool};
use crate::error::{DurableError, DurableResult, ErrorObject};
use crate::function::{Input, Trigger, ENTRY_STEP_ID};
use crate::invocation::{InvocationOutput, InvocationRequest};
use crate::state::ExecutionState;

/// Framework identifier announced to the orchestrator.
pub const FRAMEWORK: &str = "hyper";

/// Serves the functions of a [`Client`] over HTTP.
#[derive(Debug, Clone)]
pub struct ServeHandler {
    client: Arc<Client>,
}

#[derive(Debug, Serialize)]
struct Introspection<'a> {
    app_id: &'a str,
    framework: &'static str,
    sdk: &'static str,
    mode: &'static str,
    function_count: usize,
    functions: Vec<FunctionSummary<'a>>,
    has_signing_key: bool,
}

#[derive(Debug, Serialize)]
struct FunctionSummary<'a> {
    id: String,
    name: &'a str,
    triggers: Vec<&'a Trigger>,
}

/// Query string of an invocation request.
#[derive(Debug, Deserialize)]
struct InvokeQuery {
    #[serde(rename = "fnId", default)]
    fn_id: Option<String>,
    #[serde(rename = "stepId", default)]
    step_id: Option<String>,
}

impl InvokeQuery {
    fn parse(query: Option<&str>) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(query.unwrap_or(""))
    }
}

impl ServeHandler {
    /// Creates a handler serving the functions of `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// The client whose functions are served.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Handles one request.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        debug!(method = %req.method(), uri = %req.uri(), "Request received");

        let method = req.method().clone();
        match method {
            Method::GET => self.introspect(),
            Method::PUT => self.sync().await,
            Method::POST => self.invoke(req).await,
            _ => {
                warn!(method = %method, "Method not allowed");
                json_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &json!({"message": format!("method {} not allowed", method)}),
                )
            }
        }
    }

    fn introspect(&self) -> Response<Full<Bytes>> {
        let app_id = self.client.app_id();
        let functions: Vec<FunctionSummary<'_>> = self
            .client
            .functions()
            .iter()
            .map(|f| FunctionSummary {
                id: f.slug(app_id),
                name: f.name(),
                triggers: vec![f.trigger()],
            })
            .collect();

        json_response(
            StatusCode::OK,
            &Introspection {
                app_id,
                framework: FRAMEWORK,
                sdk: SDK_NAME,
                mode: if self.client.is_dev() { "dev" } else { "cloud" },
                function_count: functions.len(),
                functions,
                has_signing_key: self.client.has_signing_key(),
            },
        )
    }

    async fn sync(&self) -> Response<Full<Bytes>> {
        match self.client.register().await {
            Ok(()) => json_response(
                StatusCode::OK,
                &json!({"message": "Successfully registered", "modified": true}),
            ),
            Err(e) => {
                error!(error = %e, "Registration sync failed");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &json!({"message": e.to_string()}),
                )
            }
        }
    }

    async fn invoke<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let query = match InvokeQuery::parse(req.uri().query()) {
            Ok(query) => query,
            Err(e) => return bad_request(&format!("invalid query string: {}", e)),
        };
        let Some(fn_id) = query.fn_id.filter(|id| !id.is_empty()) else {
            return bad_request("missing fnId query parameter");
        };
        let Some(function) = self.client.function(&fn_id) else {
            warn!(fn_id = %fn_id, "Unknown function");
            return json_response(
                StatusCode::NOT_FOUND,
                &json!({"message": format!("function '{}' not found", fn_id)}),
            );
        };

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return bad_request(&format!("failed to read request body: {}", e)),
        };
        let request: InvocationRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return bad_request(&format!("invalid invocation body: {}", e)),
        };

        let run_id = request
            .ctx
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let attempt = request.ctx.attempt;

        info!(
            fn_id = %fn_id,
            step_id = query.step_id.as_deref().unwrap_or(ENTRY_STEP_ID),
            run_id = %run_id,
            attempt,
            memoized = request.steps.len(),
            "Invoking function"
        );

        let state = Arc::new(
            ExecutionState::from_memoized_steps(&run_id, &request.steps).with_attempt(attempt),
        );
        let step_tool = Arc::new(ExecutionStepTool::new(state.clone()));

        // Cancels the run if this future is dropped with the connection.
        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();

        let ctx = DurableContext::new(step_tool, &run_id)
            .with_attempt(attempt)
            .with_cancellation(token);

        let mut input = Input::new(request.event, &run_id);
        if !request.events.is_empty() {
            input.events = request.events;
        }
        input.attempt = attempt;

        let outcome = function.invoke(input, ctx).await;
        if let Err(ref e) = outcome {
            error!(fn_id = %fn_id, run_id = %run_id, error = %e, "Function failed");
        }

        let output = InvocationOutput::from_outcome(&outcome, state.new_operations().await);
        let status = if output.is_succeeded() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let replayed = state.replayed_count().await;
        debug!(
            run_id = %run_id,
            status = %status,
            new_operations = output.operations.len(),
            replayed,
            "Invocation finished"
        );
        json_response(status, &output)
    }
}

/// Binds the listener the engine serves on.
pub async fn bind(addr: SocketAddr) -> DurableResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| DurableError::startup(format!("failed to bind {}: {}", addr, e)))
}

/// Accepts connections on `listener` and serves them with `handler` until
/// accepting fails.
pub async fn serve(listener: TcpListener, handler: ServeHandler) -> DurableResult<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| DurableError::startup(format!("failed to accept connection: {}", e)))?;
        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let handler = handler.clone();
                async move { Ok::<_, std::convert::Infallible>(handler.handle(req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(peer = %peer, "Error serving TCP connection: {:?}", err);
            }
        });
    }
}

fn bad_request(message: &str) -> Response<Full<Bytes>> {
    warn!("Bad request: {}", message);
    json_response(
        StatusCode::BAD_REQUEST,
        &ErrorObject::new("BadRequest", message),
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(r#"{{"message":"failed to encode response: {}"}}"#, e).into_bytes(),
        ),
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
