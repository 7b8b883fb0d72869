//! Integration tests for the HTTP surface.
//!
//! Each test binds a real listener on an ephemeral port and talks to it with
//! reqwest. The orchestrator's registration endpoint is stood in for by
//! wiremock.

mod common;

use chainflow_engine::functions::hello_world;
use chainflow_engine::{generate_operation_id, serve, Client, ClientOpts};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

async fn start(client: Client) -> String {
    let listener = serve::bind("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve::serve(listener, client.serve()));
    format!("http://{}", addr)
}

fn invoke_url(base: &str) -> String {
    format!("{}/?fnId=core-hello-world&stepId=step", base)
}

#[tokio::test]
async fn test_get_introspection() {
    let base = start(hello_client(None)).await;

    let response = reqwest::get(&base).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["app_id"], "core");
    assert_eq!(body["framework"], "hyper");
    assert_eq!(body["mode"], "dev");
    assert_eq!(body["function_count"], 1);
    assert_eq!(body["has_signing_key"], true);
    assert_eq!(body["functions"][0]["id"], "core-hello-world");
    assert_eq!(body["functions"][0]["name"], "Hello World");
    assert_eq!(body["functions"][0]["triggers"][0]["event"], "hello.world");
}

#[tokio::test]
async fn test_post_invokes_greeting() {
    let base = start(hello_client(None)).await;

    let response = reqwest::Client::new()
        .post(invoke_url(&base))
        .json(&json!({
            "event": {"name": "hello.world", "data": {"name": "Ada"}},
            "ctx": {"run_id": TEST_RUN_ID, "attempt": 0}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "Succeeded");
    assert_eq!(body["result"], json!({"status": "success", "message": "Hello, Ada!"}));
    assert_eq!(
        body["operations"][0]["id"],
        generate_operation_id(hello_world::STEP_NAME, 0)
    );
    assert_eq!(body["operations"][0]["data"], "Hello, Ada!");
}

#[tokio::test]
async fn test_post_to_advertised_url_with_encoded_app_id() {
    let listener = serve::bind("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut client = Client::new(ClientOpts {
        dev: Some(true),
        url: Some(format!("http://{}", addr)),
        ..ClientOpts::new("my app")
    })
    .unwrap();
    hello_world::register(&mut client, TEST_TRIGGER).unwrap();

    let registration = client.registration_request();
    let advertised = registration.functions[0].steps["step"].runtime.url.clone();
    assert!(advertised.contains("fnId=my+app-hello-world"));
    tokio::spawn(serve::serve(listener, client.serve()));

    let response = reqwest::Client::new()
        .post(&advertised)
        .json(&json!({"event": {"name": TEST_TRIGGER, "data": {"name": "Ada"}}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["message"], "Hello, Ada!");
}

#[tokio::test]
async fn test_post_replays_memoized_step() {
    let base = start(hello_client(None)).await;

    let response = reqwest::Client::new()
        .post(invoke_url(&base))
        .json(&json!({
            "event": {"name": "hello.world", "data": {"name": "Grace"}},
            "steps": memoized_greeting("Hello, Ada!"),
            "ctx": {"run_id": TEST_RUN_ID, "attempt": 1}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["message"], "Hello, Ada!");
    assert_eq!(body["operations"], json!([]));
}

#[tokio::test]
async fn test_post_rejects_bad_requests() {
    let base = start(hello_client(None)).await;
    let http = reqwest::Client::new();

    let missing_fn = http.post(&base).body("{}").send().await.unwrap();
    assert_eq!(missing_fn.status(), 400);

    let unknown_fn = http
        .post(format!("{}/?fnId=core-unknown", base))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_fn.status(), 404);

    let malformed = http.post(invoke_url(&base)).body("{not json").send().await.unwrap();
    assert_eq!(malformed.status(), 400);
}

#[tokio::test]
async fn test_other_methods_not_allowed() {
    let base = start(hello_client(None)).await;

    let response = reqwest::Client::new().delete(&base).send().await.unwrap();

    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn test_put_registers_with_orchestrator() {
    let orchestrator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/fn/register"))
        .and(header("authorization", "Bearer 1234"))
        .and(body_partial_json(json!({
            "app_name": "core",
            "framework": "hyper",
            "url": "http://localhost:8080/"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&orchestrator)
        .await;

    let base = start(hello_client(Some(format!("{}/api/v1", orchestrator.uri())))).await;

    let response = reqwest::Client::new().put(&base).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully registered");
}

#[tokio::test]
async fn test_put_reports_orchestrator_failure() {
    let orchestrator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/fn/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&orchestrator)
        .await;

    let base = start(hello_client(Some(format!("{}/api/v1", orchestrator.uri())))).await;

    let response = reqwest::Client::new().put(&base).send().await.unwrap();
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("500"));
}
