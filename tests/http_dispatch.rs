//! End-to-end dispatch through a real listener.

use headless_bridge::config::BridgeConfig;
use headless_bridge::routing::{FnModule, Route};
use headless_bridge::Reply;
use serde_json::json;

mod common;

use common::TestBridge;

#[tokio::test(flavor = "multi_thread")]
async fn single_query_value_is_scalar() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.get("/echo?x=1").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "ok", "result": { "x": "1" } }));
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_query_key_is_ordered_list() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.get("/echo?x=1&x=2").await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], json!({ "x": ["1", "2"] }));
}

#[tokio::test(flavor = "multi_thread")]
async fn post_body_wins_over_query() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.post("/echo?x=1&y=2", &json!({ "y": 3 })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], json!({ "x": "1", "y": 3 }));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_json_body_does_not_fail_request() {
    let bridge = TestBridge::start().await;

    let res = bridge
        .client
        .post(bridge.url("/echo?x=1"))
        .header("content-type", "application/json")
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["result"], json!({ "x": "1" }));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_is_not_found_and_leaves_no_ticket() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.get("/nope").await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Route /nope not defined");
    assert!(body["traceback"].as_str().unwrap().contains("RouteNotFound"));
    assert!(bridge.bridge.pending().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn exec_failure_reports_message_and_trace() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.post("/exec", &json!({ "code": "x = 1\nfail(\"boom\")" })).await;
    assert_eq!(status, 500);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "boom");
    let traceback = body["traceback"].as_str().unwrap();
    assert!(traceback.contains("exec line 2"), "{traceback}");
    assert!(traceback.ends_with("HandlerError: boom"), "{traceback}");
}

#[tokio::test(flavor = "multi_thread")]
async fn deeply_nested_script_fails_without_killing_host() {
    let bridge = TestBridge::start().await;

    let code = format!("{}1", "-".repeat(200_000));
    let (status, body) = bridge.post("/eval", &json!({ "code": code })).await;
    assert_eq!(status, 500);
    assert!(body["message"].as_str().unwrap().contains("nesting too deep"), "{body}");

    let chain = vec!["1"; 50_000].join(" + ");
    let (status, _) = bridge.post("/exec", &json!({ "code": format!("result = {chain}") })).await;
    assert_eq!(status, 500);

    let (status, body) = bridge.post("/eval", &json!({ "code": "app_name()" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], "DemoDesign");
}

#[tokio::test(flavor = "multi_thread")]
async fn eval_and_exec_run_against_host() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.post("/eval", &json!({ "code": "app_name()" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], "DemoDesign");

    let (status, body) = bridge
        .get("/exec?code=result%20%3D%20len(request)")
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_host_and_server() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.get("/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["status"], "Server is running");
    assert_eq!(
        body["result"]["version"],
        format!("DemoDesign v{}", env!("CARGO_PKG_VERSION"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn business_routes_mutate_host_model() {
    let bridge = TestBridge::start().await;

    let (status, body) = bridge.post("/parameter", &json!({ "name": "width", "value": 42 })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["value"], 42.0);

    let (_, body) = bridge.get("/parameter?name=width").await;
    assert_eq!(body["result"]["value"], 42.0);

    let (status, _) = bridge.get("/parameter").await;
    assert_eq!(status, 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_reply_bypasses_envelope() {
    let bridge = TestBridge::start().await;

    let res = bridge.client.get(bridge.url("/export/stl")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "model/stl");
    let text = res.text().await.unwrap();
    assert!(text.starts_with("solid Base\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn undeclared_capability_is_binding_error() {
    let bridge = TestBridge::start_with(BridgeConfig::default(), |executor| {
        let module = FnModule::new("broken", || {
            Ok(vec![Route::new("/needs-session", &["session"], |_| {
                Ok(Reply::json(json!(true)))
            })])
        });
        executor.load_module(Box::new(module)).unwrap();
    })
    .await;

    let (status, body) = bridge.get("/needs-session").await;
    assert_eq!(status, 500);
    assert!(body["message"].as_str().unwrap().contains("session"));
    assert!(body["traceback"].as_str().unwrap().contains("BindingError"));
}

#[tokio::test(flavor = "multi_thread")]
async fn other_methods_are_rejected() {
    let bridge = TestBridge::start().await;

    let res = bridge.client.put(bridge.url("/echo")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 405);
    assert!(bridge.bridge.pending().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn responses_carry_request_id() {
    let bridge = TestBridge::start().await;

    let res = bridge
        .client
        .get(bridge.url("/echo"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    let res = bridge.client.get(bridge.url("/echo")).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_is_rejected() {
    let mut config = BridgeConfig::default();
    config.security.max_body_size = 64;
    let bridge = TestBridge::start_with(config, |_| {}).await;

    let res = bridge
        .client
        .post(bridge.url("/echo"))
        .json(&json!({ "blob": "x".repeat(256) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 413);
}
