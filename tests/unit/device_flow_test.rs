//! Device authorization flow against a scripted token endpoint. Runs on a
//! paused clock so poll intervals elapse instantly.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use gitdesk::services::device_flow::DeviceFlow;
use gitdesk::services::http_transport::{HttpResponse, Method, RequestBody, ScriptedTransport};
use gitdesk::types::auth::DeviceFlowOutcome;
use tokio::time::Instant;

fn flow() -> (ScriptedTransport, DeviceFlow) {
    let transport = ScriptedTransport::new();
    let flow = DeviceFlow::new(Arc::new(transport.clone()));
    (transport, flow)
}

#[tokio::test(start_paused = true)]
async fn test_pending_then_granted() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    script_token_replies(&transport, &[pending(), pending(), granted("gho_new")]);
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Authorized("gho_new".to_string()));
    assert_eq!(prompt.presented(), 1);
    assert_eq!(transport.request_count(Method::Post, TOKEN_PATH), 3);
    assert!(prompt.failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_device_code_request_sends_client_and_scopes() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);

    let code = flow.request_device_code().await.unwrap();
    assert_eq!(code.user_code, "ABCD-1234");

    let request = &transport.requests()[0];
    match &request.body {
        RequestBody::Form(fields) => {
            assert!(fields.iter().any(|(k, _)| k == "client_id"));
            assert!(fields.iter().any(|(k, v)| k == "scope" && v.contains("notifications")));
        }
        other => panic!("expected a form body, got {:?}", other),
    }
    assert_eq!(request.header_value("Accept"), Some("application/json"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_down_lengthens_interval() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    script_token_replies(&transport, &[token_error("slow_down"), granted("gho_slow")]);
    let prompt = TestPrompt::accepting();

    let started = Instant::now();
    let outcome = flow.run(prompt.as_ref()).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, DeviceFlowOutcome::Authorized("gho_slow".to_string()));
    // 5s before the first poll, then 10s after slow_down
    assert!(elapsed >= Duration::from_secs(15), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(16), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_access_denied_fails_and_notifies() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    script_token_replies(&transport, &[pending(), token_error("access_denied")]);
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Failed("access_denied".to_string()));
    assert_eq!(prompt.failures().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_fails() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    script_token_replies(&transport, &[token_error("expired_token")]);
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Failed("expired_token".to_string()));
    assert!(prompt.failures()[0].contains("expired"));
}

#[tokio::test(start_paused = true)]
async fn test_times_out_when_code_lifetime_runs_out() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 12);
    script_token_replies(&transport, &[pending()]);
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Failed("timed out".to_string()));
    assert_eq!(transport.request_count(Method::Post, TOKEN_PATH), 3);
    assert_eq!(prompt.failures().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_declined_prompt_cancels_before_polling() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    let prompt = TestPrompt::declining();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Cancelled);
    assert_eq!(transport.request_count(Method::Post, TOKEN_PATH), 0);
    assert!(prompt.failures().is_empty(), "cancelling is not a failure");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling_stops_the_flow() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    script_token_replies(&transport, &[pending()]);
    // two checks per iteration: the first poll happens, the second never does
    let prompt = TestPrompt::cancelling_after(3);

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Cancelled);
    assert_eq!(transport.request_count(Method::Post, TOKEN_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_while_polling_is_retried() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    transport.push_network_error(Method::Post, TOKEN_PATH, "connection reset");
    script_token_replies(&transport, &[granted("gho_retry")]);
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert_eq!(outcome, DeviceFlowOutcome::Authorized("gho_retry".to_string()));
    assert_eq!(transport.request_count(Method::Post, TOKEN_PATH), 2);
}

#[tokio::test(start_paused = true)]
async fn test_device_code_failure_is_reported() {
    let (transport, flow) = flow();
    transport.push(Method::Post, DEVICE_CODE_PATH, HttpResponse::status_only(503));
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert!(matches!(outcome, DeviceFlowOutcome::Failed(_)));
    assert_eq!(prompt.presented(), 0);
    assert_eq!(prompt.failures().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_token_error_fails() {
    let (transport, flow) = flow();
    script_device_code(&transport, 5, 900);
    transport.push(
        Method::Post,
        TOKEN_PATH,
        HttpResponse::json_body(
            200,
            &serde_json::json!({"error": "incorrect_client_credentials", "error_description": "bad client"}),
        ),
    );
    let prompt = TestPrompt::accepting();

    let outcome = flow.run(prompt.as_ref()).await;

    assert!(matches!(outcome, DeviceFlowOutcome::Failed(ref m) if m.contains("bad client")));
}
