// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests for the gateway, driven through `tower::ServiceExt`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use omnidesk_gateway::{AuthConfig, GatewayState, HealthState, router};
use omnidesk_realtime::{Broker, SessionSettings};
use omnidesk_test_utils::TestHarness;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "dashboard-token";

async fn app(harness: &TestHarness) -> Router {
    let state = GatewayState {
        engine: harness.engine.clone(),
        broker: Broker::spawn(CancellationToken::new()),
        sessions: SessionSettings::default(),
        verify_token: Some("meta-secret".to_string()),
        health: HealthState::default(),
    };
    router(
        state,
        AuthConfig {
            bearer_token: Some(TOKEN.to_string()),
        },
    )
}

async fn harness() -> TestHarness {
    TestHarness::builder()
        .with_account(TestHarness::sample_account())
        .build()
        .await
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, body.to_vec())
}

async fn call_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = call(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn dashboard(method: Method, uri: &str, harness: &TestHarness, body: Option<Value>) -> Request<Body> {
    let account_id = harness.account.as_ref().map(|a| a.id).unwrap_or_default();
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("x-agent-id", "agent-1")
        .header("x-channel-account-id", account_id.to_string());
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn whatsapp_text(wamid: &str, body: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "contacts": [{"wa_id": "6281234", "profile": {"name": "Budi"}}],
                "messages": [{
                    "id": wamid,
                    "from": "6281234",
                    "timestamp": "1700000000",
                    "type": "text",
                    "text": {"body": body}
                }]
            }}]
        }]
    })
}

#[tokio::test]
async fn verification_echoes_the_challenge() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call(
        &app,
        Request::get("/webhooks?hub.mode=subscribe&hub.verify_token=meta-secret&hub.challenge=1158201444")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"1158201444");
}

#[tokio::test]
async fn verification_rejects_wrong_token_and_bad_challenge() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, _) = call(
        &app,
        Request::get("/webhook-meta/facebook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Request::get(
            "/webhook-meta/instagram?hub.mode=subscribe&hub.verify_token=meta-secret&hub.challenge=abc",
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn whatsapp_redelivery_answers_with_the_same_ids() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, first) = call_json(&app, post_json("/webhooks", whatsapp_text("wamid.1", "halo"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["isError"], json!(false));
    assert_eq!(first["errorStatus"], json!(""));
    assert_eq!(first["data"]["message_ids"], json!(["wamid.1"]));

    let (status, second) = call_json(&app, post_json("/webhooks", whatsapp_text("wamid.1", "halo"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"], first["data"]);
    assert_eq!(harness.memory.message_count().await, 1);
    assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn malformed_webhook_body_is_failed_bind_json() {
    let harness = harness().await;
    let app = app(&harness).await;

    let request = Request::post("/webhook-meta/facebook")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["isError"], json!(true));
    assert_eq!(body["errorStatus"], json!("FAILED_BIND_JSON"));
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn dashboard_routes_require_the_bearer_token() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call_json(
        &app,
        Request::get("/interaction/closed-data").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errorStatus"], json!("UNAUTHORIZED"));

    let (status, _) = call(
        &app,
        Request::get("/interaction/closed-data")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_configuration_fails_closed() {
    let harness = harness().await;
    let state = GatewayState {
        engine: harness.engine.clone(),
        broker: Broker::spawn(CancellationToken::new()),
        sessions: SessionSettings::default(),
        verify_token: None,
        health: HealthState::default(),
    };
    let app = router(state, AuthConfig::default());

    let (status, _) = call(&app, dashboard(Method::GET, "/interaction/my", &harness, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn claim_list_and_close_through_the_api() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (_, ingest) = call_json(&app, post_json("/webhooks", whatsapp_text("wamid.7", "tolong"))).await;
    let interaction_id = ingest["data"]["interaction_ids"][0].as_i64().unwrap();

    let (status, list) = call_json(
        &app,
        dashboard(Method::GET, "/interaction/list?status=UNCLAIMED&platforms=WHATSAPP", &harness, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], json!(1));
    assert_eq!(list["data"]["interaction_list"][0]["id"], json!(interaction_id));

    let (status, claimed) = call_json(
        &app,
        dashboard(
            Method::PUT,
            "/interaction/claim",
            &harness,
            Some(json!({"interaction_id": interaction_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["data"]["agent_id"], json!("agent-1"));
    assert_eq!(claimed["data"]["interaction_status"], json!("IN_PROGRESS"));

    let (status, mine) = call_json(&app, dashboard(Method::GET, "/interaction/my", &harness, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"][0]["latest_message"]["body"], json!("tolong"));

    let (status, closed) = call_json(
        &app,
        dashboard(
            Method::PUT,
            "/interaction/close",
            &harness,
            Some(json!({"interaction_id": interaction_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["data"]["interaction_status"], json!("CLOSED"));
    assert_eq!(harness.crm.submitted().await.len(), 1);
}

#[tokio::test]
async fn failed_crm_hand_off_is_a_server_error() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (_, ingest) = call_json(&app, post_json("/webhooks", whatsapp_text("wamid.9", "halo"))).await;
    let interaction_id = ingest["data"]["interaction_ids"][0].as_i64().unwrap();
    harness.engine.claim(interaction_id, "agent-1").await.unwrap();
    harness.crm.fail(true);

    let (status, body) = call_json(
        &app,
        dashboard(
            Method::PUT,
            "/interaction/close",
            &harness,
            Some(json!({"interaction_id": interaction_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorStatus"], json!("CRM_RESPONSE_ERROR"));
}

#[tokio::test]
async fn empty_list_is_not_found_and_bad_filters_are_invalid_query() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call_json(&app, dashboard(Method::GET, "/interaction/list", &harness, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorStatus"], json!("DATA_NOT_FOUND"));

    let (status, body) = call_json(
        &app,
        dashboard(Method::GET, "/interaction/list?status=OPEN", &harness, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errorStatus"], json!("INVALID_QUERY"));
}

#[tokio::test]
async fn widget_routes_are_public() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call_json(
        &app,
        Request::get("/interaction/messages?interaction_id=99")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorStatus"], json!("DATA_NOT_FOUND"));
}

#[tokio::test]
async fn health_reports_ledger_and_broker() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call_json(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["ledger"], json!("healthy"));
    assert_eq!(body["rooms"], json!(0));
}

#[tokio::test]
async fn health_is_unavailable_once_the_broker_stops() {
    let harness = harness().await;
    let cancel = CancellationToken::new();
    let state = GatewayState {
        engine: harness.engine.clone(),
        broker: Broker::spawn(cancel.clone()),
        sessions: SessionSettings::default(),
        verify_token: None,
        health: HealthState::default(),
    };
    let app = router(state, AuthConfig::default());
    cancel.cancel();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (status, body) = call_json(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("unavailable"));
}

#[tokio::test]
async fn metrics_without_a_recorder_is_not_found() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, _) = call(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn socket_route_checks_parameters_before_upgrading() {
    let harness = harness().await;
    let app = app(&harness).await;

    let (status, body) = call_json(&app, Request::get("/ws?user_id=agent-1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorStatus"], json!("INVALID_QUERY"));
}
