//! Webhook endpoint through the full router, with in-memory collaborators.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{event_processor, AiBehavior, FakeChat, FakeMessaging, TEAM_ID};
use relay::gateway::{build_router, GatewayState};
use relay::signature::{sign_payload, SIGNATURE_HEADER};
use relay::store::TeamsChannelsStore;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test_secret_12345";

struct Harness {
    router: axum::Router,
    chat: Arc<FakeChat>,
    _dir: tempfile::TempDir,
}

fn harness(secret: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(FakeChat::new());
    let messaging = Arc::new(FakeMessaging::new(AiBehavior::Fail));
    let processor = event_processor(chat.clone(), messaging, Some(TEAM_ID));
    let mut state = GatewayState::new(
        common::config(secret),
        processor,
        TeamsChannelsStore::new(dir.path().join("mapping.json")),
    );
    // Independent of INTERCOM_WEBHOOK_SECRET in the test environment.
    state.webhook_secret = secret.map(str::to_string);
    Harness {
        router: build_router(state),
        chat,
        _dir: dir,
    }
}

fn webhook_request(body: &str, signature: Option<String>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/webhooks/intercom")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        req = req.header(SIGNATURE_HEADER, sig);
    }
    req.body(Body::from(body.to_string())).expect("request")
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn signed(body: &str) -> Option<String> {
    Some(format!("sha256={}", sign_payload(SECRET, body.as_bytes())))
}

#[tokio::test]
async fn signed_created_event_is_accepted_and_relayed() {
    let h = harness(Some(SECRET));
    let body = json!({
        "topic": "conversation.user.created",
        "data": { "item": { "id": "conv1" } }
    })
    .to_string();

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(&body, signed(&body)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "status": "accepted", "topic": "conversation.user.created" })
    );

    let posted = h.chat.wait_for_posts(1).await;
    assert_eq!(posted.len(), 1, "background task should post one message");
    assert!(posted[0].content.contains("conv1"));
    assert!(posted[0].content.contains("test@example.com"));
}

#[tokio::test]
async fn signature_over_different_body_is_rejected() {
    let h = harness(Some(SECRET));
    let body = r#"{"topic":"conversation.user.created","data":{"item":{"id":"conv1"}}}"#;
    let other = r#"{"topic":"conversation.user.created","data":{"item":{"id":"conv2"}}}"#;

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, signed(other)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await, json!({ "detail": "Invalid signature" }));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(h.chat.posted().is_empty());
}

#[tokio::test]
async fn missing_signature_is_rejected_when_secret_configured() {
    let h = harness(Some(SECRET));
    let body = r#"{"topic":"conversation.user.created","data":{}}"#;

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, None))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_topic_is_bad_request() {
    let h = harness(Some(SECRET));
    let body = r#"{"data":{}}"#;

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, signed(body)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await, json!({ "detail": "Missing topic" }));
}

#[tokio::test]
async fn invalid_json_is_bad_request() {
    let h = harness(Some(SECRET));
    let body = "{not json";

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, signed(body)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await, json!({ "detail": "Invalid JSON payload" }));
}

#[tokio::test]
async fn unknown_topic_is_still_accepted() {
    let h = harness(Some(SECRET));
    let body = r#"{"topic":"contact.created","data":{"item":{"id":"u1"}}}"#;

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, signed(body)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "status": "accepted", "topic": "contact.created" })
    );
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(h.chat.posted().is_empty());
}

#[tokio::test]
async fn no_secret_skips_verification() {
    let h = harness(None);
    let body = r#"{"topic":"conversation.admin.closed","data":{"item":{"id":"conv1"}}}"#;

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(body, Some("sha256=garbage".to_string())))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.chat.wait_for_posts(1).await.len(), 1);
}

#[tokio::test]
async fn custom_webhook_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(FakeChat::new());
    let processor = event_processor(
        chat.clone(),
        Arc::new(FakeMessaging::new(AiBehavior::Fail)),
        Some(TEAM_ID),
    );
    let mut config = common::config(None);
    config.gateway.webhook_path = "hooks/intercom".to_string();
    let mut state = GatewayState::new(
        config,
        processor,
        TeamsChannelsStore::new(dir.path().join("mapping.json")),
    );
    state.webhook_secret = None;
    let router = build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/hooks/intercom")
        .body(Body::from(r#"{"topic":"conversation.admin.replied","data":{"item":{"id":"c1"}}}"#))
        .expect("request");
    let resp = router.oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_object_bodies_are_bad_requests() {
    let h = harness(Some(SECRET));
    for body in [
        r#"["conversation.user.created", {"item": {"id": "conv1"}}]"#,
        r#""conversation.user.created""#,
        "42",
    ] {
        let resp = h
            .router
            .clone()
            .oneshot(webhook_request(body, signed(body)))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(json_body(resp).await, json!({ "detail": "Invalid JSON payload" }));
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(h.chat.posted().is_empty());
}

#[tokio::test]
async fn padded_topic_is_echoed_verbatim_and_not_dispatched() {
    let h = harness(Some(SECRET));
    let body = json!({
        "topic": " conversation.user.created\n",
        "data": { "item": { "id": "conv1" } }
    })
    .to_string();

    let resp = h
        .router
        .clone()
        .oneshot(webhook_request(&body, signed(&body)))
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "status": "accepted", "topic": " conversation.user.created\n" })
    );
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(h.chat.posted().is_empty());
}
