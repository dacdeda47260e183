//! Conference REST and health endpoint tests.
//!
//! Requests go through the real router with `tower::ServiceExt::oneshot`.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chat_hub::observability::HealthState;
use chat_hub::routes::{build_routes, AppState};
use common::types::ConferenceId;
use http_body_util::BodyExt;
use hub_test_utils::{mint_token, TestHub, FRAME_WAIT};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

struct TestApp {
    router: Router,
    test_hub: TestHub,
    health: Arc<HealthState>,
}

async fn app() -> TestApp {
    let test_hub = TestHub::new().await;
    let health = Arc::new(HealthState::new(Arc::clone(test_hub.hub.metrics())));
    let router = build_routes(AppState {
        hub: test_hub.hub.clone(),
        health: Arc::clone(&health),
    });
    TestApp {
        router,
        test_hub,
        health,
    }
}

async fn call(
    app: &TestApp,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", mint_token(user)));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(app: &TestApp, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    call(app, "GET", uri, user, None).await
}

async fn post(app: &TestApp, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    call(app, "POST", uri, user, None).await
}

async fn create(app: &TestApp, user: &str) -> String {
    let (status, body) = post(app, "/v1/conferences", Some(user)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["conference_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_returns_201_with_creator_as_participant() {
    let app = app().await;
    let body = Some(json!({}));
    let (status, body) = call(&app, "POST", "/v1/conferences", Some("alice"), body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["creator"], "alice");
    assert_eq!(body["participants"], json!(["alice"]));
    assert_eq!(body["capacity"], 10);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_401() {
    let app = app().await;

    let (status, body) = post(&app, "/v1/conferences", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    let request = Request::post("/v1/conferences/leave")
        .header("authorization", "Bearer forged.token.value")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_join_and_get_conference() {
    let app = app().await;
    let id = create(&app, "alice").await;

    let (status, body) = post(&app, &format!("/v1/conferences/{id}/join"), Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participants"], json!(["alice", "bob"]));

    let (status, body) = get(&app, &format!("/v1/conferences/{id}"), Some("carol")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participants"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn test_rest_join_notifies_connected_participants() {
    let app = app().await;
    let (_alice, mut alice_rx) = app.test_hub.connect_quiet("alice").await;
    let id = create(&app, "alice").await;

    let (status, _) = post(&app, &format!("/v1/conferences/{id}/join"), Some("bob")).await;
    assert_eq!(status, StatusCode::OK);

    let joined = alice_rx.next_json(FRAME_WAIT).await.unwrap();
    assert_eq!(joined["type"], "conference_join");
    assert_eq!(joined["username"], "bob");
}

#[tokio::test]
async fn test_unknown_and_malformed_conference_ids() {
    let app = app().await;
    let unknown = ConferenceId::new();

    let (status, _) = post(&app, &format!("/v1/conferences/{unknown}/join"), Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/v1/conferences/not-a-uuid", Some("bob")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, &format!("/v1/conferences/{unknown}/public"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_full_conference_is_409() {
    let app = app().await;
    let id = create(&app, "u0").await;
    for n in 1..10 {
        let user = format!("u{n}");
        let (status, _) = post(&app, &format!("/v1/conferences/{id}/join"), Some(&user)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post(&app, &format!("/v1/conferences/{id}/join"), Some("u10")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFERENCE_FULL");
}

#[tokio::test]
async fn test_leave_reports_what_was_left() {
    let app = app().await;

    let (status, body) = post(&app, "/v1/conferences/leave", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"left": false, "conference_id": null}));

    let id = create(&app, "alice").await;
    let (status, body) = post(&app, "/v1/conferences/leave", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["left"], true);
    assert_eq!(body["conference_id"], id.as_str());
}

#[tokio::test]
async fn test_public_info_needs_no_auth_and_hides_participants() {
    let app = app().await;
    let id = create(&app, "alice").await;

    let (status, body) = get(&app, &format!("/v1/conferences/{id}/public"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"conference_id": id, "participant_count": 1, "capacity": 10}));
}

#[tokio::test]
async fn test_room_conference_lookup() {
    let app = app().await;
    app.test_hub.private_room("r1", &["alice", "bob"]).await;

    let (status, _) = get(&app, "/v1/rooms/r1/conference", Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let in_room = Some(json!({"room": "r1"}));
    let (status, created) = call(&app, "POST", "/v1/conferences", Some("alice"), in_room).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["room"], "r1");

    let (status, body) = get(&app, "/v1/rooms/r1/conference", Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conference_id"], created["conference_id"]);

    let (status, _) = get(&app, "/v1/rooms/r1/conference", Some("carol")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let in_room = Some(json!({"room": "r1"}));
    let (status, _) = call(&app, "POST", "/v1/conferences", Some("carol"), in_room).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_readiness_follows_health_state() {
    let app = app().await;
    let (_alice, _rx) = app.test_hub.connect_quiet("alice").await;

    let (status, body) = get(&app, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    app.health.set_ready();
    let (status, body) = get(&app, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"], 1);

    let (status, _) = get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
