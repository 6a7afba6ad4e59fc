//! HTTP-level tests for the hunt server over the in-memory ports.
//!
//! These prove the REST contract: bearer authentication, status codes for
//! each error kind, and the draft/publish/live flow end to end.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hunt_core::memory::{InMemoryAssets, InMemoryHuntStore, InMemorySequences};
use hunt_core::service::{HuntService, HuntServiceImpl};
use hunt_server::middleware::jwt::JwtConfig;
use hunt_server::router::build_router;
use hyper::{Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceExt;

// ── Test JWT helpers ───────────────────────────────────────────

const TEST_JWT_SECRET: &[u8] = b"test-secret-for-hunt-http-tests";

#[derive(Debug, Serialize)]
struct TestClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    name: String,
}

fn make_jwt(sub: Option<&str>) -> String {
    let claims = TestClaims {
        sub: sub.map(str::to_string),
        name: "test user".into(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

fn bearer(user: &str) -> String {
    format!("Bearer {}", make_jwt(Some(user)))
}

// ── Test app builder ───────────────────────────────────────────

fn build_test_app() -> axum::Router {
    let service: Arc<dyn HuntService> = Arc::new(HuntServiceImpl::new(
        Arc::new(InMemoryHuntStore::new()),
        Arc::new(InMemorySequences::new()),
        Arc::new(InMemoryAssets::new()),
    ));
    build_router(service, JwtConfig::from_secret(TEST_JWT_SECRET))
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }))
    };
    (status, json)
}

async fn create_hunt(app: &axum::Router, owner: &str, name: &str) -> (i64, Value) {
    let (status, body) = send(
        app,
        "POST",
        "/hunts",
        Some(&bearer(owner)),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    (body["root"]["hunt_id"].as_i64().unwrap(), body)
}

fn one_clue_save(detail: &Value, text: &str) -> Value {
    json!({
        "name": detail["snapshot"]["name"],
        "updated_at": detail["snapshot"]["updated_at"],
        "steps": [
            { "challenge": { "type": "clue", "text": text } }
        ]
    })
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_auth() {
    let app = build_test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn editor_routes_require_bearer_token() {
    let app = build_test_app();
    let (status, body) = send(&app, "POST", "/hunts", None, Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn token_without_subject_is_rejected() {
    let app = build_test_app();
    let auth = format!("Bearer {}", make_jwt(None));
    let (status, _) = send(&app, "GET", "/hunts/1", Some(&auth), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let app = build_test_app();
    let forged = encode(
        &Header::default(),
        &TestClaims {
            sub: Some("mallory".into()),
            name: "m".into(),
        },
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();
    let (status, _) = send(
        &app,
        "GET",
        "/hunts/1",
        Some(&format!("Bearer {forged}")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn save_publish_release_and_play() {
    let app = build_test_app();
    let alice = bearer("alice");
    let (hunt_id, created) = create_hunt(&app, "alice", "Harbour Walk").await;
    assert_eq!(created["access"]["permission"], "owner");
    assert_eq!(created["root"]["latest_version"], 1);

    let (status, saved) = send(
        &app,
        "PUT",
        &format!("/hunts/{hunt_id}"),
        Some(&alice),
        Some(one_clue_save(&created, "by the lighthouse")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "save failed: {saved}");
    assert_eq!(saved["created"].as_array().unwrap().len(), 1);

    let (status, published) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/publish"),
        Some(&alice),
        Some(json!({ "release": true, "expected_current_live": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "publish failed: {published}");
    assert_eq!(published["published_version"], 1);
    assert_eq!(published["draft_version"], 2);
    assert_eq!(published["release"]["live_version"], 1);

    let slug = created["root"]["play_slug"].as_str().unwrap().to_string();
    let (status, live) = send(&app, "GET", &format!("/play/{slug}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["snapshot"]["version"], 1);
    assert_eq!(live["steps"][0]["challenge"]["text"], "by the lighthouse");

    let (status, history) = send(
        &app,
        "GET",
        &format!("/hunts/{hunt_id}/versions"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["live_version"], 1);
    assert_eq!(history["versions"][0]["is_live"], true);
}

#[tokio::test]
async fn stale_save_is_conflict() {
    let app = build_test_app();
    let alice = bearer("alice");
    let (hunt_id, created) = create_hunt(&app, "alice", "Old Town").await;

    let uri = format!("/hunts/{hunt_id}");
    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&alice),
        Some(one_clue_save(&created, "first")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Same stale updated_at as the first save.
    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&alice),
        Some(one_clue_save(&created, "second")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert_eq!(
        body["message"],
        "this was modified by someone else, please refresh and try again"
    );
}

#[tokio::test]
async fn release_with_wrong_expectation_is_conflict() {
    let app = build_test_app();
    let alice = bearer("alice");
    let (hunt_id, created) = create_hunt(&app, "alice", "Park Loop").await;
    send(
        &app,
        "PUT",
        &format!("/hunts/{hunt_id}"),
        Some(&alice),
        Some(one_clue_save(&created, "the bandstand")),
    )
    .await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/publish"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/release"),
        Some(&alice),
        Some(json!({ "version": 1, "expected_current_live": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "the live version changed, please refresh the version panel"
    );

    let (status, body) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/release"),
        Some(&alice),
        Some(json!({ "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["live_version"], 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/offline"),
        Some(&alice),
        Some(json!({ "expected_current_live": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["live_version"], Value::Null);
}

#[tokio::test]
async fn publishing_an_empty_draft_is_unprocessable() {
    let app = build_test_app();
    let (hunt_id, _) = create_hunt(&app, "alice", "Empty").await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/publish"),
        Some(&bearer("alice")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn strangers_see_not_found_and_viewers_cannot_edit() {
    let app = build_test_app();
    let (hunt_id, created) = create_hunt(&app, "alice", "Secret Garden").await;
    let uri = format!("/hunts/{hunt_id}");

    let (status, body) = send(&app, "GET", &uri, Some(&bearer("bob")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "hunt not found or access denied");

    let (status, grant) = send(
        &app,
        "PUT",
        &format!("/hunts/{hunt_id}/grants/bob"),
        Some(&bearer("alice")),
        Some(json!({ "permission": "view" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "share failed: {grant}");
    assert_eq!(grant["permission"], "view");

    let (status, detail) = send(&app, "GET", &uri, Some(&bearer("bob")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["access"]["permission"], "view");
    assert_eq!(detail["access"]["capabilities"]["can_edit"], false);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&bearer("bob")),
        Some(one_clue_save(&created, "bob was here")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/hunts/{hunt_id}/grants/bob"),
        Some(&bearer("bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, Some(&bearer("bob")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clone_creates_a_private_copy_for_the_caller() {
    let app = build_test_app();
    let alice = bearer("alice");
    let (hunt_id, created) = create_hunt(&app, "alice", "Canal Trail").await;
    send(
        &app,
        "PUT",
        &format!("/hunts/{hunt_id}"),
        Some(&alice),
        Some(one_clue_save(&created, "under the bridge")),
    )
    .await;

    let (status, cloned) = send(
        &app,
        "POST",
        &format!("/hunts/{hunt_id}/clone"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "clone failed: {cloned}");
    let clone_id = cloned["hunt_id"].as_i64().unwrap();
    assert_ne!(clone_id, hunt_id);
    assert_eq!(cloned["cloned_from_version"], 1);

    let (status, detail) = send(&app, "GET", &format!("/hunts/{clone_id}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["root"]["live_version"], Value::Null);
    assert_eq!(detail["steps"][0]["challenge"]["text"], "under the bridge");
}

#[tokio::test]
async fn deleted_hunt_is_gone_everywhere() {
    let app = build_test_app();
    let (hunt_id, _) = create_hunt(&app, "alice", "Short Lived").await;
    let uri = format!("/hunts/{hunt_id}");

    let (status, _) = send(&app, "DELETE", &uri, Some(&bearer("alice")), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, Some(&bearer("alice")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_play_slug_is_not_found() {
    let app = build_test_app();
    let (status, body) = send(&app, "GET", "/play/nowhere-0000000000", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
