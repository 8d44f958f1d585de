//! HTTP API tests.
//!
//! Drive the full router (middleware included) with `tower::ServiceExt::oneshot`
//! and check status codes and response bodies.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reviewer_service::services::http_server::build_router;
use reviewer_service::services::SeededPicker;
use reviewer_service::AssignmentService;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

async fn setup() -> (TempDir, Router) {
    let dir = tempdir().unwrap();
    let pool = reviewer_service::db::initialize(&dir.path().join("api.db"), 2)
        .await
        .unwrap();
    let svc = AssignmentService::with_picker(pool, Arc::new(SeededPicker::new(7)));
    (dir, build_router(svc, Duration::from_secs(5)))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn add_backend(router: &Router) {
    let (status, _) = post(
        router,
        "/team/add",
        json!({
            "team_name": "backend",
            "members": [
                {"user_id": "u1", "username": "alice", "is_active": true},
                {"user_id": "u2", "username": "bob", "is_active": true},
                {"user_id": "u3", "username": "carol", "is_active": true}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, router) = setup().await;
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn add_and_get_team() {
    let (_dir, router) = setup().await;
    add_backend(&router).await;

    let (status, body) = get(&router, "/team/get?team_name=backend").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team_name"], "backend");
    assert_eq!(body["members"].as_array().unwrap().len(), 3);
    assert_eq!(body["members"][0]["username"], "alice");

    let (status, body) = get(&router, "/team/get?team_name=frontend").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn validation_errors_are_bad_request() {
    let (_dir, router) = setup().await;

    let (status, body) = post(&router, "/team/add", json!({"team_name": "", "members": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-1", "pull_request_name": "x", "author_id": "u1", "extra": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let request = Request::builder()
        .method("POST")
        .uri("/pullRequest/merge")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, _) = get(&router, "/users/getReview").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn set_is_active_returns_user() {
    let (_dir, router) = setup().await;
    add_backend(&router).await;

    let (status, body) = post(
        &router,
        "/users/setIsActive",
        json!({"user_id": "u2", "is_active": false}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["user_id"], "u2");
    assert_eq!(body["user"]["team_name"], "backend");
    assert_eq!(body["user"]["is_active"], false);

    let (status, body) = post(
        &router,
        "/users/setIsActive",
        json!({"user_id": "ghost", "is_active": true}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn pull_request_lifecycle() {
    let (_dir, router) = setup().await;
    add_backend(&router).await;

    let (status, body) = post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-1", "pull_request_name": "Add cache", "author_id": "u1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["pr"]["status"], "OPEN");
    assert_eq!(body["pr"]["assigned_reviewers"].as_array().unwrap().len(), 2);
    assert!(body["pr"]["createdAt"].is_string());
    assert!(body["pr"].get("mergedAt").is_none());

    let (status, body) = post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-1", "pull_request_name": "again", "author_id": "u1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PR_EXISTS");

    let (status, body) = get(&router, "/users/getReview?user_id=u2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u2");
    assert_eq!(body["pull_requests"][0]["pull_request_id"], "pr-1");

    let (status, body) = post(
        &router,
        "/pullRequest/reassign",
        json!({"pull_request_id": "pr-1", "old_user_id": "u2"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE");

    let (status, body) = post(
        &router,
        "/pullRequest/reassign",
        json!({"pull_request_id": "pr-1", "old_reviewer_id": "u1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NOT_ASSIGNED");

    let (status, first) = post(&router, "/pullRequest/merge", json!({"pull_request_id": "pr-1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pr"]["status"], "MERGED");
    assert!(first["pr"]["mergedAt"].is_string());

    let (status, second) = post(&router, "/pullRequest/merge", json!({"pull_request_id": "pr-1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);

    let (status, body) = post(
        &router,
        "/pullRequest/reassign",
        json!({"pull_request_id": "pr-1", "old_user_id": "u3"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PR_MERGED");
}

#[tokio::test]
async fn reassign_returns_replacement() {
    let (_dir, router) = setup().await;
    add_backend(&router).await;
    post(
        &router,
        "/team/add",
        json!({
            "team_name": "backend",
            "members": [{"user_id": "u4", "username": "dave", "is_active": true}]
        }),
    )
    .await;

    let (_, created) = post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-9", "pull_request_name": "x", "author_id": "u1"}),
    )
    .await;
    let old = created["pr"]["assigned_reviewers"][0].as_str().unwrap().to_string();

    let (status, body) = post(
        &router,
        "/pullRequest/reassign",
        json!({"pull_request_id": "pr-9", "old_user_id": old}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let replaced_by = body["replaced_by"].as_str().unwrap();
    let reviewers: Vec<&str> = body["pr"]["assigned_reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(reviewers.len(), 2);
    assert!(reviewers.contains(&replaced_by));
    assert!(!reviewers.contains(&old.as_str()));
    assert!(!reviewers.contains(&"u1"));
}

#[tokio::test]
async fn unknown_author_and_pull_request() {
    let (_dir, router) = setup().await;

    let (status, body) = post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-1", "pull_request_name": "x", "author_id": "ghost"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = post(&router, "/pullRequest/merge", json!({"pull_request_id": "nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn body_ids_are_verbatim_query_params_are_trimmed() {
    let (_dir, router) = setup().await;
    add_backend(&router).await;
    post(
        &router,
        "/pullRequest/create",
        json!({"pull_request_id": "pr-1", "pull_request_name": "x", "author_id": "u1"}),
    )
    .await;

    let (status, body) = post(
        &router,
        "/users/setIsActive",
        json!({"user_id": " u2 ", "is_active": false}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = get(&router, "/users/getReview?user_id=%20u2%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u2");
    assert_eq!(body["pull_requests"][0]["pull_request_id"], "pr-1");

    let (status, body) = get(&router, "/team/get?team_name=%20backend").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team_name"], "backend");
}
