//! HTTP API tests driving the router in-process.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use taskplan::api::{ACTOR_HEADER, AppState, build_router, start_server};
use taskplan::db::Database;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

fn app() -> (Router, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    (build_router(AppState::new(db.clone())), db)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    actor: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = actor {
        builder = builder.header(ACTOR_HEADER, id.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, name: &str, role: &str) -> i64 {
    let (status, body) = call(
        app,
        "POST",
        "/api/users",
        None,
        Some(json!({ "name": name, "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

async fn create_task(app: &Router, actor: i64, title: &str, assignees: &[i64]) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/api/tasks",
        Some(actor),
        Some(json!({ "title": title, "assignees": assignees, "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn task_routes_require_a_known_actor() {
    let (app, _) = app();

    let (status, body) = call(&app, "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = call(&app, "GET", "/api/tasks", Some(42), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_task_returns_identifier() {
    let (app, _) = app();
    let boss = create_user(&app, "Boss", "admin").await;
    let dana = create_user(&app, "Dana", "designer").await;

    let task = create_task(&app, boss, "Poster", &[dana]).await;
    let task_id = task["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("DG"));
    assert_eq!(&task_id[5..8], "001");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["status"], "pending");

    let (status, parsed) = call(&app, "GET", &format!("/api/identifiers/{task_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["prefix"], "DG");
    assert_eq!(parsed["counter"], 1);

    let (status, found) = call(
        &app,
        "GET",
        &format!("/api/tasks/by-identifier/{task_id}"),
        Some(dana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], task["id"]);
}

#[tokio::test]
async fn malformed_identifier_is_a_client_error() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/identifiers/not-an-id", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");
}

#[tokio::test]
async fn grouping_lifecycle_over_http() {
    let (app, db) = app();
    let boss = create_user(&app, "Boss", "admin").await;
    let dana = create_user(&app, "Dana", "designer").await;
    let cole = create_user(&app, "Cole", "copywriter").await;
    let t1 = create_task(&app, boss, "Design", &[dana]).await["id"].as_i64().unwrap();
    let t2 = create_task(&app, boss, "Copy", &[cole]).await["id"].as_i64().unwrap();
    let t3 = create_task(&app, boss, "Video", &[cole]).await["id"].as_i64().unwrap();

    let (status, group) = call(
        &app,
        "POST",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "title": "Launch", "task_ids": [t1, t2] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(group["is_super_task"], true);
    let group_id = group["id"].as_i64().unwrap();

    let (status, detail) = call(&app, "GET", &format!("/api/tasks/{group_id}"), Some(boss), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["children"].as_array().unwrap().len(), 2);

    let (status, added) = call(
        &app,
        "PATCH",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "super_task_id": group_id, "task_id": t3, "action": "add" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["parent_task_id"], group_id);

    for (actor, task) in [(dana, t1), (cole, t2), (cole, t3)] {
        let (status, _) = call(
            &app,
            "PATCH",
            &format!("/api/tasks/{task}/status"),
            Some(actor),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, parent) = call(&app, "GET", &format!("/api/tasks/{group_id}"), Some(boss), None).await;
    assert_eq!(parent["status"], "completed");
    assert_eq!(parent["admin_approved"], true);

    // Dana was notified of the grouping and of the automatic completion.
    let kinds: Vec<String> = db
        .notifications_for(dana)
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&"super_task_created".to_string()));
    assert!(kinds.contains(&"super_task_completed".to_string()));

    let (status, removed) = call(
        &app,
        "PATCH",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "task_id": t3, "action": "remove" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["parent_task_id"], Value::Null);
}

#[tokio::test]
async fn grouping_validation_maps_to_client_errors() {
    let (app, _) = app();
    let boss = create_user(&app, "Boss", "admin").await;
    let dana = create_user(&app, "Dana", "designer").await;
    let t1 = create_task(&app, boss, "Solo", &[dana]).await["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "title": "Too small", "task_ids": [t1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");

    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "task_ids": [t1, 99] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "title");

    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "title": "Ghost", "task_ids": [t1, 99] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "TASK_NOT_FOUND");

    let (status, body) = call(
        &app,
        "PATCH",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "task_id": t1, "action": "merge" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "action");

    let (status, body) = call(
        &app,
        "PATCH",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "task_id": t1, "action": "remove" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "NOT_GROUPED");
}

#[tokio::test]
async fn malformed_request_bodies_use_the_error_envelope() {
    let (app, _) = app();
    let boss = create_user(&app, "Boss", "admin").await;
    let dana = create_user(&app, "Dana", "designer").await;
    let task = create_task(&app, boss, "Poster", &[dana]).await["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        "PATCH",
        &format!("/api/tasks/{task}/status"),
        Some(dana),
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");
    assert_eq!(body["error"]["field"], "status");

    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks/group",
        Some(boss),
        Some(json!({ "title": "Launch", "task_ids": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");
    assert_eq!(body["error"]["field"], "task_ids");
}

#[tokio::test]
async fn malformed_path_and_query_use_the_error_envelope() {
    let (app, _) = app();
    let boss = create_user(&app, "Boss", "admin").await;

    let (status, body) = call(&app, "GET", "/api/tasks/abc", Some(boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");

    let (status, body) = call(&app, "GET", "/api/tasks?status=done", Some(boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");
}

#[tokio::test]
async fn delete_requires_admin() {
    let (app, _) = app();
    let boss = create_user(&app, "Boss", "admin").await;
    let dana = create_user(&app, "Dana", "designer").await;
    let task = create_task(&app, dana, "Mine", &[dana]).await["id"].as_i64().unwrap();

    let (status, _) = call(&app, "DELETE", &format!("/api/tasks/{task}"), Some(dana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "DELETE", &format!("/api/tasks/{task}"), Some(boss), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "GET", &format!("/api/tasks/{task}"), Some(boss), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn server_task_finishes_after_shutdown() {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    let addr = "127.0.0.1:0".parse().unwrap();
    let (shutdown_tx, bound, server) = start_server(AppState::new(db), addr).await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(bound).await.unwrap();
    stream
        .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after shutdown")
        .unwrap();
}
