use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_api::{AppStateInner, build_router};
use courier_db::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    build_router(AppStateInner::new(db, "test-secret", chrono::Duration::days(7)))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    send(app, request).await
}

/// Like `call`, but with a raw JSON body that may not parse.
async fn call_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers a user and returns (token, id).
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_validation_and_conflicts() {
    let app = app();
    register(&app, "alice").await;

    let cases = [
        (json!({ "username": "bob", "email": "bob@example.com" }), StatusCode::BAD_REQUEST),
        (
            json!({ "username": "bob", "email": "nope", "password": "hunter2hunter2" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "username": "bob", "email": "bob@example.com", "password": "short" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "username": "alice", "email": "new@example.com", "password": "hunter2hunter2" }),
            StatusCode::CONFLICT,
        ),
        (
            json!({ "username": "alice2", "email": "alice@example.com", "password": "hunter2hunter2" }),
            StatusCode::CONFLICT,
        ),
    ];

    for (body, expected) in cases {
        let (status, resp) = call(&app, Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, expected, "{}", resp);
        assert!(resp["message"].is_string());
    }
}

#[tokio::test]
async fn login_by_username_or_email() {
    let app = app();
    let (_, alice_id) = register(&app, "alice").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], alice_id.as_str());
    assert!(body["user"].get("password_hash").is_none());

    // the browser client sends the identifier in both fields
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({
            "username": "alice@example.com",
            "email": "alice@example.com",
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/messages/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/users/me",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_and_search() {
    let app = app();
    let (alice, alice_id) = register(&app, "alice").await;
    register(&app, "bob").await;

    let (status, me) = call(&app, Method::GET, "/api/users/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");

    let (status, me) = call(
        &app,
        Method::PUT,
        "/api/users/me",
        Some(&alice),
        Some(json!({ "display_name": "Alice Liddell", "bio": "down the hole" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["display_name"], "Alice Liddell");

    let (status, hits) = call(&app, Method::GET, "/api/users/search?q=LIDD", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], alice_id.as_str());

    let (_, all) = call(&app, Method::GET, "/api/users/search", Some(&alice), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, profile) = call(
        &app,
        Method::GET,
        &format!("/api/users/{}", alice_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "down the hole");
    assert!(profile.get("email").is_none());

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/users/{}", uuid::Uuid::new_v4()),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_lifecycle_over_http() {
    let app = app();
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (status, sent) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&alice),
        Some(json!({ "receiver_id": bob_id, "content": "hello bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["is_edited"], false);
    let message_id = sent["id"].as_str().unwrap().to_string();

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&alice),
        Some(json!({ "receiver_id": alice_id, "content": "me" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "self_message");

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&alice),
        Some(json!({ "receiver_id": uuid::Uuid::new_v4(), "content": "anyone?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, list) = call(
        &app,
        Method::GET,
        &format!("/api/messages/{}?page=1&limit=20", alice_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, convs) = call(&app, Method::GET, "/api/messages/conversations", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(convs[0]["user"]["username"], "alice");
    assert_eq!(convs[0]["last_message"], "hello bob");
    assert!(convs[0]["last_message_time"].is_string());

    let edit_uri = format!("/api/messages/{}", message_id);
    let (status, err) = call(
        &app,
        Method::PUT,
        &edit_uri,
        Some(&bob),
        Some(json!({ "content": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "forbidden");

    let (status, edited) = call(
        &app,
        Method::PUT,
        &edit_uri,
        Some(&alice),
        Some(json!({ "content": "hello, bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "hello, bob");
    assert_eq!(edited["is_edited"], true);

    let (status, _) = call(&app, Method::DELETE, &edit_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, ack) = call(&app, Method::DELETE, &edit_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["id"], message_id.as_str());

    let (status, _) = call(&app, Method::DELETE, &edit_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, convs) = call(&app, Method::GET, "/api/messages/conversations", Some(&alice), None).await;
    assert!(convs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_requests_get_error_bodies() {
    let app = app();
    let (alice, _) = register(&app, "alice").await;

    let (status, err) = call_raw(&app, Method::POST, "/api/messages", &alice, "{bad json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_input");
    assert!(err["message"].is_string());

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&alice),
        Some(json!({ "receiver_id": "not-a-uuid", "content": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_input");

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": 42, "email": "x@example.com", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_input");

    let (status, err) = call(&app, Method::DELETE, "/api/messages/123", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, err) = call(
        &app,
        Method::PUT,
        "/api/messages/123",
        Some(&alice),
        Some(json!({ "content": "edit" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, err) = call(&app, Method::GET, "/api/users/someone", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}

#[tokio::test]
async fn message_listing_tolerates_bad_paging_and_ids() {
    let app = app();
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    for i in 0..3 {
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({ "receiver_id": bob_id, "content": format!("m{}", i) })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let uri = format!("/api/messages/{}?page=abc&limit=xyz", alice_id);
    let (status, list) = call(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 3);

    let uri = format!("/api/messages/{}?page=-1&limit=2", alice_id);
    let (status, list) = call(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[0]["content"], "m2");

    let (status, list) = call(&app, Method::GET, "/api/messages/not-a-uuid", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());
}
