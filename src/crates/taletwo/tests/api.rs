//! Router-level tests over the in-memory store and a scripted chat.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use engine::{Engine, EngineConfig};
use llm::ScriptedChat;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use store::{DocumentStore, MemoryStore};
use taletwo::auth::{AuthMode, StaticAuth};
use taletwo::{create_router, AppState};
use tower::ServiceExt;

fn scripted_chat() -> ScriptedChat {
    let chat = ScriptedChat::new();
    let points: Vec<Value> = (0..6)
        .map(|i| json!({"title": format!("Point {i}"), "brief": format!("brief {i}")}))
        .collect();
    chat.push(
        "planner.points",
        json!({"overallIdea": "idea", "conflict": "conflict", "points": points}).to_string(),
    );
    let items: Vec<Value> = (0..6)
        .map(|i| json!({"index": i, "substeps": [format!("s{i}0"), format!("s{i}1"), format!("s{i}2")]}))
        .collect();
    chat.push("planner.substeps", json!({"items": items}).to_string());
    chat.sticky("planner.intro", r#"{"items": []}"#);
    chat.sticky("verify.substep", r#"{"done": true}"#);
    chat.push(
        "page.generate",
        json!({"passage": "P0", "summary": "s0", "notes": ["n0"]}).to_string(),
    );
    chat.sticky(
        "page.generate",
        json!({"passage": "PX", "summary": "sx", "notes": []}).to_string(),
    );
    chat
}

fn test_app() -> Router {
    let chat = scripted_chat();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        Arc::new(chat),
        store as Arc<dyn DocumentStore>,
        EngineConfig {
            wait_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        },
    );
    let tokens = HashMap::from([
        ("tok-alice".to_string(), "alice".to_string()),
        ("tok-bob".to_string(), "bob".to_string()),
    ]);
    let state = AppState {
        engine,
        auth: Arc::new(StaticAuth::new(AuthMode::Tokens, tokens)),
    };
    create_router(state, "*")
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_book(app: &Router, token: &str) -> String {
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/books", Some(token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = test_app();
    let response = app
        .oneshot(request(Method::POST, "/api/books", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let app = test_app();
    let response = app
        .oneshot(request(Method::POST, "/api/books", Some("nope"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ownership_is_enforced() {
    let app = test_app();
    let book_id = create_book(&app, "tok-alice").await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/books/{book_id}"),
            Some("tok-bob"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(request(
            Method::GET,
            "/api/books/missing-id",
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn story_endpoint_starts_transparently() {
    let app = test_app();
    let book_id = create_book(&app, "tok-alice").await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/books/{book_id}/story"),
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["index"], 0);
    assert_eq!(snapshot["pages"][0]["passage"], "P0");
    assert_eq!(snapshot["notes"], json!(["n0"]));
    assert_eq!(snapshot["turn"], 1);
    for hidden in ["branchCache", "branchCacheAt", "branchPending", "pendingVerify"] {
        assert!(snapshot.get(hidden).is_none());
    }

    // Starting again returns the same story.
    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/books/{book_id}/story/start"),
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["turn"], 1);
}

#[tokio::test]
async fn ready_reports_next_and_options() {
    let app = test_app();
    let book_id = create_book(&app, "tok-alice").await;

    // Start, then gate on readiness.
    app.clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/books/{book_id}/story/start"),
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/books/{book_id}/story/ready?index=0"),
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ready"]["next"], true);
    assert!(body["ready"]["options"].is_object());
}

#[tokio::test]
async fn next_with_bad_index_is_rejected() {
    let app = test_app();
    let book_id = create_book(&app, "tok-alice").await;
    app.clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/books/{book_id}/story/start"),
            Some("tok-alice"),
            None,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/books/{book_id}/story/next"),
            Some("tok-alice"),
            Some(json!({"index": 7})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn config_update_roundtrips() {
    let app = test_app();
    let book_id = create_book(&app, "tok-alice").await;

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/api/books/{book_id}"),
            Some("tok-alice"),
            Some(json!({
                "bookOne": "A",
                "bookTwo": "B",
                "world": "a drowned city",
                "mainCharacter": "Mara",
                "genre": "mystery"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let book = body_json(response).await;
    assert_eq!(book["config"]["world"], "a drowned city");

    let response = app
        .oneshot(request(Method::GET, "/api/books", Some("tok-alice"), None))
        .await
        .unwrap();
    let books = body_json(response).await;
    assert_eq!(books[0]["config"]["mainCharacter"], "Mara");
}

#[tokio::test]
async fn health_does_not_require_auth() {
    let app = test_app();
    let response = app
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
